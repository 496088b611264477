//! History database: snapshot persistence, finding lifecycle, trends
//!
//! A single SQLite file at `<root>/.shannon/history.db`, opened once per
//! run and serialized by SQLite's own locking plus a busy timeout.
//! Persistence is the only stage whose errors propagate; on failure the
//! snapshot is preserved to a sidecar JSON so no data is lost.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{InsightError, Result};
use crate::findings::{identity_key, Finding};
use crate::signals::SignalValue;
use crate::snapshot::{digest_jaccard, Snapshot};

/// Line-overlap Jaccard at or above which a disappeared file and a new
/// file are treated as a rename
const RENAME_JACCARD: f64 = 0.7;

/// Directory under the analysis root holding engine state
pub const STATE_DIR: &str = ".shannon";
pub const DB_FILE: &str = "history.db";

/// A row from the snapshots table
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub id: i64,
    pub timestamp: i64,
    pub commit_sha: Option<String>,
    pub file_count: i64,
}

/// One point in a signal trend
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub snapshot_id: i64,
    pub timestamp: i64,
    pub value: f64,
}

/// A file whose metric moved between the last two snapshots
#[derive(Debug, Clone)]
pub struct Mover {
    pub path: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

/// A finding recurring across successive snapshots
#[derive(Debug, Clone)]
pub struct ChronicFinding {
    pub identity_key: String,
    pub finding_type: String,
    pub occurrence_count: i64,
    pub first_snapshot_id: i64,
    pub last_snapshot_id: i64,
    pub finding: Option<Finding>,
}

/// Scoped connection to the history database; lives for one run
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open (creating if needed) the history database for a root
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;
        Self::open_path(&dir.join(DB_FILE))
    }

    /// Open a database at an explicit path
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                commit_sha TEXT,
                root TEXT NOT NULL,
                tool_version TEXT NOT NULL,
                file_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS signal_history (
                snapshot_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                signal_name TEXT NOT NULL,
                value REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signal_history
                ON signal_history(path, signal_name, snapshot_id);

            CREATE TABLE IF NOT EXISTS module_signal_history (
                snapshot_id INTEGER NOT NULL,
                module TEXT NOT NULL,
                signal_name TEXT NOT NULL,
                value REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS global_signal_history (
                snapshot_id INTEGER NOT NULL,
                signal_name TEXT NOT NULL,
                value REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS findings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL,
                finding_type TEXT NOT NULL,
                identity_key TEXT NOT NULL,
                severity REAL NOT NULL,
                scope TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_findings_snapshot
                ON findings(snapshot_id);

            CREATE TABLE IF NOT EXISTS finding_lifecycle (
                finding_id INTEGER NOT NULL,
                identity_key TEXT NOT NULL UNIQUE,
                first_snapshot_id INTEGER NOT NULL,
                last_snapshot_id INTEGER NOT NULL,
                occurrence_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_digests (
                snapshot_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                line_hashes BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_file_digests
                ON file_digests(snapshot_id);
            "#,
        )?;
        Ok(())
    }

    /// Persist one snapshot.
    ///
    /// Clamps the snapshot timestamp so it never decreases for this root,
    /// migrates finding identity across detected renames, and maintains
    /// lifecycle rows. Returns the new snapshot id.
    pub fn persist(&mut self, snapshot: &mut Snapshot) -> Result<i64> {
        let previous = self.latest_snapshot()?;

        // Monotonic timestamps per root
        if let Some(prev) = &previous {
            if snapshot.timestamp < prev.timestamp {
                snapshot.timestamp = prev.timestamp;
            }
        }

        // Rename detection against the previous snapshot's digests
        if let Some(prev) = &previous {
            let renames = self.detect_renames(prev.id, &snapshot.file_digests)?;
            if !renames.is_empty() {
                info!(renames = renames.len(), "detected file renames, migrating identities");
                self.migrate_identities(prev.id, &renames)?;
            }
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO snapshots (timestamp, commit_sha, root, tool_version, file_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.timestamp,
                snapshot.commit_sha,
                snapshot.root,
                snapshot.tool_version,
                snapshot.file_count() as i64
            ],
        )?;
        let snapshot_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO signal_history (snapshot_id, path, signal_name, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (path, map) in &snapshot.file_signals {
                for (name, entry) in map {
                    if let Some(value) = numeric(&entry.value) {
                        stmt.execute(params![snapshot_id, path, name, value])?;
                    }
                }
            }

            let mut stmt = tx.prepare(
                "INSERT INTO module_signal_history (snapshot_id, module, signal_name, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (module, map) in &snapshot.module_signals {
                for (name, entry) in map {
                    if let Some(value) = numeric(&entry.value) {
                        stmt.execute(params![snapshot_id, module, name, value])?;
                    }
                }
            }

            let mut stmt = tx.prepare(
                "INSERT INTO global_signal_history (snapshot_id, signal_name, value)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (name, entry) in &snapshot.global_signals {
                if let Some(value) = numeric(&entry.value) {
                    stmt.execute(params![snapshot_id, name, value])?;
                }
            }

            let mut stmt = tx.prepare(
                "INSERT INTO file_digests (snapshot_id, path, line_hashes)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (path, hashes) in &snapshot.file_digests {
                stmt.execute(params![snapshot_id, path, encode_hashes(hashes)])?;
            }

            let mut insert_finding = tx.prepare(
                "INSERT INTO findings
                 (snapshot_id, finding_type, identity_key, severity, scope, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut upsert_lifecycle = tx.prepare(
                "INSERT INTO finding_lifecycle
                 (finding_id, identity_key, first_snapshot_id, last_snapshot_id, occurrence_count)
                 VALUES (?1, ?2, ?3, ?3, 1)
                 ON CONFLICT(identity_key) DO UPDATE SET
                    last_snapshot_id = ?3,
                    occurrence_count = occurrence_count + 1",
            )?;
            for finding in &snapshot.findings {
                let payload = serde_json::to_string(finding)
                    .map_err(|e| InsightError::Snapshot { message: e.to_string() })?;
                insert_finding.execute(params![
                    snapshot_id,
                    finding.kind.as_str(),
                    finding.identity_key,
                    finding.severity,
                    finding.scope.as_str(),
                    payload
                ])?;
                let finding_id = tx.last_insert_rowid();
                upsert_lifecycle.execute(params![finding_id, finding.identity_key, snapshot_id])?;
            }
        }

        tx.commit()?;
        debug!(snapshot_id, "snapshot persisted");
        Ok(snapshot_id)
    }

    /// Map disappeared previous paths to new paths by line-set Jaccard
    fn detect_renames(
        &self,
        prev_snapshot_id: i64,
        current_digests: &BTreeMap<String, Vec<u64>>,
    ) -> Result<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, line_hashes FROM file_digests WHERE snapshot_id = ?1")?;
        let prev_digests: BTreeMap<String, Vec<u64>> = stmt
            .query_map([prev_snapshot_id], |row| {
                let path: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((path, decode_hashes(&blob)))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let disappeared: Vec<(&String, &Vec<u64>)> = prev_digests
            .iter()
            .filter(|(path, _)| !current_digests.contains_key(*path))
            .collect();
        let mut appeared: Vec<(&String, &Vec<u64>)> = current_digests
            .iter()
            .filter(|(path, _)| !prev_digests.contains_key(*path))
            .collect();

        let mut renames = BTreeMap::new();
        for (old_path, old_digest) in disappeared {
            let mut best: Option<(usize, f64)> = None;
            for (idx, (_, new_digest)) in appeared.iter().enumerate() {
                let similarity = digest_jaccard(old_digest, new_digest);
                if similarity >= RENAME_JACCARD
                    && best.map(|(_, s)| similarity > s).unwrap_or(true)
                {
                    best = Some((idx, similarity));
                }
            }
            if let Some((idx, _)) = best {
                let (new_path, _) = appeared.remove(idx);
                renames.insert(old_path.clone(), new_path.clone());
            }
        }
        Ok(renames)
    }

    /// Substitute renamed paths into prior identity keys so lifecycle
    /// rows stay continuous
    fn migrate_identities(
        &mut self,
        prev_snapshot_id: i64,
        renames: &BTreeMap<String, String>,
    ) -> Result<()> {
        let prior: Vec<Finding> = {
            let mut stmt = self
                .conn
                .prepare("SELECT payload_json FROM findings WHERE snapshot_id = ?1")?;
            let rows = stmt.query_map([prev_snapshot_id], |row| row.get::<_, String>(0))?;
            rows.filter_map(|payload| payload.ok())
                .filter_map(|payload| serde_json::from_str(&payload).ok())
                .collect()
        };

        for finding in prior {
            if !finding.entities.iter().any(|e| renames.contains_key(e)) {
                continue;
            }
            let mut migrated: Vec<String> = finding
                .entities
                .iter()
                .map(|e| renames.get(e).cloned().unwrap_or_else(|| e.clone()))
                .collect();
            migrated.sort();
            let new_key = identity_key(finding.kind, &migrated);
            if new_key == finding.identity_key {
                continue;
            }
            let updated = self.conn.execute(
                "UPDATE OR IGNORE finding_lifecycle SET identity_key = ?1 WHERE identity_key = ?2",
                params![new_key, finding.identity_key],
            )?;
            if updated == 0 {
                warn!(key = %finding.identity_key, "lifecycle row missing during rename migration");
            }
        }
        Ok(())
    }

    /// The most recent snapshot row, if any
    pub fn latest_snapshot(&self) -> Result<Option<SnapshotRow>> {
        self.conn
            .query_row(
                "SELECT id, timestamp, commit_sha, file_count FROM snapshots
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(SnapshotRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        commit_sha: row.get(2)?,
                        file_count: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Recent snapshot rows, newest first
    pub fn recent_snapshots(&self, limit: usize) -> Result<Vec<SnapshotRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, commit_sha, file_count FROM snapshots
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(SnapshotRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                commit_sha: row.get(2)?,
                file_count: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    /// Findings stored with a snapshot
    pub fn findings_of(&self, snapshot_id: i64) -> Result<Vec<Finding>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM findings WHERE snapshot_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([snapshot_id], |row| row.get::<_, String>(0))?;
        Ok(rows
            .filter_map(|payload| payload.ok())
            .filter_map(|payload| serde_json::from_str(&payload).ok())
            .collect())
    }

    /// Trend of one signal on one file, oldest first
    pub fn file_trend(&self, path: &str, signal: &str, last_n: usize) -> Result<Vec<TrendPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT h.snapshot_id, s.timestamp, h.value
             FROM signal_history h JOIN snapshots s ON s.id = h.snapshot_id
             WHERE h.path = ?1 AND h.signal_name = ?2
             ORDER BY h.snapshot_id DESC LIMIT ?3",
        )?;
        let mut points: Vec<TrendPoint> = stmt
            .query_map(params![path, signal, last_n as i64], |row| {
                Ok(TrendPoint { snapshot_id: row.get(0)?, timestamp: row.get(1)?, value: row.get(2)? })
            })?
            .collect::<std::result::Result<_, _>>()?;
        points.reverse();
        Ok(points)
    }

    /// Trend of the global codebase health composite, oldest first
    pub fn codebase_health(&self, last_n: usize) -> Result<Vec<TrendPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT h.snapshot_id, s.timestamp, h.value
             FROM global_signal_history h JOIN snapshots s ON s.id = h.snapshot_id
             WHERE h.signal_name = 'codebase_health'
             ORDER BY h.snapshot_id DESC LIMIT ?1",
        )?;
        let mut points: Vec<TrendPoint> = stmt
            .query_map([last_n as i64], |row| {
                Ok(TrendPoint { snapshot_id: row.get(0)?, timestamp: row.get(1)?, value: row.get(2)? })
            })?
            .collect::<std::result::Result<_, _>>()?;
        points.reverse();
        Ok(points)
    }

    /// Files whose metric moved the most between the last two snapshots
    pub fn top_movers(&self, metric: &str, limit: usize) -> Result<Vec<Mover>> {
        let snapshots = self.recent_snapshots(2)?;
        if snapshots.len() < 2 {
            return Ok(Vec::new());
        }
        let (current_id, previous_id) = (snapshots[0].id, snapshots[1].id);

        let mut stmt = self.conn.prepare(
            "SELECT cur.path, prev.value, cur.value
             FROM signal_history cur
             JOIN signal_history prev
               ON prev.path = cur.path AND prev.signal_name = cur.signal_name
             WHERE cur.snapshot_id = ?1 AND prev.snapshot_id = ?2
               AND cur.signal_name = ?3",
        )?;
        let mut movers: Vec<Mover> = stmt
            .query_map(params![current_id, previous_id, metric], |row| {
                let previous: f64 = row.get(1)?;
                let current: f64 = row.get(2)?;
                Ok(Mover { path: row.get(0)?, previous, current, delta: current - previous })
            })?
            .collect::<std::result::Result<_, _>>()?;

        movers.sort_by(|a, b| {
            b.delta
                .abs()
                .partial_cmp(&a.delta.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        movers.truncate(limit);
        Ok(movers)
    }

    /// Findings persisting across at least `min_persistence` snapshots
    pub fn chronic_findings(&self, min_persistence: i64) -> Result<Vec<ChronicFinding>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.identity_key, l.occurrence_count, l.first_snapshot_id,
                    l.last_snapshot_id, f.finding_type, f.payload_json
             FROM finding_lifecycle l
             JOIN findings f ON f.id = (
                 SELECT MAX(id) FROM findings WHERE identity_key = l.identity_key
             )
             WHERE l.occurrence_count >= ?1
             ORDER BY l.occurrence_count DESC, l.identity_key",
        )?;
        let rows = stmt.query_map([min_persistence], |row| {
            let payload: String = row.get(5)?;
            Ok(ChronicFinding {
                identity_key: row.get(0)?,
                occurrence_count: row.get(1)?,
                first_snapshot_id: row.get(2)?,
                last_snapshot_id: row.get(3)?,
                finding_type: row.get(4)?,
                finding: serde_json::from_str(&payload).ok(),
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(Into::into)
    }
}

/// Delete sidecar snapshots older than the cache TTL. Their contents are
/// already folded into the database by later successful runs.
pub fn prune_stale_sidecars(root: &Path, ttl_hours: u64) {
    let dir = root.join(STATE_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else { return };
    let cutoff = std::time::SystemTime::now()
        .checked_sub(std::time::Duration::from_secs(ttl_hours.saturating_mul(3600)));
    let Some(cutoff) = cutoff else { return };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("snapshot-") || !name.ends_with(".json") {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if stale {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                debug!(error = %e, "failed to prune sidecar");
            }
        }
    }
}

/// Preserve a snapshot to a sidecar JSON next to the database when
/// persistence fails
pub fn write_sidecar(root: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    let dir = root.join(STATE_DIR);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("snapshot-{}.json", snapshot.timestamp));
    std::fs::write(&path, snapshot.to_json()?)?;
    Ok(path)
}

fn numeric(value: &SignalValue) -> Option<f64> {
    match value {
        SignalValue::Label(_) => None,
        other => other.as_f64(),
    }
}

fn encode_hashes(hashes: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(hashes.len() * 8);
    for h in hashes {
        bytes.extend_from_slice(&h.to_le_bytes());
    }
    bytes
}

fn decode_hashes(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .filter_map(|chunk| chunk.try_into().ok().map(u64::from_le_bytes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Evidence, FindingKind};
    use crate::signals::{SignalEntry, SignalMap, Tier};

    fn snapshot_with(
        timestamp: i64,
        files: Vec<(&str, Vec<u64>)>,
        findings: Vec<Finding>,
    ) -> Snapshot {
        let mut file_signals = BTreeMap::new();
        let mut digests = BTreeMap::new();
        for (path, digest) in files {
            let mut map = SignalMap::new();
            map.insert(
                "lines".to_string(),
                SignalEntry::new(SignalValue::Count(digest.len() as u64 * 10)),
            );
            file_signals.insert(path.to_string(), map);
            digests.insert(path.to_string(), digest);
        }
        let mut global = SignalMap::new();
        global.insert(
            "codebase_health".to_string(),
            SignalEntry::new(SignalValue::Float(0.75)),
        );
        Snapshot {
            version: crate::snapshot::SNAPSHOT_VERSION,
            timestamp,
            commit_sha: None,
            tool_version: "test".to_string(),
            root: "/r".to_string(),
            tier: Tier::Full,
            file_signals,
            module_signals: BTreeMap::new(),
            global_signals: global,
            dependency_edges: Vec::new(),
            cochange_edges: Vec::new(),
            modules: Vec::new(),
            layers: BTreeMap::new(),
            violations: Vec::new(),
            findings,
            delta_h: BTreeMap::new(),
            file_digests: digests,
        }
    }

    fn god_finding(path: &str) -> Finding {
        Finding::new(
            FindingKind::GodFile,
            vec![path.to_string()],
            0.9,
            vec![Evidence::new("lines", 900.0, "long")],
        )
    }

    fn open_temp() -> (tempfile::TempDir, HistoryDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = HistoryDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn persist_and_query_round_trip() {
        let (_dir, mut db) = open_temp();
        let mut snapshot =
            snapshot_with(100, vec![("x.py", vec![1, 2, 3])], vec![god_finding("x.py")]);
        let id = db.persist(&mut snapshot).unwrap();

        let latest = db.latest_snapshot().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.file_count, 1);

        let findings = db.findings_of(id).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::GodFile);

        let trend = db.file_trend("x.py", "lines", 5).unwrap();
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].value, 30.0);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let (_dir, mut db) = open_temp();
        let mut first = snapshot_with(200, vec![("x.py", vec![1])], vec![god_finding("x.py")]);
        db.persist(&mut first).unwrap();

        // Clock went backwards between runs
        let mut second = snapshot_with(150, vec![("x.py", vec![1])], vec![god_finding("x.py")]);
        db.persist(&mut second).unwrap();
        assert_eq!(second.timestamp, 200);
    }

    #[test]
    fn lifecycle_counts_occurrences() {
        let (_dir, mut db) = open_temp();
        for i in 0..3 {
            let mut snapshot =
                snapshot_with(100 + i, vec![("x.py", vec![1, 2, 3])], vec![god_finding("x.py")]);
            db.persist(&mut snapshot).unwrap();
        }
        let chronic = db.chronic_findings(3).unwrap();
        assert_eq!(chronic.len(), 1);
        assert_eq!(chronic[0].occurrence_count, 3);
        assert_eq!(chronic[0].finding_type, "god_file");
        assert!(db.chronic_findings(4).unwrap().is_empty());
    }

    #[test]
    fn rename_keeps_lifecycle_continuous() {
        let (_dir, mut db) = open_temp();
        let digest: Vec<u64> = (0..20).collect();

        let mut first =
            snapshot_with(100, vec![("old.py", digest.clone())], vec![god_finding("old.py")]);
        db.persist(&mut first).unwrap();

        // Same content under a new name; same issue against the new path
        let mut second =
            snapshot_with(200, vec![("new.py", digest)], vec![god_finding("new.py")]);
        db.persist(&mut second).unwrap();

        let chronic = db.chronic_findings(2).unwrap();
        assert_eq!(chronic.len(), 1, "rename should keep one continuous lifecycle row");
        assert_eq!(chronic[0].occurrence_count, 2);
    }

    #[test]
    fn dissimilar_new_file_is_not_a_rename() {
        let (_dir, mut db) = open_temp();
        let mut first =
            snapshot_with(100, vec![("old.py", (0..20).collect())], vec![god_finding("old.py")]);
        db.persist(&mut first).unwrap();

        let mut second =
            snapshot_with(200, vec![("new.py", (100..120).collect())], vec![god_finding("new.py")]);
        db.persist(&mut second).unwrap();

        // Two distinct lifecycle rows, each seen once
        assert!(db.chronic_findings(2).unwrap().is_empty());
    }

    #[test]
    fn top_movers_between_last_two() {
        let (_dir, mut db) = open_temp();
        let mut first = snapshot_with(
            100,
            vec![("a.py", vec![1, 2]), ("b.py", vec![3])],
            vec![god_finding("a.py")],
        );
        db.persist(&mut first).unwrap();
        let mut second = snapshot_with(
            200,
            vec![("a.py", vec![1, 2, 3, 4, 5]), ("b.py", vec![3])],
            vec![god_finding("a.py")],
        );
        db.persist(&mut second).unwrap();

        let movers = db.top_movers("lines", 5).unwrap();
        assert_eq!(movers[0].path, "a.py");
        assert_eq!(movers[0].delta, 30.0);
        // b.py did not move
        assert_eq!(movers[1].delta, 0.0);
    }

    #[test]
    fn health_trend() {
        let (_dir, mut db) = open_temp();
        for i in 0..3 {
            let mut snapshot =
                snapshot_with(100 + i, vec![("x.py", vec![1])], vec![god_finding("x.py")]);
            db.persist(&mut snapshot).unwrap();
        }
        let trend = db.codebase_health(2).unwrap();
        assert_eq!(trend.len(), 2);
        assert!(trend[0].snapshot_id < trend[1].snapshot_id);
        assert_eq!(trend[0].value, 0.75);
    }

    #[test]
    fn sidecar_write() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with(123, vec![("x.py", vec![1])], vec![god_finding("x.py")]);
        let path = write_sidecar(dir.path(), &snapshot).unwrap();
        assert!(path.exists());
        let text = std::fs::read_to_string(path).unwrap();
        let back = Snapshot::from_json(&text).unwrap();
        assert_eq!(back.timestamp, 123);
    }
}
