//! Text rendering for run summaries, findings, and history views

use std::fmt::Write;

use chrono::{TimeZone, Utc};

use crate::engine::RunSummary;
use crate::findings::Finding;
use crate::history::{ChronicFinding, SnapshotRow, TrendPoint};
use crate::snapshot::Snapshot;

/// Render the end-of-run summary: scan counts, skips, findings, snapshot
/// disposition
pub fn render_summary(snapshot: &Snapshot, summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "shannon insight v{}", snapshot.tool_version);
    let _ = writeln!(out, "root: {}", snapshot.root);
    let _ = writeln!(
        out,
        "files scanned: {} ({} skipped: {} oversize, {} binary, {} unreadable)",
        summary.files_scanned,
        summary.scan.skipped_oversize + summary.scan.skipped_binary + summary.scan.skipped_unreadable,
        summary.scan.skipped_oversize,
        summary.scan.skipped_binary,
        summary.scan.skipped_unreadable,
    );
    let _ = writeln!(out, "commits read: {}", summary.commit_count);
    if let Some(tier) = summary.tier {
        let _ = writeln!(out, "normalization tier: {:?}", tier);
    }

    if summary.analyzers_skipped.is_empty() {
        let _ = writeln!(out, "analyzers skipped: 0");
    } else {
        let _ = writeln!(out, "analyzers skipped: {}", summary.analyzers_skipped.len());
        for (name, reason) in &summary.analyzers_skipped {
            let _ = writeln!(out, "  - {}: {}", name, reason);
        }
    }
    if summary.finders_skipped.is_empty() {
        let _ = writeln!(out, "finders skipped: 0");
    } else {
        let _ = writeln!(out, "finders skipped: {}", summary.finders_skipped.len());
        for (name, reason) in &summary.finders_skipped {
            let _ = writeln!(out, "  - {}: {}", name, reason);
        }
    }

    let _ = writeln!(out, "findings: {}", summary.findings_count);
    if let Some(health) = summary.health {
        let _ = writeln!(out, "codebase health: {:.2}", health);
    }
    match (summary.snapshot_id, &summary.sidecar) {
        (Some(id), _) => {
            let _ = writeln!(out, "snapshot: #{}", id);
        }
        (None, Some(path)) => {
            let _ = writeln!(
                out,
                "warning: no snapshot written ({}), preserved to {}",
                summary.persistence_error.as_deref().unwrap_or("persistence failed"),
                path.display()
            );
        }
        (None, None) => {
            let _ = writeln!(out, "snapshot: not written (cache disabled)");
        }
    }
    out
}

/// Render ranked findings with their evidence lines
pub fn render_findings(findings: &[Finding], limit: usize) -> String {
    let mut out = String::new();
    if findings.is_empty() {
        let _ = writeln!(out, "no findings");
        return out;
    }
    for (rank, finding) in findings.iter().take(limit).enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. [{}] {} (severity {:.2}, confidence {:.2}, effort {})",
            rank + 1,
            finding.kind.as_str(),
            finding.entities.join(", "),
            finding.severity,
            finding.confidence,
            finding.effort.as_str(),
        );
        for evidence in &finding.evidence {
            match evidence.percentile {
                Some(p) => {
                    let _ = writeln!(
                        out,
                        "      {} = {:.3} (p{:.0}): {}",
                        evidence.signal,
                        evidence.value,
                        p * 100.0,
                        evidence.note
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "      {} = {:.3}: {}",
                        evidence.signal, evidence.value, evidence.note
                    );
                }
            }
        }
    }
    if findings.len() > limit {
        let _ = writeln!(out, "... and {} more", findings.len() - limit);
    }
    out
}

/// Per-file signal table for `explain`
pub fn render_explain(snapshot: &Snapshot, path: &str) -> String {
    let mut out = String::new();
    let Some(map) = snapshot.file_signals.get(path) else {
        let _ = writeln!(out, "no signals recorded for {}", path);
        return out;
    };
    let _ = writeln!(out, "signals for {}", path);
    for (name, entry) in map {
        let value = match &entry.value {
            crate::signals::SignalValue::Label(l) => l.clone(),
            crate::signals::SignalValue::Flag(b) => b.to_string(),
            other => match other.as_f64() {
                Some(v) => format!("{:.4}", v),
                None => "-".to_string(),
            },
        };
        match entry.percentile {
            Some(p) => {
                let _ = writeln!(out, "  {:<24} {:>12}  p{:.0}", name, value, p * 100.0);
            }
            None => {
                let _ = writeln!(out, "  {:<24} {:>12}", name, value);
            }
        }
    }
    if let Some(delta) = snapshot.delta_h.get(path) {
        let _ = writeln!(out, "  {:<24} {:>12.4}", "health_laplacian", delta);
    }
    out
}

/// Health view: global composites plus per-module health
pub fn render_health(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for name in ["codebase_health", "wiring_score", "architecture_health", "modularity", "fiedler_value"] {
        if let Some(value) = snapshot.global_signals.get(name).and_then(|e| e.value.as_f64()) {
            let _ = writeln!(out, "{:<22} {:.3}", name, value);
        }
    }
    if !snapshot.module_signals.is_empty() {
        let _ = writeln!(out, "\nmodules:");
        for (module, map) in &snapshot.module_signals {
            let health = map
                .get("health_score")
                .and_then(|e| e.value.as_f64())
                .map(|h| format!("{:.2}", h))
                .unwrap_or_else(|| "-".to_string());
            let instability = map
                .get("instability")
                .and_then(|e| e.value.as_f64())
                .map(|i| format!("{:.2}", i))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  {:<28} health {}  instability {}  layer {}",
                module,
                health,
                instability,
                snapshot.layers.get(module).map(|l| l.to_string()).unwrap_or_else(|| "-".into())
            );
        }
    }
    out
}

/// Snapshot list plus chronic findings for `history`
pub fn render_history(
    snapshots: &[SnapshotRow],
    health: &[TrendPoint],
    chronic: &[ChronicFinding],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "snapshots:");
    for row in snapshots {
        let when = Utc
            .timestamp_opt(row.timestamp, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| row.timestamp.to_string());
        let _ = writeln!(
            out,
            "  #{:<4} {}  {} files  {}",
            row.id,
            when,
            row.file_count,
            row.commit_sha.as_deref().map(|s| &s[..8.min(s.len())]).unwrap_or("-"),
        );
    }
    if !health.is_empty() {
        let _ = write!(out, "health trend:");
        for point in health {
            let _ = write!(out, " {:.2}", point.value);
        }
        let _ = writeln!(out);
    }
    if !chronic.is_empty() {
        let _ = writeln!(out, "chronic findings:");
        for item in chronic {
            let entities = item
                .finding
                .as_ref()
                .map(|f| f.entities.join(", "))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  [{}] {} seen {}x (snapshots #{}..#{})",
                item.finding_type,
                entities,
                item.occurrence_count,
                item.first_snapshot_id,
                item.last_snapshot_id
            );
        }
    }
    out
}

/// New / resolved / persisting findings between two runs
pub fn render_diff(previous: &[Finding], current: &[Finding]) -> String {
    let prev_keys: ahash::AHashSet<&str> =
        previous.iter().map(|f| f.identity_key.as_str()).collect();
    let cur_keys: ahash::AHashSet<&str> =
        current.iter().map(|f| f.identity_key.as_str()).collect();

    let new: Vec<&Finding> =
        current.iter().filter(|f| !prev_keys.contains(f.identity_key.as_str())).collect();
    let resolved: Vec<&Finding> =
        previous.iter().filter(|f| !cur_keys.contains(f.identity_key.as_str())).collect();
    let persisting = current.len() - new.len();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} new, {} resolved, {} persisting",
        new.len(),
        resolved.len(),
        persisting
    );
    for finding in &new {
        let _ = writeln!(out, "  + [{}] {}", finding.kind.as_str(), finding.entities.join(", "));
    }
    for finding in &resolved {
        let _ = writeln!(out, "  - [{}] {}", finding.kind.as_str(), finding.entities.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Evidence, FindingKind};

    fn finding(kind: FindingKind, path: &str) -> Finding {
        Finding::new(
            kind,
            vec![path.to_string()],
            0.8,
            vec![Evidence::new("lines", 100.0, "test evidence")],
        )
    }

    #[test]
    fn diff_classifies_findings() {
        let previous = vec![
            finding(FindingKind::GodFile, "a.py"),
            finding(FindingKind::OrphanCode, "b.py"),
        ];
        let current = vec![
            finding(FindingKind::GodFile, "a.py"),
            finding(FindingKind::NamingDrift, "c.py"),
        ];
        let text = render_diff(&previous, &current);
        assert!(text.starts_with("1 new, 1 resolved, 1 persisting"));
        assert!(text.contains("+ [naming_drift] c.py"));
        assert!(text.contains("- [orphan_code] b.py"));
    }

    #[test]
    fn findings_rendering_includes_evidence() {
        let text = render_findings(&[finding(FindingKind::GodFile, "a.py")], 10);
        assert!(text.contains("[god_file] a.py"));
        assert!(text.contains("lines = 100.000"));
        assert!(text.contains("test evidence"));
    }
}
