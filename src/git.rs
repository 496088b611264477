//! Git history extraction
//!
//! Uses subprocess calls to git for maximum compatibility. The log
//! subprocess runs under a scoped guard with a hard timeout; a missing
//! repository or a timed-out subprocess yields an empty history, never an
//! error.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::TemporalConfig;

/// Field delimiter in the log format string. Unit separator cannot occur
/// in the fixed-width header fields (SHA, epoch) preceding the subject.
const FIELD_SEP: char = '\x1f';

/// One commit, newest-first in [`GitHistory`]
#[derive(Debug, Clone)]
pub struct Commit {
    /// Full 40-hex SHA
    pub sha: String,
    /// Author timestamp, epoch seconds
    pub timestamp: i64,
    /// Author email
    pub author: String,
    /// Subject line, verbatim
    pub subject: String,
    /// Touched file paths, normalized to the analysis root
    pub files: Vec<String>,
}

/// Ordered commit list for the analysis root
#[derive(Debug, Clone, Default)]
pub struct GitHistory {
    /// Newest first
    pub commits: Vec<Commit>,
    /// SHA of the working tree HEAD, when known
    pub head_sha: Option<String>,
}

impl GitHistory {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Child process guard: kills the subprocess on drop, success or failure
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Extract history for a root directory.
///
/// Returns an empty history when the root is not inside a working tree,
/// git is unavailable, or the subprocess exceeds its timeout.
pub fn extract(root: &Path, config: &TemporalConfig) -> GitHistory {
    let Some(repo_root) = repo_toplevel(root) else {
        info!("no git repository at analysis root, temporal analysis disabled");
        return GitHistory::default();
    };

    // Paths in git output are relative to the repo root; the analysis root
    // may sit below it
    let prefix = root
        .canonicalize()
        .ok()
        .and_then(|abs| abs.strip_prefix(&repo_root).ok().map(|p| p.to_path_buf()))
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    let timeout = Duration::from_secs(config.git_timeout_seconds);
    let format = "--format=%H%x1f%at%x1f%ae%x1f%s";
    let limit = format!("-n{}", config.max_commits);
    let output = match run_with_timeout(
        Command::new("git")
            .arg("-C")
            .arg(root)
            .args(["log", "--name-only", "--no-color", &limit, format]),
        timeout,
    ) {
        Some(out) => out,
        None => {
            warn!(timeout_s = config.git_timeout_seconds, "git log timed out, treating as no history");
            return GitHistory::default();
        }
    };

    let mut history = parse_log(&output, &prefix);
    history.head_sha = head_sha(root);
    history
}

/// Run a command with a hard timeout; None on timeout or spawn failure
fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Option<String> {
    let child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .ok()?;
    let mut guard = ChildGuard(child);

    let mut stdout = guard.0.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    loop {
        match guard.0.try_wait() {
            Ok(Some(status)) => {
                let bytes = reader.join().ok()?;
                if !status.success() {
                    return None;
                }
                return Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    // Guard's drop kills the child
                    return None;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(_) => return None,
        }
    }
}

/// Parse `git log --name-only` output into commits.
///
/// Merge commits list no files and are dropped.
fn parse_log(output: &str, prefix: &str) -> GitHistory {
    let mut commits = Vec::new();
    let mut current: Option<Commit> = None;

    for line in output.lines() {
        if line.contains(FIELD_SEP) {
            if let Some(commit) = current.take() {
                if !commit.files.is_empty() {
                    commits.push(commit);
                }
            }
            let mut parts = line.splitn(4, FIELD_SEP);
            let sha = parts.next().unwrap_or("").to_string();
            let timestamp = parts.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            let author = parts.next().unwrap_or("").to_string();
            let subject = parts.next().unwrap_or("").to_string();
            if sha.len() == 40 {
                current = Some(Commit { sha, timestamp, author, subject, files: Vec::new() });
            }
        } else if !line.trim().is_empty() {
            if let Some(commit) = &mut current {
                if let Some(path) = normalize_file(line.trim(), prefix) {
                    commit.files.push(path);
                }
            }
        }
    }
    if let Some(commit) = current.take() {
        if !commit.files.is_empty() {
            commits.push(commit);
        }
    }

    GitHistory { commits, head_sha: None }
}

/// Strip the analysis-root prefix; files outside the root are dropped
fn normalize_file(path: &str, prefix: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    if prefix.is_empty() {
        return Some(normalized);
    }
    normalized
        .strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches('/').to_string())
        .filter(|rest| !rest.is_empty())
}

fn repo_toplevel(root: &Path) -> Option<std::path::PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["rev-parse", "--show-toplevel"])
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        std::path::PathBuf::from(text).canonicalize().ok()
    }
}

fn head_sha(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["rev-parse", "HEAD"])
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.len() == 40 {
        Some(sha)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_basic() {
        let output = "abcdefabcdefabcdefabcdefabcdefabcdefabcd\x1f1700000000\x1falice@example.com\x1fFix parser | edge case\n\
                      src/a.py\n\
                      src/b.py\n\
                      \n\
                      1234567812345678123456781234567812345678\x1f1699000000\x1fbob@example.com\x1fMerge branch 'main'\n";
        let history = parse_log(output, "");
        // Merge commit with no files is dropped
        assert_eq!(history.commits.len(), 1);
        let commit = &history.commits[0];
        assert_eq!(commit.author, "alice@example.com");
        // Subject is verbatim, even with delimiter-ish characters
        assert_eq!(commit.subject, "Fix parser | edge case");
        assert_eq!(commit.files, vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn parse_log_prefix_stripping() {
        let output = "abcdefabcdefabcdefabcdefabcdefabcdefabcd\x1f1700000000\x1fa@x.com\x1fmsg\n\
                      backend/src/a.py\n\
                      frontend/app.ts\n";
        let history = parse_log(output, "backend");
        assert_eq!(history.commits.len(), 1);
        assert_eq!(history.commits[0].files, vec!["src/a.py"]);
    }

    #[test]
    fn non_repo_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = extract(dir.path(), &crate::config::TemporalConfig::default());
        assert!(history.is_empty());
        assert!(history.head_sha.is_none());
    }

    #[test]
    fn real_repo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir.path())
                .args(args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {:?} failed", args);
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "t@example.com"]);
        run(&["config", "user.name", "T"]);
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "add a"]);
        std::fs::write(dir.path().join("a.py"), "x = 2\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "fix: bump"]);

        let history = extract(dir.path(), &crate::config::TemporalConfig::default());
        assert_eq!(history.commits.len(), 2);
        // Newest first
        assert_eq!(history.commits[0].subject, "fix: bump");
        assert_eq!(history.commits[0].files, vec!["a.py"]);
        assert!(history.head_sha.is_some());
    }
}
