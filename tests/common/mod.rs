//! Shared test fixtures: a scratch repository builder with git support

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

/// A scratch source tree, optionally git-backed, for engine tests
pub struct TestRepo {
    dir: TempDir,
    commit_epoch: i64,
}

impl TestRepo {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("create temp dir"), commit_epoch: 1_700_000_000 }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parents");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn git_init(&self) {
        self.git(&["init", "-q"]);
        self.git(&["config", "user.email", "fixture@example.com"]);
        self.git(&["config", "user.name", "Fixture"]);
    }

    /// Append a marker line to each listed file, then commit them all.
    /// Commit timestamps advance one day per commit.
    pub fn commit(&mut self, author_email: &str, subject: &str, files: &[&str]) {
        for rel in files {
            let path = self.dir.path().join(rel);
            let mut content = std::fs::read_to_string(&path).unwrap_or_default();
            content.push_str(&format!("# rev {}\n", self.commit_epoch));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create parents");
            }
            std::fs::write(&path, content).expect("touch file");
        }
        self.git(&["add", "-A"]);

        self.commit_epoch += 86_400;
        let date = format!("{} +0000", self.commit_epoch);
        let status = Command::new("git")
            .arg("-C")
            .arg(self.dir.path())
            .args(["commit", "-q", "--allow-empty", "-m", subject])
            .env("GIT_AUTHOR_NAME", "Author")
            .env("GIT_AUTHOR_EMAIL", author_email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_NAME", "Author")
            .env("GIT_COMMITTER_EMAIL", author_email)
            .env("GIT_COMMITTER_DATE", &date)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("run git commit");
        assert!(status.success(), "git commit failed");
    }

    fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(self.dir.path())
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("run git");
        assert!(status.success(), "git {:?} failed", args);
    }
}

/// A python file body with `n` trivially distinct functions
pub fn python_functions(prefix: &str, n: usize) -> String {
    let mut out = String::new();
    for i in 0..n {
        out.push_str(&format!(
            "def {prefix}_{i}(value):\n    if value > {i}:\n        if value % 2 == 0:\n            return value * {i}\n    return 0\n\n"
        ));
    }
    out
}
