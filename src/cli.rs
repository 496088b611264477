//! CLI argument definitions and command dispatch

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::InsightConfig;
use crate::engine::Engine;
use crate::error::{InsightError, Result};
use crate::history::HistoryDb;
use crate::report;

/// Evidence-based codebase analysis
#[derive(Parser, Debug)]
#[command(name = "shannon")]
#[command(about = "Ranked architectural findings and a health score for a source tree")]
#[command(version)]
pub struct Cli {
    /// Analysis root
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Maximum findings shown in text output
    #[arg(long, default_value = "20", global = true)]
    pub top: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full analysis (the default)
    Analyze,
    /// Compare the latest two runs: new, resolved, persisting findings
    Diff,
    /// Show every signal recorded for one file
    Explain {
        /// Path relative to the analysis root
        file: String,
    },
    /// Show health composites; optionally enforce a quality gate
    Health {
        /// Fail (exit code 3) when codebase health is below this
        #[arg(long, value_name = "THRESHOLD")]
        gate: Option<f64>,
    },
    /// List recent snapshots, the health trend, and chronic findings
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Minimum snapshot persistence for a finding to count as chronic
        #[arg(long, default_value = "3")]
        min_persistence: i64,
    },
    /// Export the latest analysis
    Report {
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Dispatch the selected command. Returns printable output.
    pub fn execute(self) -> Result<String> {
        let root = self
            .path
            .canonicalize()
            .map_err(|_| InsightError::RootNotFound { path: self.path.display().to_string() })?;
        let config = InsightConfig::load(&root)?;

        match self.command.unwrap_or(Command::Analyze) {
            Command::Analyze => {
                let outcome = Engine::new(config).run(&root)?;
                let mut out = report::render_summary(&outcome.snapshot, &outcome.summary);
                out.push('\n');
                out.push_str(&report::render_findings(&outcome.snapshot.findings, self.top));
                Ok(out)
            }
            Command::Diff => {
                let db = HistoryDb::open(&root)?;
                let snapshots = db.recent_snapshots(2)?;
                if snapshots.len() < 2 {
                    return Ok("need at least two snapshots to diff; run analyze first\n".into());
                }
                let current = db.findings_of(snapshots[0].id)?;
                let previous = db.findings_of(snapshots[1].id)?;
                Ok(report::render_diff(&previous, &current))
            }
            Command::Explain { file } => {
                let outcome = Engine::new(config).run(&root)?;
                Ok(report::render_explain(&outcome.snapshot, &file))
            }
            Command::Health { gate } => {
                let outcome = Engine::new(config).run(&root)?;
                let text = report::render_health(&outcome.snapshot);
                if let Some(threshold) = gate {
                    let health = outcome.snapshot.codebase_health().unwrap_or(0.0);
                    if health < threshold {
                        return Err(InsightError::GateFailed {
                            reason: format!("codebase health {:.2} < {:.2}", health, threshold),
                        });
                    }
                    info!(health, threshold, "quality gate passed");
                }
                Ok(text)
            }
            Command::History { limit, min_persistence } => {
                let db = HistoryDb::open(&root)?;
                let snapshots = db.recent_snapshots(limit)?;
                let health = db.codebase_health(limit)?;
                let chronic = db.chronic_findings(min_persistence)?;
                Ok(report::render_history(&snapshots, &health, &chronic))
            }
            Command::Report { format, output } => {
                let outcome = Engine::new(config).run(&root)?;
                let text = match format {
                    ReportFormat::Json => outcome.snapshot.to_json()?,
                    ReportFormat::Text => {
                        let mut out =
                            report::render_summary(&outcome.snapshot, &outcome.summary);
                        out.push('\n');
                        out.push_str(&report::render_health(&outcome.snapshot));
                        out.push('\n');
                        out.push_str(&report::render_findings(
                            &outcome.snapshot.findings,
                            usize::MAX,
                        ));
                        out
                    }
                };
                match output {
                    Some(path) => {
                        std::fs::write(&path, &text)?;
                        Ok(format!("report written to {}\n", path.display()))
                    }
                    None => Ok(text),
                }
            }
        }
    }
}
