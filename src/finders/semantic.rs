//! Semantic finders: naming drift and stale TODO accumulation

use crate::config::InsightConfig;
use crate::finders::Finder;
use crate::findings::{Evidence, Finding, FindingKind};
use crate::signals::Tier;
use crate::store::{slots, Store};

/// Drift below this is never flagged, regardless of percentile
const MIN_DRIFT: f64 = 0.7;
/// Absolute-tier drift threshold
const ABSOLUTE_DRIFT: f64 = 0.8;
/// Absolute-tier TODO density (markers per 100 lines)
const ABSOLUTE_TODO_DENSITY: f64 = 5.0;
/// Minimum raw marker count in percentile tiers
const MIN_TODO_COUNT: f64 = 5.0;

/// Filenames that no longer describe their contents.
///
/// Percentile variant: drift >= p90 and above 0.7. Absolute variant:
/// drift above 0.8.
pub struct NamingDriftFinder;

impl Finder for NamingDriftFinder {
    fn name(&self) -> &'static str {
        "naming_drift"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::SEMANTIC, slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(field) = store.signals.get() else { return Vec::new() };

        let mut findings = Vec::new();
        for path in field.files.keys() {
            let drift = field.file_value(path, "naming_drift").unwrap_or(0.0);
            let hit = match field.tier {
                Tier::Absolute => drift > ABSOLUTE_DRIFT,
                _ => {
                    drift > MIN_DRIFT
                        && field.file_percentile(path, "naming_drift").unwrap_or(0.0) >= 0.9
                }
            };
            if !hit {
                continue;
            }
            findings.push(Finding::new(
                FindingKind::NamingDrift,
                vec![path.clone()],
                drift,
                vec![Evidence::new(
                    "naming_drift",
                    drift,
                    "filename shares no vocabulary with contents",
                )
                .with_percentile(field.file_percentile(path, "naming_drift"))],
            ));
        }
        findings
    }
}

/// Files accumulating TODO/FIXME markers faster than they are resolved.
///
/// Percentile variant: density >= p90 with at least five markers.
/// Absolute variant: density above five per hundred lines.
pub struct StaleTodoFinder;

impl Finder for StaleTodoFinder {
    fn name(&self) -> &'static str {
        "stale_todos"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS, slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(files) = store.file_metrics.get() else { return Vec::new() };
        let Some(field) = store.signals.get() else { return Vec::new() };

        let mut findings = Vec::new();
        for file in files {
            let path = &file.metrics.path;
            let count = file.syntax.as_ref().map(|s| s.todo_count).unwrap_or(0) as f64;
            let density = field.file_value(path, "todo_density").unwrap_or(0.0);

            let hit = match field.tier {
                Tier::Absolute => density > ABSOLUTE_TODO_DENSITY,
                _ => {
                    count >= MIN_TODO_COUNT
                        && field.file_percentile(path, "todo_density").unwrap_or(0.0) >= 0.9
                }
            };
            if !hit {
                continue;
            }
            findings.push(Finding::new(
                FindingKind::StaleTodos,
                vec![path.clone()],
                0.7,
                vec![Evidence::new(
                    "todo_density",
                    density,
                    format!("{} unresolved markers", count as usize),
                )
                .with_percentile(field.file_percentile(path, "todo_density"))],
            ));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{SignalEntry, SignalField, SignalMap, SignalValue};

    fn field_with(tier: Tier, path: &str, name: &str, value: f64, pct: Option<f64>) -> SignalField {
        let mut field = SignalField::new(tier);
        let mut map = SignalMap::new();
        let mut entry = SignalEntry::new(SignalValue::Float(value));
        entry.percentile = pct;
        map.insert(name.to_string(), entry);
        field.files.insert(path.to_string(), map);
        field
    }

    #[test]
    fn naming_drift_absolute_variant() {
        let store = Store::new();
        store.semantic.set(slots::SEMANTIC, Default::default());
        store
            .signals
            .set(slots::SIGNALS, field_with(Tier::Absolute, "odd.py", "naming_drift", 0.95, None));
        let findings = NamingDriftFinder.find(&store, &InsightConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::NamingDrift);
    }

    #[test]
    fn naming_drift_percentile_variant_needs_both() {
        let store = Store::new();
        store.semantic.set(slots::SEMANTIC, Default::default());
        // High percentile but low raw drift: not flagged
        store
            .signals
            .set(slots::SIGNALS, field_with(Tier::Full, "x.py", "naming_drift", 0.4, Some(0.99)));
        assert!(NamingDriftFinder.find(&store, &InsightConfig::default()).is_empty());
    }
}
