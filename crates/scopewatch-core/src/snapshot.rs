//! Immutable views over a scope's aggregation map.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metric::MetricLabel;

/// Point-in-time copy of an aggregation map. Later merges into the scope it
/// came from do not show up here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    rows: BTreeMap<MetricLabel, u64>,
}

/// Rows sharing a textual label, folded together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedMetric {
    pub label: String,
    /// Earliest creation time in the group.
    pub created_at: u64,
    /// Shallowest depth in the group.
    pub depth: u32,
    pub milliseconds: u64,
}

impl Snapshot {
    pub(crate) fn from_entries(entries: Vec<(MetricLabel, u64)>) -> Self {
        Self {
            rows: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by creation time, then label.
    pub fn iter(&self) -> impl Iterator<Item = (&MetricLabel, u64)> {
        self.rows.iter().map(|(k, v)| (k, *v))
    }

    pub fn get(&self, label: &MetricLabel) -> Option<u64> {
        self.rows.get(label).copied()
    }

    /// Sum over every row with this textual label.
    pub fn total_for(&self, label: &str) -> Option<u64> {
        self.rows
            .iter()
            .filter(|(k, _)| k.label == label)
            .map(|(_, v)| *v)
            .reduce(|a, b| a.saturating_add(b))
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.rows.keys().any(|k| k.label == label)
    }

    pub fn min_depth(&self) -> Option<u32> {
        self.rows.keys().map(|k| k.depth).min()
    }

    /// Group rows by textual label: durations summed, earliest `created_at`
    /// and shallowest depth kept. Ordered by `created_at`, then label.
    pub fn grouped(&self) -> Vec<GroupedMetric> {
        let mut groups: BTreeMap<&str, GroupedMetric> = BTreeMap::new();
        for (k, ms) in &self.rows {
            groups
                .entry(k.label.as_str())
                .and_modify(|g| {
                    g.created_at = g.created_at.min(k.created_at);
                    g.depth = g.depth.min(k.depth);
                    g.milliseconds = g.milliseconds.saturating_add(*ms);
                })
                .or_insert_with(|| GroupedMetric {
                    label: k.label.clone(),
                    created_at: k.created_at,
                    depth: k.depth,
                    milliseconds: *ms,
                });
        }

        let mut out: Vec<GroupedMetric> = groups.into_values().collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.label.cmp(&b.label))
        });
        out
    }
}
