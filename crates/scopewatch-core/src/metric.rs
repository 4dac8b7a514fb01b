//! Metric labels and the per-scope aggregation map.
//!
//! Every scope owns an [`AggregationMap`] keyed by [`MetricLabel`]. Children
//! flush into their parent's map on close; siblings on different flows may do
//! so concurrently, so all writes go through [`AggregationMap::merge`], which
//! adds under the `DashMap` shard lock for that key.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;

use dashmap::DashMap;
use serde::Serialize;

use crate::flow::FlowId;

/// Identity of one scope occurrence.
///
/// `created_at` keeps two invocations with the same textual label and depth
/// apart until they are grouped for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetricLabel {
    pub flow: FlowId,
    pub label: String,
    pub depth: u32,
    /// Clock reading at creation, in nanoseconds.
    pub created_at: u64,
}

impl MetricLabel {
    pub fn new(flow: FlowId, label: impl Into<String>, depth: u32, created_at: u64) -> Self {
        Self {
            flow,
            label: label.into(),
            depth,
            created_at,
        }
    }
}

impl PartialOrd for MetricLabel {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricLabel {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.label.cmp(&other.label))
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| self.flow.cmp(&other.flow))
    }
}

impl fmt::Display for MetricLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.label, self.depth, self.flow)
    }
}

/// Concurrent `MetricLabel -> milliseconds` accumulator.
#[derive(Debug, Default)]
pub struct AggregationMap {
    map: DashMap<MetricLabel, u64>,
}

impl AggregationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `ms` to `label`, inserting it when absent.
    pub fn merge(&self, label: MetricLabel, ms: u64) {
        self.map
            .entry(label)
            .and_modify(|v| *v = v.saturating_add(ms))
            .or_insert(ms);
    }

    /// Merge every entry of `other` into `self`.
    pub fn merge_from(&self, other: &AggregationMap) {
        for r in other.map.iter() {
            self.merge(r.key().clone(), *r.value());
        }
    }

    pub fn get(&self, label: &MetricLabel) -> Option<u64> {
        self.map.get(label).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Copy out the current entries. Best effort under concurrent merges.
    pub(crate) fn entries(&self) -> Vec<(MetricLabel, u64)> {
        self.map
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }
}
