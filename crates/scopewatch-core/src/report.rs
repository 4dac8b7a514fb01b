//! Report rendering for collected snapshots.
//!
//! Pure formatting over [`Snapshot::grouped`]: rows are indented with one `.`
//! per level below the shallowest depth present.

use std::fmt::Write;

use crate::error::{Result, ScopeError};
use crate::snapshot::Snapshot;

const METRIC_TITLE: &str = "Metric";
const DURATION_TITLE: &str = "Duration (ms)";

/// Render as a two-column text table. Empty snapshot -> empty string.
///
/// ```text
/// | Metric   | Duration (ms) |
/// |––––––––––––––––––––––––––|
/// | req      |        120 ms |
/// | .req_db  |         80 ms |
/// ```
pub fn render_table(snapshot: &Snapshot) -> String {
    let Some(min_depth) = snapshot.min_depth() else {
        return String::new();
    };

    let rows: Vec<(String, String)> = snapshot
        .grouped()
        .into_iter()
        .map(|g| {
            let indent = ".".repeat(g.depth.saturating_sub(min_depth) as usize);
            (format!("{indent}{}", g.label), format!("{} ms", g.milliseconds))
        })
        .collect();

    let (key_w, val_w) = rows.iter().fold(
        (METRIC_TITLE.chars().count(), DURATION_TITLE.chars().count()),
        |(kw, vw), (k, v)| (kw.max(k.chars().count()), vw.max(v.chars().count())),
    );

    let mut out = String::new();
    let _ = writeln!(out, "| {METRIC_TITLE:<key_w$} | {DURATION_TITLE:>val_w$} |");
    let _ = writeln!(out, "|{}|", "–".repeat(key_w + val_w + 5));
    for (k, v) in &rows {
        let _ = writeln!(out, "| {k:<key_w$} | {v:>val_w$} |");
    }
    out
}

/// Render the grouped rows as pretty JSON.
pub fn render_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(&snapshot.grouped())
        .map_err(|e| ScopeError::Internal(format!("report serialization failed: {e}")))
}
