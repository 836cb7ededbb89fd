//! Human-facing query surface over [`StatsStore`]
//!
//! These functions never fail. Store errors are logged and turned into a
//! neutral value so callers (the IPC handler, the CLI) can print whatever
//! they get back.

use std::fmt::Write as _;
use std::path::Path;

use crate::store::{AppStats, StatsStore};

/// Returned by [`app_statistics`] when the store could not be queried
pub const NO_STATISTICS: &str = "No statistics available";

/// Rows in the global ranking at the top of [`export_report`]
pub const EXPORT_LIMIT: usize = 100;

const RULE_WIDTH: usize = 40;

/// Ranked table of the app's combinations, followed by its totals.
///
/// `None` lists every combination.
pub fn app_statistics(store: &StatsStore, app_name: &str, limit: Option<usize>) -> String {
    match store.stats_for_app(app_name, limit) {
        Ok(stats) => format_app_stats(&stats),
        Err(e) => {
            tracing::warn!("Failed to query statistics for {}: {}", app_name, e);
            NO_STATISTICS.to_string()
        }
    }
}

fn format_app_stats(stats: &AppStats) -> String {
    if stats.rows.is_empty() {
        return format!("No key presses recorded for {} yet.\n", stats.app_name);
    }

    let mut out = String::new();
    for (rank, row) in stats.rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {:<25}{:>6} times",
            rank + 1,
            row.signature,
            row.press_count
        );
    }
    let _ = write!(out, "\n{}\n", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Total combinations: {}", stats.total_combinations);
    let _ = writeln!(out, "Total key presses: {}", stats.total_presses);
    out
}

pub fn all_apps(store: &StatsStore) -> Vec<String> {
    store.all_apps().unwrap_or_else(|e| {
        tracing::warn!("Failed to list applications: {}", e);
        Vec::new()
    })
}

pub fn clear_statistics(store: &StatsStore) -> bool {
    match store.clear_all() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Failed to clear statistics: {}", e);
            false
        }
    }
}

/// Combinations ranked across all applications
pub fn top_key_presses(store: &StatsStore, limit: usize) -> String {
    let ranked = match store.top_signatures(limit) {
        Ok(ranked) => ranked,
        Err(e) => {
            tracing::warn!("Failed to rank key presses: {}", e);
            return NO_STATISTICS.to_string();
        }
    };

    if ranked.is_empty() {
        return "No key presses recorded yet.\n".to_string();
    }

    let mut out = String::new();
    for (rank, (signature, count)) in ranked.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {:<25}{:>6} times", rank + 1, signature, count);
    }
    out
}

/// Total presses across all apps, `-1` if the store could not be queried
pub fn total_key_presses(store: &StatsStore) -> i64 {
    match store.total_presses() {
        Ok(total) => i64::try_from(total).unwrap_or(i64::MAX),
        Err(e) => {
            tracing::warn!("Failed to count key presses: {}", e);
            -1
        }
    }
}

/// Total presses for one app, `-1` if the store could not be queried
pub fn app_key_press_count(store: &StatsStore, app_name: &str) -> i64 {
    match store.presses_for_app(app_name) {
        Ok(total) => i64::try_from(total).unwrap_or(i64::MAX),
        Err(e) => {
            tracing::warn!("Failed to count key presses for {}: {}", app_name, e);
            -1
        }
    }
}

/// Global top list followed by every application's full statistics
pub fn export_report(store: &StatsStore) -> String {
    let mut out = top_key_presses(store, EXPORT_LIMIT);
    for app in all_apps(store) {
        let _ = write!(out, "\nStatistics for {}:\n", app);
        out.push_str(&app_statistics(store, &app, None));
    }
    out
}

pub fn write_export(store: &StatsStore, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, export_report(store))?;
    tracing::info!("Exported statistics to {}", path.display());
    Ok(())
}
