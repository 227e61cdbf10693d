//! Preflight: whole-transaction validation before any mutation.
//!
//! Checks run read-only and either all pass or the transaction aborts
//! with zero side effects: free space for the cross-volume byte total
//! (plus a safety margin), writability of the nearest existing ancestor
//! of every destination parent, path-length limits, and destination name
//! sanity. Existing destination files are reported as conflicts for the
//! resolution pass, not failures.

use std::collections::HashMap;
use std::path::PathBuf;

use shelvex_model::PreflightReport;
use tracing::debug;

use super::MoverConfig;
use super::transaction::MoveTransaction;
use super::volume::{device_id, nearest_existing_ancestor};
use crate::planner::sanitize::{INVALID_CHARS, NamingRules};

pub fn run_preflight(
    tx: &MoveTransaction,
    naming: &NamingRules,
    config: &MoverConfig,
) -> PreflightReport {
    let mut report = PreflightReport::default();

    for op in tx.ops() {
        let dest_str = op.destination.to_string_lossy();
        if dest_str.len() > config.path_length_limit {
            report.path_len_ok = false;
            report.errors.push(format!(
                "path too long ({} > {}): {dest_str}",
                dest_str.len(),
                config.path_length_limit
            ));
        }

        if let Some(name) = op.destination.file_name().map(|n| n.to_string_lossy()) {
            let stem = name.split('.').next().unwrap_or(&name);
            if name.contains(INVALID_CHARS)
                || naming.reserved_names.contains(&stem.to_uppercase())
            {
                report.path_len_ok = false;
                report
                    .errors
                    .push(format!("destination name not sanitized: {name}"));
            }
        }

        if op.destination.exists() {
            report.conflicts.push(op.destination.clone());
        }
    }

    // Writability of every destination parent (or the nearest ancestor
    // that exists; missing parents are created during execution).
    let mut checked: Vec<PathBuf> = Vec::new();
    for op in tx.ops() {
        let Some(parent) = op.destination.parent() else {
            report.perms_ok = false;
            report
                .errors
                .push(format!("destination has no parent: {}", op.destination.display()));
            continue;
        };
        if checked.iter().any(|p| p == parent) {
            continue;
        }
        checked.push(parent.to_path_buf());

        match nearest_existing_ancestor(parent) {
            Some(anchor) => match std::fs::metadata(anchor) {
                Ok(md) if md.is_dir() => {
                    if md.permissions().readonly() {
                        report.perms_ok = false;
                        report
                            .errors
                            .push(format!("destination not writable: {}", anchor.display()));
                    }
                }
                Ok(_) => {
                    report.perms_ok = false;
                    report
                        .errors
                        .push(format!("destination parent is a file: {}", anchor.display()));
                }
                Err(err) => {
                    report.perms_ok = false;
                    report
                        .errors
                        .push(format!("cannot stat {}: {err}", anchor.display()));
                }
            },
            None => {
                report.perms_ok = false;
                report.errors.push(format!(
                    "no existing ancestor for destination: {}",
                    parent.display()
                ));
            }
        }
    }

    // Free space, aggregated per destination volume, for cross-volume
    // copies only; renames consume no new space.
    let mut per_volume: HashMap<u64, (PathBuf, u64)> = HashMap::new();
    for op in tx.ops().filter(|op| !op.same_volume) {
        let Some(anchor) = op
            .destination
            .parent()
            .and_then(nearest_existing_ancestor)
        else {
            continue;
        };
        let Ok(volume) = device_id(anchor) else {
            continue;
        };
        let entry = per_volume
            .entry(volume)
            .or_insert_with(|| (anchor.to_path_buf(), 0));
        entry.1 += op.size_bytes;
    }
    for (anchor, needed) in per_volume.values() {
        match fs2::available_space(anchor) {
            Ok(available) => {
                let required = needed + config.free_space_margin_bytes;
                if available < required {
                    report.free_space_ok = false;
                    report.errors.push(format!(
                        "insufficient space on {}: need {required} bytes, have {available}",
                        anchor.display()
                    ));
                }
            }
            Err(err) => {
                debug!("cannot probe free space on {}: {err}", anchor.display());
            }
        }
    }

    debug!(
        "preflight for {}: passed={} conflicts={}",
        tx.unit_root.display(),
        report.passed(),
        report.conflicts.len()
    );
    report
}
