//! Conflict resolution against pre-existing destination files.
//!
//! Resolution runs per group so a primary and its companions always agree:
//! a skipped primary skips its companions, and a Keep-Both suffix is
//! chosen once for the whole group (the smallest ` (n)` under which every
//! member's name is free). Only read-only probing happens here; Replace
//! displacement is performed later by the executor.

use std::path::{Path, PathBuf};

use shelvex_model::ConflictPolicy;
use tracing::debug;

use super::transaction::{OpGroup, ResolvedAction};

/// Resolve one group's conflicts in place.
pub fn resolve_group(group: &mut OpGroup, policy: ConflictPolicy) {
    let conflicts: Vec<bool> = group
        .ops
        .iter()
        .map(|op| op.destination.exists())
        .collect();
    if conflicts.iter().all(|c| !c) {
        return;
    }

    match policy {
        ConflictPolicy::Skip => {
            if conflicts[0] {
                // Primary already present at the destination; companions
                // follow it rather than adopting a foreign primary.
                for op in &mut group.ops {
                    op.action = ResolvedAction::Skip;
                }
                debug!(
                    "skipping group, primary exists: {}",
                    group.ops[0].destination.display()
                );
            } else {
                for (op, conflicted) in group.ops.iter_mut().zip(conflicts) {
                    if conflicted {
                        op.action = ResolvedAction::Skip;
                    }
                }
            }
        }
        ConflictPolicy::Replace => {
            for (op, conflicted) in group.ops.iter_mut().zip(conflicts) {
                if conflicted {
                    op.action = ResolvedAction::Replace;
                }
            }
        }
        ConflictPolicy::KeepBoth => {
            let primary_stem = group.ops[0]
                .destination
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let suffix = (1u32..)
                .find(|n| {
                    group.ops.iter().all(|op| {
                        !suffixed_destination(&op.destination, &primary_stem, *n).exists()
                    })
                })
                .unwrap_or(1);
            for op in &mut group.ops {
                op.destination = suffixed_destination(&op.destination, &primary_stem, suffix);
                op.action = ResolvedAction::KeepBoth;
            }
            debug!(
                "keep-both resolved with suffix ({suffix}) for {}",
                group.ops[0].destination.display()
            );
        }
    }
}

/// Insert ` (n)` after the primary's base name. Companions carry extra
/// middles (`Base.en.srt`), so the suffix goes after the shared base
/// rather than before the last extension.
fn suffixed_destination(destination: &Path, primary_stem: &str, n: u32) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_name = if !primary_stem.is_empty() && file_name.starts_with(primary_stem) {
        format!(
            "{primary_stem} ({n}){rest}",
            rest = &file_name[primary_stem.len()..]
        )
    } else {
        // No shared base; insert before the extension.
        match destination.file_stem().zip(destination.extension()) {
            Some((stem, ext)) => format!(
                "{} ({n}).{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ),
            None => format!("{file_name} ({n})"),
        }
    };
    destination.with_file_name(new_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelvex_model::{DestinationPlan, OpState};
    use std::fs;
    use tempfile::TempDir;

    use crate::mover::transaction::MoveTransaction;

    fn group_for(dir: &TempDir, files: &[(&str, Option<&str>)]) -> OpGroup {
        let plans: Vec<DestinationPlan> = files
            .iter()
            .map(|(name, owner)| DestinationPlan {
                source: dir.path().join("src").join(name),
                destination: dir.path().join("dst").join(name),
                naming: Default::default(),
                policy: ConflictPolicy::Skip,
                dry_run: false,
                owner: owner.map(|o| dir.path().join("src").join(o)),
            })
            .collect();
        let mut tx =
            MoveTransaction::build(dir.path().into(), &plans, |_| 1, |_, _| true);
        tx.groups.remove(0)
    }

    #[test]
    fn no_conflict_means_plain_moves() {
        let dir = TempDir::new().unwrap();
        let mut group = group_for(&dir, &[("a.mkv", None)]);
        resolve_group(&mut group, ConflictPolicy::KeepBoth);
        assert_eq!(group.ops[0].action, ResolvedAction::Move);
        assert_eq!(group.ops[0].state, OpState::Pending);
    }

    #[test]
    fn skip_on_primary_conflict_skips_companions_too() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("dst/a.mkv"), b"existing").unwrap();

        let mut group = group_for(&dir, &[("a.mkv", None), ("a.srt", Some("a.mkv"))]);
        resolve_group(&mut group, ConflictPolicy::Skip);
        assert!(group.ops.iter().all(|op| op.action == ResolvedAction::Skip));
    }

    #[test]
    fn skip_on_companion_conflict_is_companion_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("dst/a.srt"), b"existing").unwrap();

        let mut group = group_for(&dir, &[("a.mkv", None), ("a.srt", Some("a.mkv"))]);
        resolve_group(&mut group, ConflictPolicy::Skip);
        assert_eq!(group.ops[0].action, ResolvedAction::Move);
        assert_eq!(group.ops[1].action, ResolvedAction::Skip);
    }

    #[test]
    fn replace_marks_conflicting_ops() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("dst/a.mkv"), b"existing").unwrap();

        let mut group = group_for(&dir, &[("a.mkv", None), ("a.srt", Some("a.mkv"))]);
        resolve_group(&mut group, ConflictPolicy::Replace);
        assert_eq!(group.ops[0].action, ResolvedAction::Replace);
        assert_eq!(group.ops[1].action, ResolvedAction::Move);
    }

    #[test]
    fn keep_both_suffixes_the_whole_group() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("dst/a.mkv"), b"existing").unwrap();

        let mut group = group_for(&dir, &[("a.mkv", None), ("a.en.srt", Some("a.mkv"))]);
        resolve_group(&mut group, ConflictPolicy::KeepBoth);
        assert_eq!(
            group.ops[0].destination.file_name().unwrap(),
            "a (1).mkv"
        );
        assert_eq!(
            group.ops[1].destination.file_name().unwrap(),
            "a (1).en.srt"
        );
    }

    #[test]
    fn keep_both_probes_past_occupied_suffixes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("dst/a.mkv"), b"existing").unwrap();
        fs::write(dir.path().join("dst/a (1).mkv"), b"existing too").unwrap();

        let mut group = group_for(&dir, &[("a.mkv", None)]);
        resolve_group(&mut group, ConflictPolicy::KeepBoth);
        assert_eq!(
            group.ops[0].destination.file_name().unwrap(),
            "a (2).mkv"
        );
    }
}
