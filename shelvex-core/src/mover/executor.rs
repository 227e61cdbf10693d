//! Operation-level execution and rollback.
//!
//! Same volume: a single atomic rename, immediately committed. Cross
//! volume: stream-copy to a dot-prefixed temporary name, verify the
//! copied size, atomically rename temp to final, park the source under a
//! quarantine name, then delete it. The final destination name is never
//! visible half-written, and the source is only removed after a verified
//! copy exists under the final name.
//!
//! Rollback undoes everything that has not committed: partial and
//! verified-but-uncommitted copies are deleted, Replace-displaced
//! originals and quarantined sources are renamed back, and directories
//! this transaction created are pruned if still empty. Committed
//! operations are never reversed; the unit reports them as partially
//! applied instead.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use shelvex_model::{MoveError, MoveErrorKind, OpState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::transaction::{FileMoveOperation, MoveTransaction, OpGroup, ResolvedAction};
use super::{ExecCtx, FaultPoint, MoveProgress, RetryConfig};

/// Suffixes for the transient names this module creates. All of them are
/// dot-prefixed or appended so they never collide with planned names.
const PARTIAL_SUFFIX: &str = "shelvex-partial";
const DISPLACED_SUFFIX: &str = "shelvex-displaced";
const QUARANTINE_SUFFIX: &str = "shelvex-removing";

/// Run one group: the primary first, then its companions. Stops early on
/// unit failure or cancellation; untouched operations stay `Pending`.
pub(crate) async fn run_group(
    mut group: OpGroup,
    dry_run: bool,
    total_ops: usize,
    unit_root: PathBuf,
    ctx: Arc<ExecCtx>,
    failed: Arc<AtomicBool>,
    op_counter: Arc<AtomicUsize>,
    created_dirs: Arc<std::sync::Mutex<Vec<PathBuf>>>,
) -> OpGroup {
    for op in group.ops.iter_mut() {
        if failed.load(Ordering::SeqCst) || ctx.cancel.is_cancelled() {
            break;
        }
        if op.action == ResolvedAction::Skip {
            debug!("skipping {}", op.destination.display());
            continue;
        }

        let permits = ctx.permits_for(&op.destination);
        let permit = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            permit = permits.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let index = op_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = ctx
            .progress
            .send(MoveProgress::FileStarted {
                source: op.source.display().to_string(),
                destination: op.destination.display().to_string(),
                index,
                total: total_ops,
            })
            .await;

        let outcome = execute_op(op, dry_run, &ctx, &created_dirs).await;
        drop(permit);

        match outcome {
            Ok(()) => {
                let _ = ctx
                    .progress
                    .send(MoveProgress::FileFinished {
                        destination: op.destination.display().to_string(),
                        state: op.state,
                    })
                    .await;
            }
            Err(err) => {
                op.state = OpState::Failed;
                op.failure = Some(err.to_string());
                failed.store(true, Ordering::SeqCst);
                let _ = ctx
                    .progress
                    .send(MoveProgress::Error {
                        unit_root: unit_root.display().to_string(),
                        error: MoveError::new(MoveErrorKind::Transaction, err.to_string())
                            .with_paths(Some(op.source.clone()), Some(op.destination.clone())),
                    })
                    .await;
                // A failed companion must not undo its committed primary;
                // remaining companions are simply not scheduled.
                break;
            }
        }
    }
    group
}

/// Execute a single operation through its state machine.
async fn execute_op(
    op: &mut FileMoveOperation,
    dry_run: bool,
    ctx: &ExecCtx,
    created_dirs: &std::sync::Mutex<Vec<PathBuf>>,
) -> io::Result<()> {
    if dry_run {
        // Identical path up to the terminal mutation, which becomes a no-op.
        op.state = OpState::Committed;
        return Ok(());
    }

    ensure_parent(&op.destination, &ctx.config.retry, created_dirs).await?;

    if op.action == ResolvedAction::Replace {
        let displaced = sibling_name(&op.destination, DISPLACED_SUFFIX);
        retry_io(&ctx.config.retry, || {
            tokio::fs::rename(&op.destination, &displaced)
        })
        .await?;
        op.displaced_path = Some(displaced);
    }

    if op.same_volume {
        rename_into_place(op, ctx).await
    } else {
        copy_verify_commit(op, ctx).await
    }
}

/// Same-volume strategy: one atomic rename, then the commit is final.
async fn rename_into_place(op: &mut FileMoveOperation, ctx: &ExecCtx) -> io::Result<()> {
    if should_fault(&ctx.config, FaultPoint::BeforeRename, &op.source) {
        return Err(io::Error::other("injected fault before rename"));
    }
    retry_io(&ctx.config.retry, || {
        tokio::fs::rename(&op.source, &op.destination)
    })
    .await?;
    // The rename is the commit: no intermediate file ever exists.
    op.state = OpState::Committed;
    debug!("renamed {} -> {}", op.source.display(), op.destination.display());
    Ok(())
}

/// Cross-volume strategy: copy to temp, verify, rename, quarantine
/// source, delete. Cancellation is honored at chunk boundaries while the
/// copy still targets the temporary name.
async fn copy_verify_commit(op: &mut FileMoveOperation, ctx: &ExecCtx) -> io::Result<()> {
    let temp = temp_name(&op.destination);
    op.temp_path = Some(temp.clone());
    op.state = OpState::Copying;

    let copied = stream_copy(op, &temp, ctx).await;
    if let Err(err) = copied {
        let _ = tokio::fs::remove_file(&temp).await;
        op.temp_path = None;
        return Err(err);
    }
    op.state = OpState::Copied;

    if should_fault(&ctx.config, FaultPoint::AfterCopy, &op.source) {
        return Err(io::Error::other("injected fault after copy"));
    }

    op.state = OpState::Verifying;
    let copied_len = tokio::fs::metadata(&temp).await?.len();
    let source_len = tokio::fs::metadata(&op.source).await?.len();
    if copied_len != source_len {
        let _ = tokio::fs::remove_file(&temp).await;
        op.temp_path = None;
        return Err(io::Error::other(format!(
            "size mismatch after copy: expected {source_len} bytes, found {copied_len}"
        )));
    }
    op.state = OpState::Verified;

    if should_fault(&ctx.config, FaultPoint::AfterVerify, &op.source) {
        return Err(io::Error::other("injected fault after verify"));
    }

    // Temp and final share a directory, so this rename is atomic; the
    // final name is never visible half-written.
    retry_io(&ctx.config.retry, || {
        tokio::fs::rename(&temp, &op.destination)
    })
    .await?;
    op.temp_path = None;

    // Park the source before deleting so rollback can still restore it.
    let quarantine = sibling_name(&op.source, QUARANTINE_SUFFIX);
    retry_io(&ctx.config.retry, || {
        tokio::fs::rename(&op.source, &quarantine)
    })
    .await?;
    op.quarantine_path = Some(quarantine.clone());
    op.state = OpState::SourceQuarantined;

    if let Err(err) = retry_io(&ctx.config.retry, || tokio::fs::remove_file(&quarantine)).await {
        // The verified copy is in place; a stuck quarantine file is a
        // harmless duplicate, not a failed move.
        warn!(
            "source left in quarantine at {}: {err}",
            quarantine.display()
        );
    } else {
        op.quarantine_path = None;
    }
    op.state = OpState::Committed;
    debug!("copied {} -> {}", op.source.display(), op.destination.display());
    Ok(())
}

/// Chunked copy with progress events and cancellation checkpoints.
async fn stream_copy(
    op: &FileMoveOperation,
    temp: &Path,
    ctx: &ExecCtx,
) -> io::Result<()> {
    let mut source = tokio::fs::File::open(&op.source).await?;
    let mut dest = tokio::fs::File::create(temp).await?;
    let mut buffer = vec![0u8; ctx.config.copy_buffer_bytes.max(64 * 1024)];
    let mut copied: u64 = 0;

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(io::Error::other("cancelled during copy"));
        }
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        dest.write_all(&buffer[..read]).await?;
        copied += read as u64;
        let _ = ctx
            .progress
            .send(MoveProgress::BytesCopied {
                source: op.source.display().to_string(),
                bytes_copied: copied,
                bytes_total: op.size_bytes,
            })
            .await;
    }
    dest.sync_all().await?;
    Ok(())
}

/// Undo all non-committed work of a transaction.
pub(crate) async fn rollback(tx: &mut MoveTransaction) {
    for group in &mut tx.groups {
        for op in &mut group.ops {
            let state = op.state;
            match state {
                OpState::Committed | OpState::Failed | OpState::RolledBack => {}
                OpState::Pending => {}
                OpState::Renamed => {
                    // Rename back; the source side is always restorable
                    // because nothing else touched it.
                    if let Err(err) = tokio::fs::rename(&op.destination, &op.source).await {
                        warn!(
                            "rollback rename failed for {}: {err}",
                            op.destination.display()
                        );
                    }
                    op.state = OpState::RolledBack;
                }
                OpState::Copying | OpState::Copied | OpState::Verifying | OpState::Verified => {
                    if let Some(temp) = op.temp_path.take() {
                        let _ = tokio::fs::remove_file(&temp).await;
                    } else if state == OpState::Verified {
                        // Already renamed to the final name; the source
                        // still exists, so deleting the copy loses nothing.
                        let _ = tokio::fs::remove_file(&op.destination).await;
                    }
                    op.state = OpState::RolledBack;
                }
                OpState::SourceQuarantined => {
                    let _ = tokio::fs::remove_file(&op.destination).await;
                    if let Some(quarantine) = op.quarantine_path.take()
                        && let Err(err) = tokio::fs::rename(&quarantine, &op.source).await
                    {
                        warn!(
                            "rollback could not restore {}: {err}",
                            op.source.display()
                        );
                    }
                    op.state = OpState::RolledBack;
                }
            }

            // Failed ops may still hold a temp copy.
            if state == OpState::Failed
                && let Some(temp) = op.temp_path.take()
            {
                let _ = tokio::fs::remove_file(&temp).await;
            }

            // Restore what Replace displaced. Committed ops are final, so
            // their displaced originals are gone for good instead.
            if let Some(displaced) = op.displaced_path.take() {
                if op.state == OpState::Committed {
                    let _ = tokio::fs::remove_file(&displaced).await;
                } else if let Err(err) =
                    tokio::fs::rename(&displaced, &op.planned_destination).await
                {
                    warn!(
                        "rollback could not restore displaced {}: {err}",
                        op.planned_destination.display()
                    );
                }
            }
        }
    }

    // Remove directories this transaction created, deepest first, only
    // while they stay empty.
    let mut dirs = std::mem::take(&mut tx.created_dirs);
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        let _ = tokio::fs::remove_dir(&dir).await;
    }

    debug!("rolled back transaction {} for {}", tx.id, tx.unit_root.display());
}

/// Finalize a fully successful transaction: the displaced files of
/// committed Replace operations are no longer restorable and go away.
pub(crate) async fn finalize(tx: &mut MoveTransaction) {
    for group in &mut tx.groups {
        for op in &mut group.ops {
            if op.state == OpState::Committed
                && let Some(displaced) = op.displaced_path.take()
                && let Err(err) = tokio::fs::remove_file(&displaced).await
            {
                warn!("could not remove displaced {}: {err}", displaced.display());
            }
        }
    }
}

/// Create the destination's parent chain, remembering which directories
/// are new so rollback can prune them. Tolerant of races with concurrent
/// transactions targeting the same parent.
async fn ensure_parent(
    destination: &Path,
    retry: &RetryConfig,
    created_dirs: &std::sync::Mutex<Vec<PathBuf>>,
) -> io::Result<()> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }

    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(parent);
    while let Some(dir) = cursor {
        if dir.exists() || dir.as_os_str().is_empty() {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }

    retry_io(retry, || tokio::fs::create_dir_all(parent)).await?;

    let mut created = created_dirs.lock().unwrap_or_else(|e| e.into_inner());
    for dir in missing {
        if !created.contains(&dir) {
            created.push(dir);
        }
    }
    Ok(())
}

/// Retry transient I/O errors with exponential backoff.
async fn retry_io<T, F, Fut>(config: &RetryConfig, mut call: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = io::Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(err.kind()) && attempt + 1 < config.max_attempts.max(1) => {
                let delay = config.backoff_base_ms.saturating_mul(1 << attempt.min(16));
                debug!("transient I/O error ({err}), retrying in {delay}ms");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ResourceBusy
    )
}

/// `name.ext` -> `.name.ext.<suffix>` in the same directory.
fn temp_name(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    destination.with_file_name(format!(".{file_name}.{PARTIAL_SUFFIX}"))
}

/// `path` -> `path.<suffix>` next to the original.
fn sibling_name(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}

#[cfg(feature = "test-support")]
fn should_fault(config: &super::MoverConfig, point: FaultPoint, source: &Path) -> bool {
    config
        .fault
        .as_ref()
        .is_some_and(|fault| {
            fault.point == point
                && source.to_string_lossy().contains(&fault.path_contains)
        })
}

#[cfg(not(feature = "test-support"))]
fn should_fault(_config: &super::MoverConfig, _point: FaultPoint, _source: &Path) -> bool {
    false
}
