use crate::chunk_store::ChunkStore;
use crate::error::{Result, RigbyError};
use crate::progress::Progress;
use crate::restore::{self, RestoreTask};
use crate::stats::RestoreStats;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default worker count: available parallelism, minimum 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Run every task across a pool of `workers` threads.
///
/// Tasks touch disjoint output paths, so there is no file-level locking;
/// stats are aggregated atomically. The first fatal per-file error flips
/// the shared cancellation flag: tasks not yet started are skipped, tasks
/// underway run to their own commit or failure, and the error is returned.
pub fn run_restore(
    tasks: &[RestoreTask],
    store: &ChunkStore,
    stats: &RestoreStats,
    progress: &dyn Progress,
    workers: usize,
    cancel: &AtomicBool,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| RigbyError::Scheduler { reason: e.to_string() })?;

    pool.install(|| {
        tasks.par_iter().try_for_each(|task| {
            if cancel.load(Ordering::Relaxed) {
                return Ok(());
            }
            progress.on_file_started(&task.display_path);
            let outcome = match restore::restore_file(task, store) {
                Ok(result) => {
                    stats.record(&result);
                    progress.on_file_completed();
                    Ok(())
                }
                Err(e) => {
                    cancel.store(true, Ordering::Relaxed);
                    Err(e)
                }
            };
            progress.on_file_ended(&task.display_path);
            outcome
        })
    })
}
