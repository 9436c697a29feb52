//! Worker pool setup for tree construction.
//! Trees are built on the global rayon pool; leave headroom for the server.

use anyhow::Result;
use tracing::info;

/// Initialize the global rayon thread pool with controlled worker count.
/// `workers = None` uses half the cores, minimum 1.
pub fn init_thread_pool(workers: Option<usize>) -> Result<usize> {
    let cores = num_cpus::get();
    let workers = workers.unwrap_or(cores / 2).max(1);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;

    info!(
        "[Pool] Initialized thread pool: {} workers (system has {} cores)",
        workers, cores
    );

    Ok(workers)
}
