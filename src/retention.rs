//! Retention sweeps
//!
//! Conversation data is short-lived demo state: a background task removes
//! conversations older than the configured window, with messages and quotes
//! cascading away alongside them.

use crate::db::{Database, DbResult};
use chrono::{Duration, Utc};
use tracing::{error, info};

/// Delete conversations created more than `window` ago. Returns the number
/// removed.
pub fn run_sweep(db: &Database, window: Duration) -> DbResult<usize> {
    let cutoff = Utc::now() - window;
    let removed = db.purge_older_than(cutoff)?;
    if removed > 0 {
        info!(removed, cutoff = %cutoff, "retention sweep purged conversations");
    }
    Ok(removed)
}

/// Spawn the periodic sweeper. Errors are logged; the task keeps running.
pub fn spawn_sweeper(db: Database, window: Duration, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = run_sweep(&db, window) {
                error!(error = %e, "retention sweep failed");
            }
        }
    });
}
