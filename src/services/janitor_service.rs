//! Batch janitor: periodically removes batch directories older than the
//! retention window. Per-batch failures are logged and skipped.

use std::{
    io,
    path::PathBuf,
    time::{Duration, SystemTime},
};
use tokio::{fs, task::JoinHandle, time};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Janitor {
    output_dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl Janitor {
    pub fn new(output_dir: impl Into<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            retention,
            interval,
        }
    }

    /// Spawn the recurring sweep. The first sweep runs one interval after
    /// start; the task lives as long as the process.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Some(first) = time::Instant::now().checked_add(self.interval) else {
                info!(interval = ?self.interval, "sweep interval out of range, janitor idle");
                return;
            };
            let mut ticker = time::interval_at(first, self.interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = self.sweep(SystemTime::now()).await;
                info!(removed, "janitor sweep finished");
            }
        })
    }

    /// Remove every immediate subdirectory of the output root last modified
    /// before `now - retention`. Returns how many were removed.
    pub async fn sweep(&self, now: SystemTime) -> usize {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return 0;
        };

        let mut entries = match fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!("cannot scan {}: {}", self.output_dir.display(), err);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    debug!("error while scanning {}: {}", self.output_dir.display(), err);
                    break;
                }
            };
            let path = entry.path();
            match expired(&entry, cutoff).await {
                Ok(true) => match fs::remove_dir_all(&path).await {
                    Ok(_) => {
                        info!("removed expired batch {}", path.display());
                        removed += 1;
                    }
                    Err(err) => debug!("failed to remove {}: {}", path.display(), err),
                },
                Ok(false) => {}
                Err(err) => debug!("skipping {}: {}", path.display(), err),
            }
        }
        removed
    }
}

async fn expired(entry: &fs::DirEntry, cutoff: SystemTime) -> io::Result<bool> {
    let meta = entry.metadata().await?;
    Ok(meta.is_dir() && meta.modified()? < cutoff)
}
