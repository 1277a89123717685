use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::assemble::{assemble, Outcome};
use crate::config::Timeouts;
use crate::error::ScrapeError;
use crate::output::RecipeSink;
use crate::page::PageProvider;
use crate::tasks::Task;

/// Counts returned after a batch completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub written: usize,
    pub rejected: usize,
    pub errored: usize,
}

/// Run every task with at most `concurrency` sessions open, writing each
/// record to `sink` as soon as its task finishes.
///
/// Workers only send outcomes over a channel; this function is the sole
/// writer of the sink. Output order is completion order.
pub async fn run_batch<P>(
    provider: Arc<P>,
    tasks: Vec<Task>,
    concurrency: usize,
    timeouts: Timeouts,
    sink: &mut RecipeSink,
) -> Result<RunStats>
where
    P: PageProvider + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = tasks.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send outcomes, this loop writes rows
    let (tx, mut rx) = mpsc::channel::<(Task, Outcome)>(concurrency.max(1) * 2);

    for task in tasks {
        let provider = Arc::clone(&provider);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let outcome = AssertUnwindSafe(assemble(provider.as_ref(), &task, &timeouts))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Outcome::Errored(ScrapeError::Task("worker panicked".into())));
            let _ = tx.send((task, outcome)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut stats = RunStats {
        total,
        ..RunStats::default()
    };

    while let Some((task, outcome)) = rx.recv().await {
        match outcome {
            Outcome::Assembled(record) => {
                sink.write(&record)?;
                stats.written += 1;
                pb.println(format!(
                    "[OK] ID {} from '{}'",
                    record.recipe_id, record.category_name
                ));
                info!(id = record.recipe_id, category = %record.category_name, "record written");
            }
            Outcome::Rejected(reason) => {
                stats.rejected += 1;
                info!(url = %task.url, "[SKIP] {}", reason);
            }
            Outcome::Errored(e) => {
                stats.errored += 1;
                warn!(url = %task.url, "[ERR] {}", e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Processed {} tasks ({} written, {} skipped, {} errors)",
        stats.total, stats.written, stats.rejected, stats.errored
    );

    Ok(stats)
}
