//! Periodic scheduling of the standing scrape.

use anyhow::Result;
use tracing::{error, info};

use crate::jobs::{Job, JobContext};
use crate::queue::JobQueue;

/// Run the scheduling loop forever.
///
/// Each cycle seeds the queue and sleeps; the follow-up work (threads,
/// later pages, comment feeds) is enqueued by the jobs themselves as they
/// discover it.
pub async fn run_loop(ctx: JobContext) {
    loop {
        if let Err(e) = schedule_cycle(&ctx).await {
            error!("Scheduling failed: {e:#}");
        }
        tokio::time::sleep(ctx.config.scrape_interval).await;
    }
}

/// Enqueue one scrape cycle: a title search for the standing title from
/// page 1, and a music-flag sweep.
///
/// # Errors
///
/// Returns an error when the queue no longer accepts work.
pub async fn schedule_cycle(ctx: &JobContext) -> Result<()> {
    info!(title = %ctx.config.search_title, "Scheduling title scrape");
    ctx.queue
        .enqueue(Job::SearchTitle {
            title: ctx.config.search_title.clone(),
            user: None,
            page: 1,
        })
        .await?;
    ctx.queue.enqueue(Job::CleanupPosts).await?;
    Ok(())
}
