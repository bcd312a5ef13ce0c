//! In-memory job queue and worker pool.
//!
//! Jobs flow through an unbounded channel into a pool of bounded workers.
//! The queue tracks how many jobs are unsettled (queued, running, or waiting
//! out a retry backoff), which is what lets one-shot runs stop exactly when
//! the last follow-up job has finished.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::ScrapeError;
use crate::jobs::{self, Job, JobContext};

/// Job sink handed to jobs so they can schedule follow-up work.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job to the queue.
    async fn enqueue(&self, job: Job) -> Result<()>;
}

/// A queued job plus how often it has already been attempted.
struct Envelope {
    job: Job,
    attempt: u32,
}

/// Shared queue backed by an unbounded channel.
pub struct WorkQueue {
    tx: UnboundedSender<Envelope>,
    /// Unsettled jobs. A retried job keeps its slot through the backoff
    /// sleep, so idleness cannot be observed between attempt and retry.
    pending: AtomicI64,
    idle: Notify,
}

/// Receiving end of a [`WorkQueue`], consumed by one worker pool.
pub struct JobReceiver {
    rx: UnboundedReceiver<Envelope>,
}

impl WorkQueue {
    /// Create a queue and the receiving end for a worker pool.
    #[must_use]
    pub fn new() -> (Arc<Self>, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            tx,
            pending: AtomicI64::new(0),
            idle: Notify::new(),
        });
        (queue, JobReceiver { rx })
    }

    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    /// Re-deliver a job that kept its pending slot.
    fn resend(&self, envelope: Envelope) -> bool {
        self.tx.send(envelope).is_ok()
    }

    /// A job reached a terminal outcome and releases its slot.
    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_one();
        }
    }
}

#[async_trait]
impl JobQueue for WorkQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Envelope { job, attempt: 0 }).is_err() {
            self.settle();
            bail!("job queue is closed");
        }
        Ok(())
    }
}

/// Pulls jobs off the queue and runs them on a bounded set of workers.
pub struct WorkerPool {
    ctx: JobContext,
    queue: Arc<WorkQueue>,
    receiver: JobReceiver,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(ctx: JobContext, queue: Arc<WorkQueue>, receiver: JobReceiver) -> Self {
        let semaphore = Arc::new(Semaphore::new(ctx.config.worker_concurrency));
        Self {
            ctx,
            queue,
            receiver,
            semaphore,
        }
    }

    /// Run until every queued job has settled, then return.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker semaphore is closed, which does
    /// not happen in normal operation.
    pub async fn run_until_idle(&mut self) -> Result<()> {
        let mut tasks = JoinSet::new();

        while !self.queue.is_idle() {
            tokio::select! {
                maybe = self.receiver.rx.recv() => {
                    let Some(envelope) = maybe else { break };
                    self.dispatch(&mut tasks, envelope).await?;
                }
                () = self.queue.idle.notified() => {}
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished {
                        error!("Worker task panicked: {e}");
                    }
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("Worker task panicked: {e}");
            }
        }

        Ok(())
    }

    /// Run forever, processing jobs as they arrive.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker semaphore is closed.
    pub async fn run(&mut self) -> Result<()> {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                maybe = self.receiver.rx.recv() => {
                    let Some(envelope) = maybe else { return Ok(()) };
                    self.dispatch(&mut tasks, envelope).await?;
                }
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished {
                        error!("Worker task panicked: {e}");
                    }
                }
            }
        }
    }

    async fn dispatch(&self, tasks: &mut JoinSet<()>, envelope: Envelope) -> Result<()> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        let ctx = self.ctx.clone();
        let queue = Arc::clone(&self.queue);

        tasks.spawn(async move {
            let _permit = permit;
            process(&ctx, &queue, envelope).await;
        });

        Ok(())
    }
}

/// Run one job and settle or retry it.
///
/// Permanent scrape failures settle immediately; transient ones go back on
/// the queue with exponential backoff until the attempt cap. The worker
/// permit is held through the backoff sleep, so retries occupy a
/// concurrency slot just like fresh work.
async fn process(ctx: &JobContext, queue: &WorkQueue, envelope: Envelope) {
    let Envelope { job, attempt } = envelope;
    let kind = job.kind();

    debug!(job = kind, attempt, "Running job");
    let Err(e) = jobs::run(ctx, job.clone()).await else {
        queue.settle();
        return;
    };

    let permanent = e
        .downcast_ref::<ScrapeError>()
        .map_or(false, ScrapeError::is_permanent);

    if permanent {
        warn!(job = kind, "Permanent failure, not retrying: {e:#}");
        queue.settle();
    } else if attempt + 1 >= ctx.config.max_retries {
        error!(job = kind, attempts = attempt + 1, "Giving up on job: {e:#}");
        queue.settle();
    } else {
        let backoff = ctx.config.retry_backoff * 2u32.pow(attempt);
        warn!(job = kind, attempt = attempt + 1, backoff = ?backoff, "Retrying job: {e:#}");
        tokio::time::sleep(backoff).await;
        if !queue.resend(Envelope {
            job,
            attempt: attempt + 1,
        }) {
            queue.settle();
        }
    }
}

/// Queue double that records jobs instead of delivering them.
///
/// Lets one scraping step run in isolation, asserting on the follow-up work
/// it would have scheduled.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: tokio::sync::Mutex<Vec<Job>>,
}

impl RecordingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs enqueued so far, in order.
    pub async fn recorded(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baha::{CommentFetcher, HttpFetcher, PageUrl};
    use crate::config::Config;
    use crate::db::Database;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Context wired to a dead port, so any job that touches the network
    /// fails with a transient connection error.
    async fn setup(max_retries: u32) -> (JobContext, Arc<WorkQueue>, JobReceiver, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(1),
            max_retries,
            ..Config::for_testing()
        };
        let db = Database::new(&dir.path().join("test.sqlite")).await.unwrap();
        let (queue, receiver) = WorkQueue::new();
        let ctx = JobContext {
            fetcher: Arc::new(HttpFetcher::new(&config).unwrap()),
            comments: Arc::new(CommentFetcher::new(&config).unwrap()),
            queue: queue.clone(),
            config,
            db,
        };
        (ctx, queue, receiver, dir)
    }

    async fn run_to_idle(ctx: JobContext, queue: Arc<WorkQueue>, receiver: JobReceiver) {
        let mut pool = WorkerPool::new(ctx, queue, receiver);
        tokio::time::timeout(Duration::from_secs(10), pool.run_until_idle())
            .await
            .expect("pool did not go idle")
            .unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_fails_once_the_receiver_is_gone() {
        let (queue, receiver) = WorkQueue::new();
        drop(receiver);

        let err = queue.enqueue(Job::CleanupPosts).await.unwrap_err();
        assert!(err.to_string().contains("job queue is closed"));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_run_until_idle_returns_after_jobs_settle() {
        let (ctx, queue, receiver, _dir) = setup(3).await;

        queue.enqueue(Job::CleanupPosts).await.unwrap();
        queue.enqueue(Job::CleanupPosts).await.unwrap();

        run_to_idle(ctx, queue.clone(), receiver).await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_run_until_idle_with_nothing_queued_returns_immediately() {
        let (ctx, queue, receiver, _dir) = setup(3).await;
        run_to_idle(ctx, queue, receiver).await;
    }

    #[tokio::test]
    async fn test_transient_failures_settle_at_the_attempt_cap() {
        let (ctx, queue, receiver, _dir) = setup(2).await;

        // Connection refused on every attempt; the pool must still go idle.
        let url = PageUrl::parse("http://127.0.0.1:9/C.php?bsn=60076&snA=1").unwrap();
        queue.enqueue(Job::ScrapeThread { url }).await.unwrap();

        run_to_idle(ctx, queue.clone(), receiver).await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_permanent_failures_settle_without_retry() {
        let (ctx, queue, receiver, _dir) = setup(3).await;

        // A search URL is never a valid thread page, a structural error.
        let url = PageUrl::parse("http://127.0.0.1:9/B.php?bsn=60076&qt=1&q=x").unwrap();
        queue.enqueue(Job::ScrapeThread { url }).await.unwrap();

        run_to_idle(ctx, queue.clone(), receiver).await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_recording_queue_keeps_order() {
        let queue = RecordingQueue::new();
        queue
            .enqueue(Job::SearchUser {
                user: "soda123".into(),
                page: 1,
            })
            .await
            .unwrap();
        queue.enqueue(Job::CleanupPosts).await.unwrap();

        let recorded = queue.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].kind(), "search_user");
        assert_eq!(recorded[1].kind(), "cleanup_posts");
    }
}
