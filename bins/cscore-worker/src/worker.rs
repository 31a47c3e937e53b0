/// Worker Loop - Queue Consumption and Persistence
///
/// **Responsibility:**
/// Pop grading jobs, grade them through the orchestrator and persist the record.
///
/// **Shutdown rules:**
/// - The shutdown flag is only checked between jobs, never while one is in flight
/// - BLPOP is never cancelled mid-request; its timeout bounds shutdown latency
/// - A popped job always ends up stored, or pushed back onto the queue

use async_trait::async_trait;
use cscore_common::redis;
use cscore_common::types::{GradingJob, GradingRecord};
use cscore_engine::ExecutionOrchestrator;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::grading;

/// BLPOP timeout, also the upper bound on shutdown latency while idle
pub const POP_TIMEOUT_SECS: f64 = 5.0;
const STORE_ATTEMPTS: u32 = 3;
const STORE_BACKOFF: Duration = Duration::from_millis(500);

#[async_trait]
pub trait JobQueue: Send {
    async fn pop(&mut self, timeout_secs: f64) -> ::redis::RedisResult<Option<GradingJob>>;
    async fn store(&mut self, record: &GradingRecord) -> ::redis::RedisResult<()>;
    async fn requeue(&mut self, job: &GradingJob) -> ::redis::RedisResult<()>;
}

#[async_trait]
impl JobQueue for ::redis::aio::ConnectionManager {
    async fn pop(&mut self, timeout_secs: f64) -> ::redis::RedisResult<Option<GradingJob>> {
        redis::pop_job(self, timeout_secs).await
    }

    async fn store(&mut self, record: &GradingRecord) -> ::redis::RedisResult<()> {
        redis::store_record(self, record).await
    }

    async fn requeue(&mut self, job: &GradingJob) -> ::redis::RedisResult<()> {
        redis::push_job(self, job).await
    }
}

#[instrument(skip_all)]
pub async fn run<Q: JobQueue>(
    queue: &mut Q,
    orchestrator: &ExecutionOrchestrator,
    shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        match queue.pop(POP_TIMEOUT_SECS).await {
            Ok(Some(job)) => process_job(queue, orchestrator, &job).await,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    info!("Worker loop stopped");
}

/// Grade one popped job and persist it. Runs to completion once started.
pub async fn process_job<Q: JobQueue>(
    queue: &mut Q,
    orchestrator: &ExecutionOrchestrator,
    job: &GradingJob,
) {
    info!(
        job_id = %job.id,
        language = %job.language,
        test_cases = job.test_cases.len(),
        source_size = job.source_code.len(),
        "Received job"
    );

    let start = Instant::now();
    let record = grading::grade_job(orchestrator, job).await;

    info!(
        job_id = %job.id,
        submission_status = ?record.submission_status,
        score = record.result.score,
        execution_ms = start.elapsed().as_millis() as u64,
        "Grading completed"
    );

    for attempt in 1..=STORE_ATTEMPTS {
        match queue.store(&record).await {
            Ok(()) => {
                info!(job_id = %job.id, "Record persisted to Redis");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, attempt = attempt, error = %e, "Failed to persist record");
                if attempt < STORE_ATTEMPTS {
                    tokio::time::sleep(STORE_BACKOFF * attempt).await;
                }
            }
        }
    }

    // Out of attempts: hand the job back to the queue
    match queue.requeue(job).await {
        Ok(()) => warn!(job_id = %job.id, "Record not persisted, job requeued"),
        Err(e) => error!(job_id = %job.id, error = %e, "Failed to requeue job, submission lost"),
    }
}
