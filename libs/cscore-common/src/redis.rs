use crate::types::{GradingJob, GradingRecord};
use redis::{AsyncCommands, RedisResult};

/// Redis key layout shared by submitters and the grading worker.
/// Keys are deterministic so either side can compute them independently.

pub const QUEUE_KEY: &str = "cscore:queue:grading";
pub const RESULT_PREFIX: &str = "cscore:result";
pub const STATUS_PREFIX: &str = "cscore:status";

/// Graded records expire after 24 hours
pub const RECORD_TTL_SECS: u64 = 86400;

/// Generate result key for a job
pub fn result_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

/// Generate status key for a job
pub fn status_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, job_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Push a grading job (RPUSH, FIFO with BLPOP on the other end)
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &GradingJob,
) -> RedisResult<()> {
    let payload = serde_json::to_string(job).map_err(serialization_error)?;
    conn.rpush(QUEUE_KEY, payload).await
}

/// Pop the next grading job
/// BLPOP with timeout so the worker can observe shutdown between polls
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<GradingJob>> {
    let result: Option<(String, String)> = conn.blpop(QUEUE_KEY, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: GradingJob = serde_json::from_str(&payload).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Persist a graded record plus its submission status for quick lookup
pub async fn store_record(
    conn: &mut redis::aio::ConnectionManager,
    record: &GradingRecord,
) -> RedisResult<()> {
    let payload = serde_json::to_string(record).map_err(serialization_error)?;
    let _: () = conn
        .set_ex(result_key(&record.job_id), payload, RECORD_TTL_SECS as _)
        .await?;

    let status = serde_json::to_string(&record.submission_status).map_err(serialization_error)?;
    let _: () = conn
        .set_ex(status_key(&record.job_id), status, RECORD_TTL_SECS as _)
        .await?;

    Ok(())
}

pub async fn get_record(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<GradingRecord>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;

    match payload {
        Some(data) => {
            let record: GradingRecord = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_result_key_deterministic() {
        let id = Uuid::new_v4();
        let key1 = result_key(&id);
        let key2 = result_key(&id);
        assert_eq!(key1, key2);
        assert!(key1.starts_with("cscore:result:"));
    }

    #[test]
    fn test_status_key_format() {
        let id = Uuid::new_v4();
        let key = status_key(&id);
        assert!(key.starts_with("cscore:status:"));
        assert!(key.contains(&id.to_string()));
    }

    #[test]
    fn test_result_and_status_keys_differ() {
        let id = Uuid::new_v4();
        assert_ne!(result_key(&id), status_key(&id));
    }
}
