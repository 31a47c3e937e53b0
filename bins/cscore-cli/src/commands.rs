// CLI commands for running and queueing submissions
use anyhow::{bail, Context, Result};
use cscore_common::redis;
use cscore_common::types::{GradingJob, Language, TestCase};
use cscore_engine::{evaluator, ExecutionOrchestrator};
use std::fs;
use std::path::Path;
use uuid::Uuid;

fn parse_language(name: &str) -> Result<Language> {
    match Language::from_str(name) {
        Some(language) => Ok(language),
        None => bail!(
            "Unknown language '{}'. Valid options: {}",
            name,
            Language::ALL.map(|l| l.to_string()).join(", ")
        ),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load test cases from a JSON array file
fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let test_cases: Vec<TestCase> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test cases in {}", path.display()))?;

    if let Some(tc) = evaluator::invalid_weight(&test_cases) {
        bail!("Test case {} has invalid weight {}", tc.id, tc.weight);
    }
    Ok(test_cases)
}

async fn connect(redis_url: &str) -> Result<::redis::aio::ConnectionManager> {
    let client = ::redis::Client::open(redis_url).context("Invalid Redis URL")?;
    ::redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))
}

pub async fn run(file: &Path, language: &str, tests: Option<&Path>, input: &str) -> Result<()> {
    let language = parse_language(language)?;
    let code = read_source(file)?;
    let orchestrator = ExecutionOrchestrator::from_env()?;

    match tests {
        Some(tests) => {
            let test_cases = load_test_cases(tests)?;
            eprintln!("→ Grading {} against {} test cases", file.display(), test_cases.len());

            let result = orchestrator
                .execute_with_test_cases(&code, language, &test_cases)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if result.is_error() {
                bail!(
                    "Execution failed: {}",
                    result.stderr.as_deref().unwrap_or("unknown error")
                );
            }
        }
        None => {
            let outcome = orchestrator.execute_with_input(&code, language, input).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

pub async fn info() -> Result<()> {
    let orchestrator = ExecutionOrchestrator::from_env()?;
    let info = orchestrator.execution_info().await;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub async fn submit(file: &Path, language: &str, tests: &Path, redis_url: &str) -> Result<()> {
    let job = GradingJob {
        id: Uuid::new_v4(),
        language: parse_language(language)?,
        source_code: read_source(file)?,
        test_cases: load_test_cases(tests)?,
    };

    let mut conn = connect(redis_url).await?;
    redis::push_job(&mut conn, &job)
        .await
        .context("Failed to queue job")?;

    eprintln!("✓ Queued {} test cases for grading", job.test_cases.len());
    println!("{}", job.id);
    Ok(())
}

pub async fn fetch_result(job_id: &str, redis_url: &str) -> Result<()> {
    let job_id = Uuid::parse_str(job_id).context("Invalid job ID format")?;

    let mut conn = connect(redis_url).await?;
    match redis::get_record(&mut conn, &job_id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => eprintln!("Job {} is queued or still grading", job_id),
    }
    Ok(())
}
