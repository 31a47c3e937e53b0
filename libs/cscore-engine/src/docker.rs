/// Local Execution Engine - Docker Sandbox
///
/// **Core Responsibility:**
/// Execute source code with one stdin payload inside a throwaway container
/// and classify the raw result. This is the local fallback target of the
/// orchestrator and honours the same `ExecutionBackend` contract as the
/// remote judge.
///
/// **Docker Execution Rules:**
/// 1. Pulls the language image if not present
/// 2. Network disabled, CPU/memory limits from languages.json
/// 3. Source and stdin are passed base64-encoded in SOURCE_CODE / TEST_INPUT
/// 4. Hard timeout kills the container
/// 5. Container is always removed, even on cancellation

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use cscore_common::types::Language;
use futures_util::stream::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendKind, ExecutionBackend, RawRun};
use crate::fault::Fault;
use crate::language_config::{LanguageConfig, LanguageConfigManager};
use crate::verdict::{RuntimeErrorKind, Verdict};

/// Safety limits to prevent pathological inputs from reaching Docker
const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Map a container exit into a verdict
pub fn classify_exit(
    exit_code: Option<i64>,
    timed_out: bool,
    compile_failure_exit_code: Option<i64>,
) -> Verdict {
    if timed_out {
        return Verdict::TimeLimitExceeded;
    }
    match exit_code {
        Some(0) => Verdict::Accepted,
        Some(code) if Some(code) == compile_failure_exit_code => Verdict::CompilationError,
        // 128 + signal number
        Some(139) => Verdict::RuntimeError(RuntimeErrorKind::Sigsegv),
        Some(153) => Verdict::RuntimeError(RuntimeErrorKind::Sigxfsz),
        Some(136) => Verdict::RuntimeError(RuntimeErrorKind::Sigfpe),
        Some(134) => Verdict::RuntimeError(RuntimeErrorKind::Sigabrt),
        Some(137) => Verdict::RuntimeError(RuntimeErrorKind::Other),
        Some(_) => Verdict::RuntimeError(RuntimeErrorKind::Nzec),
        None => Verdict::InternalError,
    }
}

/// Container cleanup guard - guarantees container removal on drop
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        // Drop cannot be async; hand removal to the runtime
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to cleanup container");
            }
        });
    }
}

struct ContainerOutput {
    stdout: String,
    stderr: String,
    exit_code: Option<i64>,
    timed_out: bool,
    execution_time_ms: u64,
}

/// Docker-based local executor
pub struct DockerEngine {
    docker: Docker,
    languages: LanguageConfigManager,
    timeout: Duration,
}

impl DockerEngine {
    pub fn new(languages: LanguageConfigManager, timeout: Duration) -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to connect to Docker daemon")?;

        Ok(DockerEngine {
            docker,
            languages,
            timeout,
        })
    }

    /// Ensure Docker image is available (pull if needed)
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = image, "Image cache hit");
            return Ok(());
        }

        warn!(image = image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.context("Failed to pull Docker image")?;
        }

        info!(image = image, "Image pulled");
        Ok(())
    }

    async fn execute_in_container(
        &self,
        config: &LanguageConfig,
        language: Language,
        source_code: &str,
        input: &str,
    ) -> Result<ContainerOutput> {
        self.ensure_image(&config.image)
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", config.image))?;

        let mut cmd = vec![config.execution.command.clone()];
        cmd.extend(config.execution.args.iter().cloned());

        let env = vec![
            format!("SOURCE_CODE={}", general_purpose::STANDARD.encode(source_code)),
            format!("TEST_INPUT={}", general_purpose::STANDARD.encode(input)),
            format!("LANGUAGE={}", language),
            format!("FILE_EXTENSION={}", config.execution.file_extension),
        ];

        let container_config = Config {
            image: Some(config.image.clone()),
            cmd: Some(cmd),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(i64::from(config.memory_limit_mb) * 1024 * 1024),
                nano_cpus: Some((f64::from(config.cpu_limit) * 1_000_000_000.0) as i64),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_name = format!("cscore-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), container_config)
            .await
            .context("Failed to create Docker container")?;

        let container_id = container.id;
        let _guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container_id.clone(),
        };

        let start_time = Instant::now();

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start Docker container")?;

        let execution_future = async {
            let mut stdout = String::new();
            let mut stderr = String::new();

            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });

            let mut logs_stream = self.docker.logs(&container_id, logs_options);
            while let Some(output) = logs_stream.next().await {
                match output {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Error reading container logs");
                        break;
                    }
                }
            }

            let wait_options = WaitContainerOptions {
                condition: "not-running",
            };
            let mut wait_stream = self.docker.wait_container(&container_id, Some(wait_options));

            // Non-zero exits surface as an error carrying the code
            let exit_code = match wait_stream.next().await {
                Some(Ok(response)) => Some(response.status_code),
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    Some(code)
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to get container exit code");
                    None
                }
                None => None,
            };

            (stdout, stderr, exit_code)
        };

        let output = match tokio::time::timeout(self.timeout, execution_future).await {
            Ok((stdout, stderr, exit_code)) => ContainerOutput {
                stdout,
                stderr,
                exit_code,
                timed_out: false,
                execution_time_ms: start_time.elapsed().as_millis() as u64,
            },
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Execution timed out, killing container"
                );
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(error = %e, "Failed to kill timed-out container");
                }
                ContainerOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    timed_out: true,
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                }
            }
        };

        Ok(output)
    }
}

fn check_limits(source_code: &str, input: &str) -> Result<()> {
    if source_code.len() > MAX_SOURCE_CODE_BYTES {
        bail!("Source code exceeds maximum size of {} bytes", MAX_SOURCE_CODE_BYTES);
    }
    if input.len() > MAX_TEST_INPUT_BYTES {
        bail!("Test input exceeds maximum size of {} bytes", MAX_TEST_INPUT_BYTES);
    }
    Ok(())
}

#[async_trait]
impl ExecutionBackend for DockerEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    #[instrument(skip(self, code, stdin), fields(language = %language))]
    async fn run(&self, code: &str, language: Language, stdin: &str) -> Result<RawRun, Fault> {
        check_limits(code, stdin).map_err(|e| Fault::Sandbox(e.to_string()))?;

        let config = self
            .languages
            .get_config(language)
            .map_err(|_| Fault::UnsupportedLanguage(language.to_string()))?;

        let output = self
            .execute_in_container(config, language, code, stdin)
            .await
            .map_err(|e| Fault::Sandbox(format!("{:#}", e)))?;

        let verdict = classify_exit(
            output.exit_code,
            output.timed_out,
            config.compile_failure_exit_code,
        );
        debug!(
            verdict = %verdict,
            exit_code = ?output.exit_code,
            execution_ms = output.execution_time_ms,
            "Container run finished"
        );

        let raw = if verdict == Verdict::CompilationError {
            RawRun {
                verdict,
                stdout: String::new(),
                stderr: String::new(),
                compile_output: format!("{}{}", output.stderr, output.stdout),
                execution_time_ms: output.execution_time_ms,
            }
        } else {
            RawRun {
                verdict,
                stdout: output.stdout,
                stderr: output.stderr,
                compile_output: String::new(),
                execution_time_ms: output.execution_time_ms,
            }
        };
        Ok(raw)
    }

    async fn supported_languages(&self) -> Vec<String> {
        self.languages.list_languages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exit_codes() {
        assert_eq!(classify_exit(Some(0), false, None), Verdict::Accepted);
        assert_eq!(
            classify_exit(Some(139), false, None),
            Verdict::RuntimeError(RuntimeErrorKind::Sigsegv)
        );
        assert_eq!(
            classify_exit(Some(136), false, None),
            Verdict::RuntimeError(RuntimeErrorKind::Sigfpe)
        );
        assert_eq!(
            classify_exit(Some(1), false, None),
            Verdict::RuntimeError(RuntimeErrorKind::Nzec)
        );
        assert_eq!(classify_exit(None, false, None), Verdict::InternalError);
    }

    #[test]
    fn test_timeout_wins_over_exit_code() {
        assert_eq!(classify_exit(Some(0), true, None), Verdict::TimeLimitExceeded);
        assert_eq!(classify_exit(None, true, Some(3)), Verdict::TimeLimitExceeded);
    }

    #[test]
    fn test_compile_failure_code_is_per_language() {
        assert_eq!(classify_exit(Some(3), false, Some(3)), Verdict::CompilationError);
        assert_eq!(
            classify_exit(Some(3), false, None),
            Verdict::RuntimeError(RuntimeErrorKind::Nzec)
        );
    }

    #[test]
    fn test_input_limits() {
        assert!(check_limits("print(1)", "").is_ok());
        let huge = "x".repeat(MAX_SOURCE_CODE_BYTES + 1);
        assert!(check_limits(&huge, "").is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Docker and the cscore-python image
    async fn test_python_run_in_container() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/languages.json");
        let languages = LanguageConfigManager::load(&path).expect("Failed to load language config");
        let engine = DockerEngine::new(languages, DEFAULT_TIMEOUT).expect("Failed to create Docker engine");

        let raw = engine
            .run("n = int(input())\nprint(n * 2)\n", Language::Python, "21")
            .await
            .expect("run failed");

        assert_eq!(raw.verdict, Verdict::Accepted);
        assert_eq!(raw.stdout.trim(), "42");
    }
}
