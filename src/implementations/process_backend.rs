use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::path::{ Path, PathBuf };
use std::process::Stdio;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::process::Command;
use tokio::sync::Notify;

use crate::errors::{ EngineError, EngineResult };
use crate::models::common::{ BackendKind, ComplexityClass, ResourceUsage };
use crate::models::result::{ ProofError, ProofErrorKind, SingleProofResult };
use crate::traits::backend_adapter::{
    is_parse_failure,
    BackendAdapter,
    BackendAvailability,
    DialectConfig,
    QuickCheckOutcome,
    Submission,
};

/// How to launch one proof assistant as an external process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessBackendConfig {
    pub kind: BackendKind,
    pub program: String,
    /// Arguments for a full check; `{file}` is replaced by the staged source path
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Arguments for a parse-only check, if the tool has one
    #[serde(default)]
    pub parse_args: Option<Vec<String>>,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    #[serde(default = "default_extension")]
    pub file_extension: String,
    #[serde(default)]
    pub dialect: DialectConfig,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_args() -> Vec<String> {
    vec!["{file}".to_string()]
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_extension() -> String {
    "txt".to_string()
}

impl ProcessBackendConfig {
    pub fn new(kind: BackendKind, program: impl Into<String>) -> Self {
        let file_extension = match kind {
            BackendKind::Lean => "lean",
            BackendKind::Coq => "v",
            BackendKind::Isabelle => "thy",
            BackendKind::Agda => "agda",
            BackendKind::Z3 => "smt2",
            BackendKind::Vampire => "p",
            BackendKind::Custom(_) => "txt",
        };
        Self {
            kind,
            program: program.into(),
            args: default_args(),
            parse_args: None,
            version_args: default_version_args(),
            file_extension: file_extension.to_string(),
            dialect: DialectConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

/// Proof assistant reached through a sandboxed external process
pub struct ProcessBackend {
    config: ProcessBackendConfig,
    staging_dir: PathBuf,
}

static STAGED_FILES: AtomicU64 = AtomicU64::new(0);

/// Kills the whole process group of a prover run unless disarmed
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    #[cfg(unix)]
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        let status = std::process::Command::new("kill")
            .args(["-KILL", "--", &format!("-{}", pgid)])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => debug!("Killed process group {}", pgid),
            Ok(_) => debug!("Process group {} was already gone", pgid),
            Err(e) => warn!("Could not kill process group {}: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    fn drop(&mut self) {}
}

enum RunOutcome {
    Finished {
        success: bool,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        usage: ResourceUsage,
    },
    TimedOut(ResourceUsage),
    MemoryExceeded(ResourceUsage),
    LaunchFailed(std::io::Error),
}

impl ProcessBackend {
    pub fn new(config: ProcessBackendConfig) -> Self {
        Self {
            config,
            staging_dir: std::env::temp_dir().join("proofmesh"),
        }
    }

    pub fn config(&self) -> &ProcessBackendConfig {
        &self.config
    }

    /// Write the dialect text to a fresh file the tool can read
    async fn stage_source(&self, submission: &Submission) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let stem: String = submission.statement_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let file_name = format!(
            "{}-{}-{}.{}",
            stem,
            std::process::id(),
            STAGED_FILES.fetch_add(1, Ordering::Relaxed),
            self.config.file_extension
        );
        let path = self.staging_dir.join(file_name);
        tokio::fs::write(&path, &submission.dialect_text).await?;
        debug!("Staged {} source for {} at {:?}", self.config.kind, submission.statement_id, path);
        Ok(path)
    }

    async fn run(&self, args: &[String], source: &Path, timeout: Duration, memory_limit_mb: u64) -> RunOutcome {
        let source = source.to_string_lossy();
        let mut cmd = Command::new(&self.config.program);
        cmd.args(args.iter().map(|arg| arg.replace("{file}", &source)));
        cmd.envs(&self.config.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the child (timeout, cancellation, memory ceiling) kills the process
        cmd.kill_on_drop(true);
        // Own process group, so wrapper scripts take their children down with them
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::LaunchFailed(e);
            }
        };
        let mut group = ProcessGroupGuard::new(child.id());

        let monitor = Arc::new(ResourceMonitor::default());
        let exceeded = Arc::new(Notify::new());
        let sampler = child.id().map(|pid| {
            tokio::spawn(
                monitor.clone().sample(pid, memory_limit_mb.saturating_mul(1024), exceeded.clone())
            )
        });

        let outcome = tokio::select! {
            output = child.wait_with_output() => match output {
                Ok(output) => RunOutcome::Finished {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    usage: monitor.usage(false),
                },
                Err(e) => RunOutcome::LaunchFailed(e),
            },
            _ = tokio::time::sleep(timeout) => RunOutcome::TimedOut(monitor.usage(true)),
            _ = exceeded.notified() => RunOutcome::MemoryExceeded(monitor.usage(false)),
        };

        if let Some(sampler) = sampler {
            sampler.abort();
        }
        if matches!(outcome, RunOutcome::Finished { .. }) {
            group.disarm();
        }
        outcome
    }

    fn interpret(&self, outcome: RunOutcome, elapsed: Duration, timeout: Duration) -> SingleProofResult {
        match outcome {
            RunOutcome::Finished { success, exit_code, stdout, stderr, usage } => {
                debug!("{} exited with {:?}", self.config.kind, exit_code);
                parse_backend_output(&stdout, &stderr, success, exit_code, elapsed, usage)
            }
            RunOutcome::TimedOut(usage) => {
                warn!("{} exceeded its {:?} budget, process killed", self.config.kind, timeout);
                let mut result = SingleProofResult::timed_out(
                    elapsed,
                    format!("{} did not finish within {:?}", self.config.kind, timeout)
                );
                result.resource_usage = usage;
                result
            }
            RunOutcome::MemoryExceeded(usage) => {
                warn!(
                    "{} exceeded its memory ceiling ({} KB peak), process killed",
                    self.config.kind,
                    usage.peak_memory_kb
                );
                SingleProofResult::failed(
                    ProofError::new(ProofErrorKind::Incomplete, "memory ceiling exceeded"),
                    elapsed,
                    usage
                )
            }
            RunOutcome::LaunchFailed(e) =>
                SingleProofResult::failed(
                    ProofError::new(
                        ProofErrorKind::Incomplete,
                        format!("failed to run {}: {}", self.config.program, e)
                    ),
                    elapsed,
                    ResourceUsage::default()
                ),
        }
    }
}

#[async_trait]
impl BackendAdapter for ProcessBackend {
    fn kind(&self) -> BackendKind {
        self.config.kind.clone()
    }

    fn dialect(&self) -> DialectConfig {
        self.config.dialect.clone()
    }

    async fn submit(&self, submission: &Submission, timeout: Duration) -> SingleProofResult {
        let start = Instant::now();
        let source = match self.stage_source(submission).await {
            Ok(path) => path,
            Err(e) => {
                return SingleProofResult::failed(
                    ProofError::new(ProofErrorKind::Incomplete, format!("failed to stage source: {}", e)),
                    start.elapsed(),
                    ResourceUsage::default()
                );
            }
        };

        info!("Submitting {} to {} (budget {:?})", submission.statement_id, self.config.kind, timeout);
        let outcome = self.run(&self.config.args, &source, timeout, submission.memory_limit_mb).await;
        let result = self.interpret(outcome, start.elapsed(), timeout);

        if let Err(e) = tokio::fs::remove_file(&source).await {
            debug!("Could not remove staged file {:?}: {}", source, e);
        }
        result
    }

    async fn quick_check(&self, submission: &Submission, timeout: Duration) -> QuickCheckOutcome {
        let Some(parse_args) = &self.config.parse_args else {
            return QuickCheckOutcome::Skipped;
        };
        let start = Instant::now();
        let source = match self.stage_source(submission).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping quick check of {}: {}", submission.statement_id, e);
                return QuickCheckOutcome::Skipped;
            }
        };

        let outcome = self.run(parse_args, &source, timeout, submission.memory_limit_mb).await;
        if let Err(e) = tokio::fs::remove_file(&source).await {
            debug!("Could not remove staged file {:?}: {}", source, e);
        }

        if let RunOutcome::LaunchFailed(e) = &outcome {
            warn!("Quick check of {} could not start {}: {}", submission.statement_id, self.config.kind, e);
            return QuickCheckOutcome::Skipped;
        }
        let result = self.interpret(outcome, start.elapsed(), timeout);
        if is_parse_failure(&result.errors) {
            QuickCheckOutcome::Rejected(result)
        } else {
            QuickCheckOutcome::Parsed
        }
    }

    async fn check_availability(&self) -> EngineResult<BackendAvailability> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.version_args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(10), cmd.output())
            .await
            .map_err(|_| {
                EngineError::Io(
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("{} did not answer a version query", self.config.program)
                    )
                )
            })?;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Ok(BackendAvailability {
                    available: true,
                    version: stdout
                        .lines()
                        .next()
                        .map(|l| l.trim().to_string()),
                    detail: None,
                })
            }
            Ok(output) =>
                Ok(BackendAvailability {
                    available: false,
                    version: None,
                    detail: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
                }),
            Err(e) =>
                Ok(BackendAvailability {
                    available: false,
                    version: None,
                    detail: Some(format!("failed to execute {}: {}", self.config.program, e)),
                }),
        }
    }
}

/// Samples peak memory and CPU time of a running process from `/proc`
#[derive(Default)]
struct ResourceMonitor {
    peak_kb: AtomicU64,
    cpu_ticks: AtomicU64,
}

// USER_HZ is 100 on every mainstream Linux configuration
const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

impl ResourceMonitor {
    async fn sample(self: Arc<Self>, pid: u32, limit_kb: u64, exceeded: Arc<Notify>) {
        let mut interval = tokio::time::interval(Duration::from_millis(25));
        loop {
            interval.tick().await;
            let Some((rss_kb, ticks)) = read_proc_usage(pid).await else {
                return;
            };
            self.peak_kb.fetch_max(rss_kb, Ordering::Relaxed);
            self.cpu_ticks.fetch_max(ticks, Ordering::Relaxed);
            if limit_kb > 0 && rss_kb > limit_kb {
                exceeded.notify_one();
                return;
            }
        }
    }

    fn usage(&self, timeout: bool) -> ResourceUsage {
        ResourceUsage {
            peak_memory_kb: self.peak_kb.load(Ordering::Relaxed),
            cpu_seconds: (self.cpu_ticks.load(Ordering::Relaxed) as f64) / CLOCK_TICKS_PER_SECOND,
            timeout,
        }
    }
}

#[cfg(target_os = "linux")]
async fn read_proc_usage(pid: u32) -> Option<(u64, u64)> {
    let status = tokio::fs::read_to_string(format!("/proc/{}/status", pid)).await.ok()?;
    let rss_kb = status
        .lines()
        .find(|line| line.starts_with("VmHWM:") || line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    let stat = tokio::fs::read_to_string(format!("/proc/{}/stat", pid)).await.ok()?;
    // The command name may contain spaces, so count fields after its closing paren
    let fields: Vec<&str> = stat.rsplit_once(')')?.1.split_whitespace().collect();
    let utime = fields.get(11).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    let stime = fields.get(12).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);

    Some((rss_kb, utime + stime))
}

#[cfg(not(target_os = "linux"))]
async fn read_proc_usage(_pid: u32) -> Option<(u64, u64)> {
    None
}

/// Map one diagnostic line onto the five failure categories
pub fn classify_diagnostic(line: &str) -> ProofErrorKind {
    let lower = line.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timeout", "timed out", "deadline", "heartbeats"]) {
        ProofErrorKind::Timeout
    } else if has(&["sorry", "admit", "unsolved goals", "incomplete", "unfinished", "not fully proved"]) {
        ProofErrorKind::Incomplete
    } else if
        has(
            &[
                "syntax",
                "parse error",
                "parsing",
                "unexpected token",
                "expected token",
                "unterminated",
                "lexer",
            ]
        )
    {
        ProofErrorKind::Syntax
    } else if
        has(
            &[
                "type mismatch",
                "type error",
                "has type",
                "ill-typed",
                "cannot unify",
                "failed to synthesize",
                "universe level",
            ]
        )
    {
        ProofErrorKind::Type
    } else {
        ProofErrorKind::Logic
    }
}

fn is_incomplete_marker(lower: &str) -> bool {
    ["declaration uses 'sorry'", "admitted", "unsolved goals", "unfinished proof"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn is_error_line(lower: &str) -> bool {
    lower.contains("error") && !lower.contains("no error") && !lower.contains("0 error")
}

/// `file:12:4: error ...` → 12
fn diagnostic_line_number(line: &str) -> Option<usize> {
    let mut parts = line.split(':');
    parts.next()?;
    parts.next()?.trim().parse().ok()
}

/// Text following the first ASCII case-insensitive occurrence of `marker`
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.char_indices()
        .map(|(idx, _)| idx)
        .find(|&idx| line.get(idx..idx + marker.len()).is_some_and(|s| s.eq_ignore_ascii_case(marker)))
        .and_then(|idx| line.get(idx + marker.len()..))
}

/// Turn raw tool output into a classified result.
///
/// Besides diagnostics the tool may print report lines of the form
/// `confidence: 0.9`, `complexity: polynomial` and `axioms: a, b`.
pub fn parse_backend_output(
    stdout: &str,
    stderr: &str,
    success: bool,
    exit_code: Option<i32>,
    elapsed: Duration,
    usage: ResourceUsage
) -> SingleProofResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut reported_confidence = None;
    let mut reported_complexity = None;
    let mut axioms_used = Vec::new();
    let mut proof_lines = Vec::new();

    for line in stdout.lines().chain(stderr.lines()) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();

        if let Some(value) = lower.strip_prefix("confidence:") {
            reported_confidence = value.trim().parse::<f64>().ok().map(|c| c.clamp(0.0, 1.0));
            continue;
        }
        if let Some(value) = lower.strip_prefix("complexity:") {
            reported_complexity = ComplexityClass::parse(value);
            continue;
        }
        if let Some(rest) = after_marker(trimmed, "axioms:") {
            let list = rest.trim().trim_start_matches('[').trim_end_matches(']');
            axioms_used.extend(
                list
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
            );
            continue;
        }

        if is_incomplete_marker(&lower) {
            errors.push(ProofError {
                kind: ProofErrorKind::Incomplete,
                message: trimmed.to_string(),
                line: diagnostic_line_number(trimmed),
            });
        } else if is_error_line(&lower) || trimmed.starts_with("***") {
            errors.push(ProofError {
                kind: classify_diagnostic(trimmed),
                message: trimmed.to_string(),
                line: diagnostic_line_number(trimmed),
            });
        } else if lower.contains("warning") {
            warnings.push(trimmed.to_string());
        } else {
            proof_lines.push(trimmed);
        }
    }

    if !success && errors.is_empty() {
        errors.push(
            ProofError::new(
                ProofErrorKind::Logic,
                format!("proof rejected (exit code {:?})", exit_code)
            )
        );
    }

    let valid = success && errors.is_empty();
    let confidence = if valid {
        reported_confidence.unwrap_or_else(|| (1.0 - 0.05 * (warnings.len() as f64)).max(0.5))
    } else {
        0.0
    };
    axioms_used.sort();
    axioms_used.dedup();

    SingleProofResult {
        valid,
        confidence,
        proof_text: if valid && !proof_lines.is_empty() {
            Some(proof_lines.join("\n"))
        } else {
            None
        },
        errors,
        warnings,
        verification_time: elapsed,
        resource_usage: usage,
        reported_complexity,
        axioms_used,
    }
}
