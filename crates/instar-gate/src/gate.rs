//! The verification gate: the single authority deciding whether a produced
//! artifact becomes authoritative.
//!
//! Candidates are materialized in an ephemeral sandbox directory. Without a
//! test artifact the gate runs a parse-only check (`py_compile`) — a weak
//! gate that proves "not garbage", not "correct". With a test artifact it
//! runs the standard test runner (`pytest`) against the sandbox with a
//! bounded wall-clock timeout. The sandbox and any spawned process are
//! cleaned up on every exit path.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use instar_contracts::{
    error::{InstarError, InstarResult},
    run::GateReport,
};

/// Default wall-clock budget for one test-runner invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Strip a single outer fenced code block, if present.
///
/// Only the fence marker lines at the very start and end are removed; inner
/// content passes through unchanged. Text without an outer fence is
/// returned as-is (trimmed).
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

/// Result of one bounded sandbox command.
struct SandboxRun {
    /// None when the wall-clock budget was exceeded and the child was killed.
    exit_success: Option<bool>,
    output: String,
}

/// The verification gate.
///
/// One `Gate` is reusable across runs; each `verify` call gets its own
/// sandbox directory.
#[derive(Debug, Clone)]
pub struct Gate {
    python: String,
    timeout: Duration,
}

impl Default for Gate {
    fn default() -> Self {
        Self { python: "python3".to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl Gate {
    /// A gate using the given interpreter executable and timeout.
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self { python: python.into(), timeout }
    }

    /// Verify a candidate artifact, optionally against a test artifact.
    ///
    /// Returns `Ok` with a passing or failing [`GateReport`]; parse errors,
    /// failing tests, and timeouts are all failing reports with evidence,
    /// never `Err`. Only sandbox I/O problems (cannot write files, cannot
    /// spawn the runner) surface as `InstarError::Sandbox`.
    pub fn verify(&self, candidate: &str, test_artifact: Option<&str>) -> InstarResult<GateReport> {
        if candidate.trim().is_empty() {
            return Ok(GateReport::fail("no candidate"));
        }
        let code = strip_code_fence(candidate);

        let sandbox = tempfile::Builder::new()
            .prefix("instar-gate-")
            .tempdir()
            .map_err(|e| InstarError::Sandbox { reason: format!("cannot create sandbox: {e}") })?;
        std::fs::write(sandbox.path().join("solution.py"), &code)
            .map_err(|e| InstarError::Sandbox { reason: format!("cannot write candidate: {e}") })?;

        let report = match test_artifact {
            None => {
                let mut cmd = Command::new(&self.python);
                cmd.args(["-m", "py_compile", "solution.py"])
                    .current_dir(sandbox.path());
                let run = self.run_bounded(cmd)?;
                match run.exit_success {
                    Some(true) => GateReport::pass("Syntax check passed (no tests provided)."),
                    Some(false) => GateReport::fail(format!("Syntax error: {}", run.output)),
                    None => GateReport::fail(format!(
                        "Syntax check timed out after {}s",
                        self.timeout.as_secs_f64()
                    )),
                }
            }
            Some(tests) => {
                std::fs::write(
                    sandbox.path().join("test_solution.py"),
                    strip_code_fence(tests),
                )
                .map_err(|e| InstarError::Sandbox {
                    reason: format!("cannot write test artifact: {e}"),
                })?;
                let mut cmd = Command::new(&self.python);
                cmd.arg("-m")
                    .arg("pytest")
                    .arg(sandbox.path())
                    .args(["-v", "--tb=short"]);
                let run = self.run_bounded(cmd)?;
                match run.exit_success {
                    Some(success) => GateReport { passed: success, evidence: run.output },
                    None => GateReport::fail(format!(
                        "Test runner timed out after {}s\n{}",
                        self.timeout.as_secs_f64(),
                        run.output
                    )),
                }
            }
        };

        if report.passed {
            debug!(evidence_len = report.evidence.len(), "gate passed");
        } else {
            warn!(evidence = %report.evidence, "gate failed");
        }
        Ok(report)
    }

    /// Run a command with the gate's wall-clock budget, capturing combined
    /// stdout and stderr. The child is killed and reaped on timeout, so no
    /// process outlives the call.
    fn run_bounded(&self, mut cmd: Command) -> InstarResult<SandboxRun> {
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| InstarError::Sandbox {
            reason: format!("cannot spawn '{}': {e}", self.python),
        })?;

        let mut stdout = child.stdout.take().ok_or_else(|| InstarError::Sandbox {
            reason: "child stdout not captured".to_string(),
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| InstarError::Sandbox {
            reason: "child stderr not captured".to_string(),
        })?;
        let out_reader = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            buf
        });
        let err_reader = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let exit_success = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status.success()),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(25)),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(InstarError::Sandbox {
                        reason: format!("waiting on test runner failed: {e}"),
                    });
                }
            }
        };

        let mut output = out_reader.join().unwrap_or_default();
        output.push_str(&err_reader.join().unwrap_or_default());
        Ok(SandboxRun { exit_success, output })
    }
}
