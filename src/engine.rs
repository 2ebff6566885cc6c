//! Engine Gateway: one script in, raw text out.
//!
//! [`MaximaEngine`] starts a fresh Maxima process per call, writes the script
//! to its stdin and reads everything it prints. Nothing is pooled or
//! retried, and there is no timeout.

use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::script::{final_value, Script};

/// Case-insensitive substrings that mark a clean exit as a failed
/// computation. Not exhaustive.
pub const DIAGNOSTIC_PATTERNS: &[&str] = &[
  "error",
  "division by zero",
  "log: encountered log(0)",
  "is not of type",
  "argument cannot be",
  "unexpected condition",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  /// The process could not be run or exited non-zero.
  #[error("engine invocation failed: {0}")]
  Invocation(String),
  /// Clean exit, but the output carries a diagnostic.
  #[error("engine reported `{pattern}`: {output}")]
  Diagnostic {
    pattern: &'static str,
    output: String,
  },
}

#[async_trait]
pub trait EngineGateway: Send + Sync {
  /// Runs `script` and returns everything the engine printed.
  async fn evaluate(&self, script: &Script) -> Result<String, EngineError>;
}

/// Runs `script` and keeps only the final reported value.
pub async fn evaluate_value(
  engine: &dyn EngineGateway,
  script: &Script,
) -> Result<String, EngineError> {
  let output = engine.evaluate(script).await?;
  Ok(final_value(&output).to_string())
}

/// Fails with [`EngineError::Diagnostic`] if `output` matches a pattern.
pub fn check_diagnostics(output: &str) -> Result<(), EngineError> {
  let lowered = output.to_lowercase();
  match DIAGNOSTIC_PATTERNS
    .iter()
    .copied()
    .find(|p| lowered.contains(p))
  {
    Some(pattern) => Err(EngineError::Diagnostic {
      pattern,
      output: output.trim().to_string(),
    }),
    None => Ok(()),
  }
}

pub struct MaximaEngine {
  config: EngineConfig,
}

impl MaximaEngine {
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }
}

#[async_trait]
impl EngineGateway for MaximaEngine {
  async fn evaluate(&self, script: &Script) -> Result<String, EngineError> {
    debug!("maxima <<<\n{script}");
    let mut child = Command::new(&self.config.executable)
      .args(&self.config.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| {
        EngineError::Invocation(format!(
          "failed to start {}: {}",
          self.config.executable, e
        ))
      })?;

    let mut stdin = child.stdin.take().ok_or_else(|| {
      EngineError::Invocation("engine stdin was not captured".into())
    })?;
    let input = script.as_str().as_bytes().to_vec();
    let writer = async move {
      stdin.write_all(&input).await?;
      stdin.shutdown().await?;
      Ok::<(), std::io::Error>(())
    };

    let (written, output) = tokio::join!(writer, child.wait_with_output());
    let output = output.map_err(|e| {
      EngineError::Invocation(format!("failed to read engine output: {e}"))
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(EngineError::Invocation(format!(
        "{} exited with {}: {}",
        self.config.executable,
        output.status,
        stderr.trim()
      )));
    }
    written.map_err(|e| {
      EngineError::Invocation(format!("failed to write script: {e}"))
    })?;

    debug!("maxima >>>\n{}", stdout.trim_end());
    check_diagnostics(&stdout)?;
    Ok(stdout)
  }
}
