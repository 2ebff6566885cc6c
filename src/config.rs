//! Engine configuration shared by the library and the `fourier` binary.
//!
//! Values are resolved with the usual precedence: command-line flag, then
//! environment variable, then the built-in defaults below. The binary does
//! the flag/env layering through clap; library users build this directly.

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXECUTABLE: &str = "maxima";
pub const DEFAULT_HARMONIC_INDEX: &str = "n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Path or name of the Maxima executable
  #[serde(default = "default_executable")]
  pub executable: String,
  /// Extra arguments passed on every invocation
  #[serde(default = "default_args")]
  pub args: Vec<String>,
  /// Symbol used for the harmonic index inside every script
  #[serde(default = "default_harmonic_index")]
  pub harmonic_index: String,
}

fn default_executable() -> String {
  DEFAULT_EXECUTABLE.to_string()
}

fn default_args() -> Vec<String> {
  vec!["--very-quiet".to_string()]
}

fn default_harmonic_index() -> String {
  DEFAULT_HARMONIC_INDEX.to_string()
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      executable: default_executable(),
      args: default_args(),
      harmonic_index: default_harmonic_index(),
    }
  }
}

impl EngineConfig {
  pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
    self.executable = executable.into();
    self
  }
}
