//! Maxima script templating.
//!
//! Every script starts with the full rule preamble of its [`RuleConfig`].
//! Maxima processes are never reused, but the preamble is still re-issued on
//! every call so that no script depends on state left by another one.

use std::fmt;

use crate::series::{SeriesContext, FREQUENCY_VAR, PERIOD_VAR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
  pub harmonic_index: String,
  /// `declare(n, integer)`
  pub declare_harmonic_integer: bool,
  /// `assume(notequal(n, 0))`, keeps integrate from asking about n = 0
  pub nonzero_harmonic_index: bool,
  pub trigonometric_rules: bool,
  /// Period expression assumed to be positive.
  pub positive_period: Option<String>,
  pub exponential_rules: bool,
  pub display_flags: bool,
}

impl RuleConfig {
  /// Rules used for validation, synthesis, expansion and rendering.
  pub fn for_context(ctx: &SeriesContext) -> Self {
    Self {
      harmonic_index: ctx.harmonic_index.clone(),
      declare_harmonic_integer: true,
      nonzero_harmonic_index: true,
      trigonometric_rules: true,
      positive_period: Some(ctx.function.period_expr()),
      exponential_rules: ctx.kind.uses_exponentials(),
      display_flags: true,
    }
  }

  /// Same rules with the harmonic index left as a general symbol.
  pub fn without_integer_index(&self) -> Self {
    Self {
      declare_harmonic_integer: false,
      ..self.clone()
    }
  }

  pub fn preamble(&self) -> Vec<String> {
    let mut lines = Vec::new();
    if self.display_flags {
      lines.push("display2d: false$".to_string());
      lines.push("linel: 100000$".to_string());
      lines.push("ratprint: false$".to_string());
    }
    if self.declare_harmonic_integer {
      lines.push(format!("declare({}, integer)$", self.harmonic_index));
    }
    if self.nonzero_harmonic_index {
      lines.push(format!("assume(notequal({}, 0))$", self.harmonic_index));
    }
    if self.trigonometric_rules {
      lines.push("trigsign: true$".to_string());
      lines.push("%piargs: true$".to_string());
      lines.push("%iargs: true$".to_string());
    }
    if let Some(period) = &self.positive_period {
      lines.push(format!("assume({period} > 0)$"));
    }
    if self.exponential_rules {
      lines.push("exponentialize: false$".to_string());
      lines.push("demoivre: true$".to_string());
    }
    lines
  }
}

/// A complete script, ready to be fed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script(String);

impl Script {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Script {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

pub struct ScriptBuilder {
  lines: Vec<String>,
}

impl ScriptBuilder {
  pub fn new(rules: &RuleConfig) -> Self {
    Self {
      lines: rules.preamble(),
    }
  }

  /// Binds the period and angular frequency for the request's kind.
  pub fn with_period(self, ctx: &SeriesContext) -> Self {
    self
      .assign(
        PERIOD_VAR,
        &format!("ratsimp({})", ctx.function.period_expr()),
      )
      .assign(FREQUENCY_VAR, &ctx.kind.frequency_expr())
  }

  pub fn assign(self, name: &str, value: &str) -> Self {
    self.statement(&format!("{name}: {value}"))
  }

  /// Intermediate statement, output suppressed.
  pub fn statement(mut self, statement: &str) -> Self {
    self.lines.push(format!("{statement}$"));
    self
  }

  /// Reports `expr` as one line of plain text.
  pub fn plain(self, expr: &str) -> Script {
    self.finish(format!("string({expr});"))
  }

  /// Reports `expr` as TeX.
  pub fn typeset(self, expr: &str) -> Script {
    self.finish(format!("tex1({expr});"))
  }

  fn finish(mut self, last: String) -> Script {
    self.lines.push(last);
    let mut text = self.lines.join("\n");
    text.push('\n');
    Script(text)
  }
}

/// The final reported value: the last non-empty line the engine printed.
pub fn final_value(output: &str) -> &str {
  output
    .lines()
    .map(str::trim)
    .rfind(|line| !line.is_empty())
    .unwrap_or("")
}
