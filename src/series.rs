//! Request-scoped data model: pieces, series kinds, coefficient roles and
//! the kernels attached to them.
//!
//! Expressions and bounds are opaque Maxima text. Nothing here parses or
//! evaluates them; they are only spliced into scripts.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::RequestError;

/// Engine-side names bound by every script that needs the period.
pub const PERIOD_VAR: &str = "fs_T";
pub const FREQUENCY_VAR: &str = "fs_w0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
  pub expression: String,
  pub lower: String,
  pub upper: String,
}

impl Piece {
  pub fn new(
    expression: impl Into<String>,
    lower: impl Into<String>,
    upper: impl Into<String>,
  ) -> Self {
    Self {
      expression: expression.into(),
      lower: lower.into(),
      upper: upper.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiecewiseFunction {
  pieces: Vec<Piece>,
  int_var: String,
}

impl PiecewiseFunction {
  pub fn new(
    pieces: Vec<Piece>,
    int_var: impl Into<String>,
  ) -> Result<Self, RequestError> {
    let int_var = int_var.into();
    if pieces.is_empty() {
      return Err(RequestError::NoPieces);
    }
    if !is_plain_symbol(&int_var) {
      return Err(RequestError::InvalidVariable(int_var));
    }
    for (index, piece) in pieces.iter().enumerate() {
      for (field, text) in [
        ("expression", &piece.expression),
        ("lower bound", &piece.lower),
        ("upper bound", &piece.upper),
      ] {
        if text.trim().is_empty() {
          return Err(RequestError::EmptyField {
            piece: index,
            field,
          });
        }
      }
    }
    Ok(Self { pieces, int_var })
  }

  pub fn pieces(&self) -> &[Piece] {
    &self.pieces
  }

  pub fn int_var(&self) -> &str {
    &self.int_var
  }

  /// `upper(last) - lower(first)`, left for the engine to simplify.
  pub fn period_expr(&self) -> String {
    // new() guarantees at least one piece
    let first = &self.pieces[0];
    let last = &self.pieces[self.pieces.len() - 1];
    format!("({}) - ({})", last.upper, first.lower)
  }
}

fn is_plain_symbol(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
      chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
    _ => false,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HalfRangeParity {
  Cosine,
  Sine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesKind {
  Trigonometric,
  HalfRange(HalfRangeParity),
  Complex,
}

/// Which simplifier pass closes each fold step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplifier {
  /// `ratsimp`
  Light,
  /// `factor(fullratsimp(factor(..)))`
  Strong,
}

impl Simplifier {
  pub fn apply(self, expr: &str) -> String {
    match self {
      Simplifier::Light => format!("ratsimp({expr})"),
      Simplifier::Strong => format!("factor(fullratsimp(factor({expr})))"),
    }
  }
}

impl SeriesKind {
  pub fn roles(self) -> &'static [Role] {
    match self {
      SeriesKind::Trigonometric => &[Role::A0, Role::An, Role::Bn],
      SeriesKind::HalfRange(HalfRangeParity::Cosine) => &[Role::A0, Role::An],
      SeriesKind::HalfRange(HalfRangeParity::Sine) => &[Role::Bn],
      SeriesKind::Complex => &[Role::C0, Role::Cn],
    }
  }

  /// `w0` in terms of the engine-side period variable.
  pub fn frequency_expr(self) -> String {
    match self {
      SeriesKind::HalfRange(_) => format!("%pi/{PERIOD_VAR}"),
      _ => format!("2*%pi/{PERIOD_VAR}"),
    }
  }

  /// Constant the integral of each piece is scaled by.
  pub fn normalization(self) -> String {
    match self {
      SeriesKind::Trigonometric => format!("2/{PERIOD_VAR}"),
      SeriesKind::HalfRange(_) => format!("1/({PERIOD_VAR}/2)"),
      SeriesKind::Complex => format!("1/{PERIOD_VAR}"),
    }
  }

  pub fn simplifier(self) -> Simplifier {
    match self {
      SeriesKind::HalfRange(_) => Simplifier::Light,
      _ => Simplifier::Strong,
    }
  }

  pub fn uses_exponentials(self) -> bool {
    matches!(self, SeriesKind::Complex)
  }
}

impl fmt::Display for SeriesKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SeriesKind::Trigonometric => write!(f, "trigonometric"),
      SeriesKind::HalfRange(HalfRangeParity::Cosine) => {
        write!(f, "half-range cosine")
      }
      SeriesKind::HalfRange(HalfRangeParity::Sine) => {
        write!(f, "half-range sine")
      }
      SeriesKind::Complex => write!(f, "complex exponential"),
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  A0,
  An,
  Bn,
  C0,
  Cn,
}

impl Role {
  pub fn name(self) -> &'static str {
    match self {
      Role::A0 => "a0",
      Role::An => "an",
      Role::Bn => "bn",
      Role::C0 => "c0",
      Role::Cn => "cn",
    }
  }

  /// Whether the coefficient depends on the harmonic index at all.
  pub fn is_harmonic(self) -> bool {
    matches!(self, Role::An | Role::Bn | Role::Cn)
  }

  /// Kernel multiplied into each piece before integrating.
  pub fn integration_kernel(self) -> Option<Kernel> {
    match self {
      Role::A0 | Role::C0 => None,
      Role::An => Some(Kernel::Cosine),
      Role::Bn => Some(Kernel::Sine),
      Role::Cn => Some(Kernel::DecayingExponential),
    }
  }

  /// Kernel multiplying the coefficient inside one series term.
  pub fn expansion_kernel(self) -> Option<Kernel> {
    match self {
      Role::Cn => Some(Kernel::GrowingExponential),
      other => other.integration_kernel(),
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
  Cosine,
  Sine,
  /// `exp(-%i*n*w0*x)`
  DecayingExponential,
  /// `exp(%i*n*w0*x)`
  GrowingExponential,
}

impl Kernel {
  /// `index` is either the harmonic symbol or an integer literal.
  pub fn render(self, index: &str, w0: &str, int_var: &str) -> String {
    let phase = format!("{}*{}*{}", wrap_negative(index), w0, int_var);
    match self {
      Kernel::Cosine => format!("cos({phase})"),
      Kernel::Sine => format!("sin({phase})"),
      Kernel::DecayingExponential => format!("exp(-%i*{phase})"),
      Kernel::GrowingExponential => format!("exp(%i*{phase})"),
    }
  }
}

fn wrap_negative(index: &str) -> String {
  if index.starts_with('-') {
    format!("({index})")
  } else {
    index.to_string()
  }
}

/// Everything a single request carries through the pipeline.
#[derive(Debug, Clone)]
pub struct SeriesContext {
  pub function: PiecewiseFunction,
  pub kind: SeriesKind,
  pub harmonic_index: String,
  pub request_id: Uuid,
}

impl SeriesContext {
  pub fn new(
    function: PiecewiseFunction,
    kind: SeriesKind,
    harmonic_index: impl Into<String>,
  ) -> Result<Self, RequestError> {
    let harmonic_index = harmonic_index.into();
    if function.int_var() == harmonic_index {
      return Err(RequestError::VariableIsHarmonicIndex(
        function.int_var().to_string(),
      ));
    }
    Ok(Self {
      function,
      kind,
      harmonic_index,
      request_id: Uuid::new_v4(),
    })
  }

  pub fn roles(&self) -> &'static [Role] {
    self.kind.roles()
  }

  pub fn int_var(&self) -> &str {
    self.function.int_var()
  }
}
