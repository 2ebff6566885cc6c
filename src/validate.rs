//! Piecewise Validator.
//!
//! Each (piece, role) pair is integrated on its own. The pair is valid when
//! the engine found a closed form that is free of special functions.

use futures::future::try_join_all;
use log::{debug, info};
use serde::Serialize;

use crate::engine::{evaluate_value, EngineGateway};
use crate::parse::parse_list;
use crate::script::{RuleConfig, Script, ScriptBuilder};
use crate::series::{Role, SeriesContext, FREQUENCY_VAR};
use crate::SeriesError;

/// Symbols whose presence in a result rejects the series.
pub const SPECIAL_FUNCTIONS: &[&str] = &[
  "erf",
  "erfc",
  "erfi",
  "gamma",
  "gamma_incomplete",
  "gamma_incomplete_lower",
  "gamma_incomplete_generalized",
  "beta",
  "beta_incomplete",
  "bessel_j",
  "bessel_y",
  "bessel_i",
  "bessel_k",
  "hankel_1",
  "hankel_2",
  "struve_h",
  "struve_l",
  "airy_ai",
  "airy_bi",
  "elliptic_f",
  "elliptic_e",
  "elliptic_pi",
  "elliptic_kc",
  "elliptic_ec",
  "hypergeometric",
  "%f",
  "%m",
  "%w",
  "expintegral_e",
  "expintegral_e1",
  "expintegral_ei",
  "expintegral_li",
  "expintegral_si",
  "expintegral_ci",
  "expintegral_shi",
  "expintegral_chi",
  "li",
  "polylog",
  "fresnel_s",
  "fresnel_c",
  "lambert_w",
  "zeta",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
  pub piece: usize,
  pub role: Role,
  pub is_integrable: bool,
  pub has_special_functions: bool,
  pub result_text: String,
}

impl ValidationOutcome {
  pub fn is_valid(&self) -> bool {
    self.is_integrable && !self.has_special_functions
  }

  fn describe(&self) -> String {
    let reason = match (self.is_integrable, self.has_special_functions) {
      (false, _) => "no closed-form integral",
      (true, true) => "integral needs special functions",
      (true, false) => "ok",
    };
    format!("piece {} ({}): {}", self.piece, self.role, reason)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesValidation {
  pub outcomes: Vec<ValidationOutcome>,
  pub overall_valid: bool,
}

impl SeriesValidation {
  pub fn from_outcomes(outcomes: Vec<ValidationOutcome>) -> Self {
    let overall_valid = outcomes.iter().all(ValidationOutcome::is_valid);
    Self {
      outcomes,
      overall_valid,
    }
  }

  pub fn offending(&self) -> impl Iterator<Item = &ValidationOutcome> {
    self.outcomes.iter().filter(|o| !o.is_valid())
  }

  /// Names every offending piece index and role.
  pub fn failure_message(&self) -> String {
    let details: Vec<String> =
      self.offending().map(ValidationOutcome::describe).collect();
    format!(
      "the series cannot be computed in closed form: {}",
      details.join("; ")
    )
  }
}

pub fn validation_script(
  ctx: &SeriesContext,
  piece_index: usize,
  role: Role,
) -> Script {
  let piece = &ctx.function.pieces()[piece_index];
  let integrand = match role.integration_kernel() {
    Some(kernel) => format!(
      "{}*({})",
      kernel.render(&ctx.harmonic_index, FREQUENCY_VAR, ctx.int_var()),
      piece.expression
    ),
    None => format!("({})", piece.expression),
  };
  let specials = SPECIAL_FUNCTIONS.join(", ");

  ScriptBuilder::new(&RuleConfig::for_context(ctx))
    .with_period(ctx)
    .assign(
      "fs_r",
      &format!(
        "integrate({}, {}, {}, {})",
        integrand,
        ctx.int_var(),
        piece.lower,
        piece.upper
      ),
    )
    .assign("fs_unresolved", "not freeof(nounify(integrate), fs_r)")
    .assign("fs_special", &format!("not freeof({specials}, fs_r)"))
    .plain("[fs_r, fs_unresolved, fs_special]")
}

async fn validate_one(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
  piece: usize,
  role: Role,
) -> Result<ValidationOutcome, SeriesError> {
  let script = validation_script(ctx, piece, role);
  let output = evaluate_value(engine, &script).await?;
  let fields = parse_list(&output);
  let [result, unresolved, special] = fields.as_slice() else {
    return Err(SeriesError::MalformedOutput {
      stage: "validation",
      output,
    });
  };
  let outcome = ValidationOutcome {
    piece,
    role,
    is_integrable: !parse_flag(unresolved, &output)?,
    has_special_functions: parse_flag(special, &output)?,
    result_text: result.trim().to_string(),
  };
  debug!("[{}] {}", ctx.request_id, outcome.describe());
  Ok(outcome)
}

fn parse_flag(field: &str, output: &str) -> Result<bool, SeriesError> {
  match field.trim() {
    "true" => Ok(true),
    "false" => Ok(false),
    _ => Err(SeriesError::MalformedOutput {
      stage: "validation",
      output: output.to_string(),
    }),
  }
}

/// Checks every piece against every role of the request's kind.
///
/// Any engine failure aborts the whole stage.
pub async fn validate(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
) -> Result<SeriesValidation, SeriesError> {
  let checks = (0..ctx.function.pieces().len()).flat_map(move |piece| {
    ctx
      .roles()
      .iter()
      .map(move |&role| validate_one(ctx, engine, piece, role))
  });
  let outcomes = try_join_all(checks).await?;
  let validation = SeriesValidation::from_outcomes(outcomes);
  info!(
    "[{}] validation: {} checks, overall valid = {}",
    ctx.request_id,
    validation.outcomes.len(),
    validation.overall_valid
  );
  Ok(validation)
}
