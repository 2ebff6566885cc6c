//! Coefficient Synthesizer.
//!
//! Folds the normalized integral of every piece into one closed-form
//! expression per role. Half-range series close each step with `ratsimp`,
//! the other kinds with `factor(fullratsimp(factor(..)))`. The two passes
//! settle on different canonical forms for half-range integrands, so the
//! split stays.

use futures::future::try_join_all;
use log::info;
use serde::Serialize;

use crate::engine::{evaluate_value, EngineGateway};
use crate::parse::parse_list;
use crate::script::{RuleConfig, Script, ScriptBuilder};
use crate::series::{Role, SeriesContext, FREQUENCY_VAR, PERIOD_VAR};
use crate::validate::SeriesValidation;
use crate::SeriesError;

pub const ACCUMULATOR_VAR: &str = "fs_acc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoefficientExpression {
  pub role: Role,
  pub expression_text: String,
  pub period_text: String,
  pub w0_text: String,
}

impl CoefficientExpression {
  pub fn is_zero(&self) -> bool {
    self.expression_text.trim() == "0"
  }
}

/// Preamble, period bindings and the accumulation statements for `role`,
/// leaving the result in [`ACCUMULATOR_VAR`].
///
/// The resolver reuses this with `rules` lacking the integer declaration,
/// so the fold itself must not depend on which rules are active.
pub fn fold(
  ctx: &SeriesContext,
  role: Role,
  rules: &RuleConfig,
) -> ScriptBuilder {
  let normalization = ctx.kind.normalization();
  let simplifier = ctx.kind.simplifier();
  let kernel = role
    .integration_kernel()
    .map(|k| k.render(&ctx.harmonic_index, FREQUENCY_VAR, ctx.int_var()));

  let mut builder = ScriptBuilder::new(rules)
    .with_period(ctx)
    .assign(ACCUMULATOR_VAR, "0");
  for piece in ctx.function.pieces() {
    let integrand = match &kernel {
      Some(kernel) => format!("{}*({})", kernel, piece.expression),
      None => format!("({})", piece.expression),
    };
    builder = builder
      .assign(
        ACCUMULATOR_VAR,
        &format!(
          "{ACCUMULATOR_VAR} + ({normalization})*\
           integrate({integrand}, {}, {}, {})",
          ctx.int_var(),
          piece.lower,
          piece.upper
        ),
      )
      .assign(ACCUMULATOR_VAR, &simplifier.apply(ACCUMULATOR_VAR));
  }
  builder
}

pub fn synthesis_script(ctx: &SeriesContext, role: Role) -> Script {
  fold(ctx, role, &RuleConfig::for_context(ctx)).plain(&format!(
    "[{ACCUMULATOR_VAR}, {PERIOD_VAR}, {FREQUENCY_VAR}]"
  ))
}

async fn synthesize_role(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
  role: Role,
) -> Result<CoefficientExpression, SeriesError> {
  let output = evaluate_value(engine, &synthesis_script(ctx, role)).await?;
  match parse_list(&output).as_slice() {
    [expression, period, w0] => Ok(CoefficientExpression {
      role,
      expression_text: expression.trim().to_string(),
      period_text: period.trim().to_string(),
      w0_text: w0.trim().to_string(),
    }),
    _ => Err(SeriesError::MalformedOutput {
      stage: "synthesis",
      output,
    }),
  }
}

/// One coefficient per role of the request's kind, in role order.
///
/// Refuses to run unless `validation` passed. Roles are independent and
/// are computed concurrently; any failure aborts the stage.
pub async fn synthesize(
  ctx: &SeriesContext,
  validation: &SeriesValidation,
  engine: &dyn EngineGateway,
) -> Result<Vec<CoefficientExpression>, SeriesError> {
  if !validation.overall_valid {
    return Err(SeriesError::NotValidated);
  }
  let coefficients = try_join_all(
    ctx
      .roles()
      .iter()
      .map(|&role| synthesize_role(ctx, engine, role)),
  )
  .await?;
  info!(
    "[{}] synthesized {}",
    ctx.request_id,
    coefficients
      .iter()
      .map(|c| format!("{} = {}", c.role, c.expression_text))
      .collect::<Vec<_>>()
      .join(", ")
  );
  Ok(coefficients)
}
