//! Safe Term Evaluator.
//!
//! The coefficient at a concrete index comes from the singularity table
//! when the index is listed there, and from direct substitution otherwise.

use futures::future::try_join_all;
use log::info;
use serde::Serialize;

use crate::engine::{evaluate_value, EngineGateway};
use crate::render::typeset;
use crate::script::{RuleConfig, ScriptBuilder};
use crate::series::{HalfRangeParity, Role, SeriesContext, SeriesKind};
use crate::singularity::{Resolver, SingularityTable};
use crate::synthesize::CoefficientExpression;
use crate::SeriesError;

/// Values that mean a term failed to resolve.
const UNRESOLVED_VALUES: &[&str] = &["und", "ind", "inf", "minf", "infinity"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedTerm {
  pub harmonic_index: i64,
  pub value_text: String,
  pub typeset_text: String,
}

/// The coefficient of `role` at index `n`, as engine text.
pub fn coefficient_at(
  ctx: &SeriesContext,
  coefficient: &CoefficientExpression,
  table: &SingularityTable,
  n: i64,
) -> String {
  match table.get(n) {
    Some(singularity) => format!("({})", singularity.limit_expression_text),
    None => format!(
      "subst({} = {}, ({}))",
      ctx.harmonic_index, n, coefficient.expression_text
    ),
  }
}

/// `coefficient(n) * kernel(n)`, or `None` when the coefficient is zero.
pub fn role_term(
  ctx: &SeriesContext,
  coefficient: &CoefficientExpression,
  table: &SingularityTable,
  n: i64,
) -> Option<String> {
  if coefficient.is_zero() {
    return None;
  }
  let value = coefficient_at(ctx, coefficient, table, n);
  let w0 = format!("({})", coefficient.w0_text);
  Some(match coefficient.role.expansion_kernel() {
    Some(kernel) => {
      format!("{}*{}", value, kernel.render(&n.to_string(), &w0, ctx.int_var()))
    }
    None => value,
  })
}

/// `term(role, n)`: one role's contribution at index `n`.
pub async fn term(
  resolver: &Resolver<'_>,
  role: Role,
  n: i64,
) -> Result<Option<String>, SeriesError> {
  let coefficient = resolver.coefficient(role)?;
  let table = resolver.singularities(role).await?;
  Ok(role_term(resolver.context(), coefficient, table, n))
}

/// Parts summed into the `n`-th term of the expansion.
async fn term_parts(
  resolver: &Resolver<'_>,
  n: i64,
) -> Result<Vec<String>, SeriesError> {
  let ctx = resolver.context();
  let mut parts = Vec::new();
  match (ctx.kind, n) {
    (SeriesKind::Complex, 0) => {
      parts.extend(constant_part(resolver, Role::C0, false)?);
    }
    (SeriesKind::Complex, n) => {
      parts.extend(term(resolver, Role::Cn, n).await?);
      parts.extend(term(resolver, Role::Cn, -n).await?);
    }
    (SeriesKind::HalfRange(HalfRangeParity::Sine), n) => {
      parts.extend(term(resolver, Role::Bn, n).await?);
    }
    (_, 0) => {
      parts.extend(constant_part(resolver, Role::A0, true)?);
    }
    (SeriesKind::Trigonometric, n) => {
      parts.extend(term(resolver, Role::An, n).await?);
      parts.extend(term(resolver, Role::Bn, n).await?);
    }
    (SeriesKind::HalfRange(HalfRangeParity::Cosine), n) => {
      parts.extend(term(resolver, Role::An, n).await?);
    }
  }
  Ok(parts)
}

fn constant_part(
  resolver: &Resolver<'_>,
  role: Role,
  halved: bool,
) -> Result<Option<String>, SeriesError> {
  let coefficient = resolver.coefficient(role)?;
  if coefficient.is_zero() {
    return Ok(None);
  }
  Ok(Some(if halved {
    format!("({})/2", coefficient.expression_text)
  } else {
    format!("({})", coefficient.expression_text)
  }))
}

pub fn has_constant_term(kind: SeriesKind) -> bool {
  !matches!(kind, SeriesKind::HalfRange(HalfRangeParity::Sine))
}

/// Evaluates and typesets the `n`-th term.
pub async fn expanded_term(
  resolver: &Resolver<'_>,
  n: i64,
) -> Result<ExpandedTerm, SeriesError> {
  let parts = term_parts(resolver, n).await?;
  if parts.is_empty() {
    return Ok(ExpandedTerm {
      harmonic_index: n,
      value_text: "0".into(),
      typeset_text: "0".into(),
    });
  }

  let ctx = resolver.context();
  let engine: &dyn EngineGateway = resolver.engine();
  let rules = RuleConfig::for_context(ctx);
  let script = ScriptBuilder::new(&rules)
    .assign("fs_term", &format!("ratsimp({})", parts.join(" + ")))
    .plain("fs_term");
  let value = evaluate_value(engine, &script).await?;
  if value.is_empty() || UNRESOLVED_VALUES.contains(&value.as_str()) {
    return Err(SeriesError::UnresolvedTerm { index: n, value });
  }
  let typeset_text = typeset(engine, &rules, &value).await?;
  Ok(ExpandedTerm {
    harmonic_index: n,
    value_text: value,
    typeset_text,
  })
}

/// The constant term (when the kind has one) followed by terms `1..=count`.
///
/// Terms are independent and are evaluated concurrently; any failure aborts
/// the stage.
pub async fn expand(
  resolver: &Resolver<'_>,
  count: usize,
) -> Result<Vec<ExpandedTerm>, SeriesError> {
  let ctx = resolver.context();
  let first = if has_constant_term(ctx.kind) { 0 } else { 1 };
  let last = i64::try_from(count).unwrap_or(i64::MAX);
  let terms =
    try_join_all((first..=last).map(|n| expanded_term(resolver, n))).await?;
  info!("[{}] expanded {} terms", ctx.request_id, terms.len());
  Ok(terms)
}
