//! Indeterminacy Resolver.
//!
//! Synthesis declares the harmonic index an integer so that identities like
//! `sin(n*%pi) = 0` collapse. That can hide a factor which vanishes at some
//! integer, so substituting that integer later divides by zero. To find those
//! indices the same fold is recomputed with `n` left general, the integer
//! roots of its denominator are collected, and each root is resolved by
//! taking the limit of the general expression.
//!
//! A root is reported when the denominator of the integer-declared
//! coefficient vanishes there and the general limit is finite. The integer
//! declaration can turn a removable 0/0 into `c/0` (`x*sin(x)` gives
//! `2*(-1)^n/(1-n^2)`), so the numerator is only consulted at `n = 0`,
//! which the expansion never substitutes: there a pole that is not 0/0
//! belongs to the formula, not to the series. A root whose limit cannot be
//! evaluated is dropped on its own without failing the others.

use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::OnceCell;

use crate::engine::{evaluate_value, EngineGateway};
use crate::parse::{parse_list, parse_pair};
use crate::render::typeset;
use crate::script::{RuleConfig, Script};
use crate::series::{Role, SeriesContext};
use crate::synthesize::{fold, CoefficientExpression, ACCUMULATOR_VAR};
use crate::SeriesError;

/// Limit results that do not resolve the indeterminacy.
const UNRESOLVED_LIMITS: &[&str] = &["und", "ind", "inf", "minf", "infinity"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Singularity {
  pub harmonic_index: i64,
  pub limit_expression_text: String,
  pub limit_typeset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SingularityTable {
  entries: Vec<Singularity>,
}

impl SingularityTable {
  pub fn new(mut entries: Vec<Singularity>) -> Self {
    entries.sort_by_key(|s| s.harmonic_index);
    entries.dedup_by_key(|s| s.harmonic_index);
    Self { entries }
  }

  pub fn get(&self, harmonic_index: i64) -> Option<&Singularity> {
    self
      .entries
      .iter()
      .find(|s| s.harmonic_index == harmonic_index)
  }

  pub fn entries(&self) -> &[Singularity] {
    &self.entries
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Integer roots of the denominator of the general (non-integer) fold.
pub fn candidate_script(ctx: &SeriesContext, role: Role) -> Script {
  let rules = RuleConfig::for_context(ctx).without_integer_index();
  let n = &ctx.harmonic_index;
  fold(ctx, role, &rules)
    .assign("fs_den", &format!("denom({ACCUMULATOR_VAR})"))
    .assign("fs_roots", &format!("solve(fs_den = 0, {n})"))
    .assign("fs_ints", "sublist(map(rhs, fs_roots), integerp)")
    .plain("fs_ints")
}

/// Probes `root` in the integer-declared coefficient and takes the limit of
/// the general fold there.
///
/// Reports `[[numerator vanishes, denominator vanishes], limit]`.
pub fn limit_script(
  ctx: &SeriesContext,
  coefficient: &CoefficientExpression,
  root: i64,
) -> Script {
  let rules = RuleConfig::for_context(ctx).without_integer_index();
  let n = &ctx.harmonic_index;
  fold(ctx, coefficient.role, &rules)
    .assign("fs_coef", &coefficient.expression_text)
    .assign(
      "fs_probe",
      &format!(
        "[is(ratsimp(subst({n} = {root}, num(fs_coef))) = 0), \
         is(ratsimp(subst({n} = {root}, denom(fs_coef))) = 0)]"
      ),
    )
    .assign(
      "fs_lim",
      &format!("ratsimp(limit({ACCUMULATOR_VAR}, {n}, {root}))"),
    )
    .plain("[fs_probe, fs_lim]")
}

async fn candidate_roots(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
  role: Role,
) -> Result<Vec<i64>, SeriesError> {
  let output = evaluate_value(engine, &candidate_script(ctx, role)).await?;
  let trimmed = output.trim();
  if trimmed == "[]" {
    return Ok(Vec::new());
  }
  let fields = parse_list(trimmed);
  if fields.is_empty() {
    return Err(SeriesError::MalformedOutput {
      stage: "singularity search",
      output,
    });
  }
  let mut roots = Vec::new();
  for field in &fields {
    match field.trim().parse::<i64>() {
      Ok(root) => roots.push(root),
      Err(_) => warn!("[{}] ignoring non-integer root {field}", ctx.request_id),
    }
  }
  roots.sort_unstable();
  roots.dedup();
  Ok(roots)
}

/// Why a candidate root produced no singularity.
#[derive(Debug)]
enum RootRejection {
  /// Direct substitution is safe there, or `n = 0` is a plain pole.
  Spurious,
  Failed(String),
}

/// Whether a probed root needs an override, given which of the
/// integer-declared numerator and denominator vanish there.
fn needs_override(
  root: i64,
  numerator_vanishes: bool,
  denominator_vanishes: bool,
) -> bool {
  denominator_vanishes && (root != 0 || numerator_vanishes)
}

async fn resolve_root(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
  coefficient: &CoefficientExpression,
  root: i64,
) -> Result<Singularity, RootRejection> {
  let script = limit_script(ctx, coefficient, root);
  let output = evaluate_value(engine, &script)
    .await
    .map_err(|e| RootRejection::Failed(e.to_string()))?;
  let (probe, limit) = parse_pair(&output).ok_or_else(|| {
    RootRejection::Failed(format!("malformed output {output}"))
  })?;
  let Some((num, den)) = parse_pair(&probe) else {
    return Err(RootRejection::Failed(format!("malformed probe {probe}")));
  };
  if !needs_override(root, num.trim() == "true", den.trim() == "true") {
    return Err(RootRejection::Spurious);
  }
  let limit = limit.trim().to_string();
  if UNRESOLVED_LIMITS.contains(&limit.as_str()) {
    return Err(RootRejection::Failed(format!("limit is {limit}")));
  }
  let limit_typeset = typeset(engine, &RuleConfig::for_context(ctx), &limit)
    .await
    .map_err(|e| RootRejection::Failed(e.to_string()))?;
  Ok(Singularity {
    harmonic_index: root,
    limit_expression_text: limit,
    limit_typeset,
  })
}

/// Singularities of one synthesized coefficient.
///
/// Zero coefficients and roles without a harmonic index have none and
/// cost no engine call.
pub async fn resolve(
  ctx: &SeriesContext,
  engine: &dyn EngineGateway,
  coefficient: &CoefficientExpression,
) -> Result<SingularityTable, SeriesError> {
  if coefficient.is_zero() || !coefficient.role.is_harmonic() {
    return Ok(SingularityTable::default());
  }
  let roots = candidate_roots(ctx, engine, coefficient.role).await?;
  debug!(
    "[{}] {} candidate roots: {:?}",
    ctx.request_id, coefficient.role, roots
  );

  let results = join_all(
    roots
      .iter()
      .map(|&root| resolve_root(ctx, engine, coefficient, root)),
  )
  .await;

  let mut entries = Vec::new();
  for (root, result) in roots.iter().zip(results) {
    match result {
      Ok(singularity) => entries.push(singularity),
      Err(RootRejection::Spurious) => debug!(
        "[{}] {} at {} = {} needs no override",
        ctx.request_id, coefficient.role, ctx.harmonic_index, root
      ),
      Err(RootRejection::Failed(reason)) => warn!(
        "[{}] dropping {} singularity at {} = {}: {}",
        ctx.request_id, coefficient.role, ctx.harmonic_index, root, reason
      ),
    }
  }
  let table = SingularityTable::new(entries);
  info!(
    "[{}] {} has {} singularities",
    ctx.request_id,
    coefficient.role,
    table.entries().len()
  );
  Ok(table)
}

/// Lazily resolved, request-scoped singularity tables, one per role.
pub struct Resolver<'a> {
  ctx: &'a SeriesContext,
  engine: &'a dyn EngineGateway,
  coefficients: &'a [CoefficientExpression],
  tables: HashMap<Role, OnceCell<SingularityTable>>,
}

impl<'a> Resolver<'a> {
  pub fn new(
    ctx: &'a SeriesContext,
    engine: &'a dyn EngineGateway,
    coefficients: &'a [CoefficientExpression],
  ) -> Self {
    let tables = coefficients
      .iter()
      .map(|c| (c.role, OnceCell::new()))
      .collect();
    Self {
      ctx,
      engine,
      coefficients,
      tables,
    }
  }

  pub fn context(&self) -> &'a SeriesContext {
    self.ctx
  }

  pub fn engine(&self) -> &'a dyn EngineGateway {
    self.engine
  }

  pub fn coefficients(&self) -> &'a [CoefficientExpression] {
    self.coefficients
  }

  pub fn coefficient(
    &self,
    role: Role,
  ) -> Result<&'a CoefficientExpression, SeriesError> {
    self
      .coefficients
      .iter()
      .find(|c| c.role == role)
      .ok_or(SeriesError::MissingCoefficient(role))
  }

  /// Resolves `role` on first use; later calls reuse the table.
  pub async fn singularities(
    &self,
    role: Role,
  ) -> Result<&SingularityTable, SeriesError> {
    let coefficient = self.coefficient(role)?;
    let cell = self
      .tables
      .get(&role)
      .ok_or(SeriesError::MissingCoefficient(role))?;
    cell
      .get_or_try_init(|| resolve(self.ctx, self.engine, coefficient))
      .await
  }

  /// Resolves every role concurrently.
  pub async fn resolve_all(
    &self,
  ) -> Result<Vec<(Role, &SingularityTable)>, SeriesError> {
    let tables = futures::future::try_join_all(
      self.coefficients.iter().map(|c| self.singularities(c.role)),
    )
    .await?;
    Ok(
      self
        .coefficients
        .iter()
        .map(|c| c.role)
        .zip(tables)
        .collect(),
    )
  }
}
