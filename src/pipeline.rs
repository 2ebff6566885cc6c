//! Request boundary and stage orchestration.
//!
//! Stages run strictly in order (validate, synthesize, resolve, expand,
//! render); each one fans out its independent engine calls and joins them
//! before the next starts.

use futures::future::try_join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::engine::EngineGateway;
use crate::expand::{expand, ExpandedTerm};
use crate::render::typeset;
use crate::script::RuleConfig;
use crate::series::{
  HalfRangeParity, Piece, PiecewiseFunction, SeriesContext, SeriesKind,
};
use crate::singularity::{Resolver, Singularity};
use crate::synthesize::{synthesize, CoefficientExpression};
use crate::validate::{validate, SeriesValidation, ValidationOutcome};
use crate::{RequestError, SeriesError};

pub const DEFAULT_TERMS: usize = 5;

/// The wire shape of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
  /// `[[expression, lower, upper], ...]`
  pub piecewise_function: Vec<[String; 3]>,
  pub int_var: String,
  /// `trigonometric`, `halfRangeCosine`, `halfRangeSine` or `complex`
  pub series_kind: String,
  #[serde(default)]
  pub terms: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesRequest {
  Trigonometric {
    function: PiecewiseFunction,
    terms: usize,
  },
  HalfRange {
    function: PiecewiseFunction,
    parity: HalfRangeParity,
    terms: usize,
  },
  Complex {
    function: PiecewiseFunction,
    terms: usize,
  },
}

impl SeriesRequest {
  pub fn new(
    function: PiecewiseFunction,
    kind: SeriesKind,
    terms: usize,
  ) -> Result<Self, RequestError> {
    if terms == 0 {
      return Err(RequestError::NoTerms);
    }
    Ok(match kind {
      SeriesKind::Trigonometric => {
        SeriesRequest::Trigonometric { function, terms }
      }
      SeriesKind::HalfRange(parity) => SeriesRequest::HalfRange {
        function,
        parity,
        terms,
      },
      SeriesKind::Complex => SeriesRequest::Complex { function, terms },
    })
  }

  pub fn kind(&self) -> SeriesKind {
    match self {
      SeriesRequest::Trigonometric { .. } => SeriesKind::Trigonometric,
      SeriesRequest::HalfRange { parity, .. } => SeriesKind::HalfRange(*parity),
      SeriesRequest::Complex { .. } => SeriesKind::Complex,
    }
  }

  pub fn terms(&self) -> usize {
    match self {
      SeriesRequest::Trigonometric { terms, .. }
      | SeriesRequest::HalfRange { terms, .. }
      | SeriesRequest::Complex { terms, .. } => *terms,
    }
  }

  pub fn into_function(self) -> PiecewiseFunction {
    match self {
      SeriesRequest::Trigonometric { function, .. }
      | SeriesRequest::HalfRange { function, .. }
      | SeriesRequest::Complex { function, .. } => function,
    }
  }
}

pub fn parse_kind(kind: &str) -> Result<SeriesKind, RequestError> {
  match kind {
    "trigonometric" | "trig" => Ok(SeriesKind::Trigonometric),
    "halfRangeCosine" | "half-range-cosine" => {
      Ok(SeriesKind::HalfRange(HalfRangeParity::Cosine))
    }
    "halfRangeSine" | "half-range-sine" => {
      Ok(SeriesKind::HalfRange(HalfRangeParity::Sine))
    }
    "complex" | "complexExponential" => Ok(SeriesKind::Complex),
    other => Err(RequestError::UnknownKind(other.to_string())),
  }
}

impl TryFrom<InboundRequest> for SeriesRequest {
  type Error = RequestError;

  fn try_from(request: InboundRequest) -> Result<Self, Self::Error> {
    let kind = parse_kind(&request.series_kind)?;
    let pieces = request
      .piecewise_function
      .into_iter()
      .map(|[expression, lower, upper]| Piece::new(expression, lower, upper))
      .collect();
    let function = PiecewiseFunction::new(pieces, request.int_var)?;
    SeriesRequest::new(function, kind, request.terms.unwrap_or(DEFAULT_TERMS))
  }
}

/// Everything a successful request produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesResult {
  pub validation: SeriesValidation,
  pub coefficients: Vec<CoefficientExpression>,
  pub singularities: BTreeMap<String, Vec<Singularity>>,
  pub rendered_forms: BTreeMap<String, String>,
  pub terms: Vec<ExpandedTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesOutcome {
  /// Validation failed; nothing past the validator ran.
  Invalid(SeriesValidation),
  Computed(SeriesResult),
}

/// Runs every stage for `ctx`, producing `terms` expanded terms.
pub async fn compute(
  ctx: &SeriesContext,
  terms: usize,
  engine: &dyn EngineGateway,
) -> Result<SeriesOutcome, SeriesError> {
  info!(
    "[{}] {} series of {} piece(s) in {}",
    ctx.request_id,
    ctx.kind,
    ctx.function.pieces().len(),
    ctx.int_var()
  );

  let validation = validate(ctx, engine).await?;
  if !validation.overall_valid {
    return Ok(SeriesOutcome::Invalid(validation));
  }

  let coefficients = synthesize(ctx, &validation, engine).await?;

  let (singularities, expanded) = {
    let resolver = Resolver::new(ctx, engine, &coefficients);
    let singularities: BTreeMap<String, Vec<Singularity>> = resolver
      .resolve_all()
      .await?
      .into_iter()
      .map(|(role, table)| (role.name().to_string(), table.entries().to_vec()))
      .collect();
    let expanded = expand(&resolver, terms).await?;
    (singularities, expanded)
  };

  let rules = RuleConfig::for_context(ctx);
  let rendered = try_join_all(
    coefficients
      .iter()
      .map(|c| typeset(engine, &rules, &c.expression_text)),
  )
  .await?;
  let rendered_forms = coefficients
    .iter()
    .map(|c| c.role.name().to_string())
    .zip(rendered)
    .collect();

  Ok(SeriesOutcome::Computed(SeriesResult {
    validation,
    coefficients,
    singularities,
    rendered_forms,
    terms: expanded,
  }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
  pub success: bool,
  pub request_id: String,
  pub coefficients: Vec<CoefficientExpression>,
  pub singularities: BTreeMap<String, Vec<Singularity>>,
  pub rendered_forms: BTreeMap<String, String>,
  pub terms: Vec<ExpandedTerm>,
  pub validation: SeriesValidation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
  pub success: bool,
  pub message: String,
  pub validation_details: Vec<ValidationOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SeriesResponse {
  Success(SuccessResponse),
  Failure(FailureResponse),
}

impl SeriesResponse {
  pub fn failure(message: impl Into<String>) -> Self {
    SeriesResponse::Failure(FailureResponse {
      success: false,
      message: message.into(),
      validation_details: Vec::new(),
    })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, SeriesResponse::Success(_))
  }
}

/// Runs a request end to end. Never fails: every problem becomes a
/// `success: false` response.
pub async fn run(
  request: SeriesRequest,
  config: &EngineConfig,
  engine: &dyn EngineGateway,
) -> SeriesResponse {
  let kind = request.kind();
  let terms = request.terms();
  let ctx = match SeriesContext::new(
    request.into_function(),
    kind,
    config.harmonic_index.as_str(),
  ) {
    Ok(ctx) => ctx,
    Err(e) => return SeriesResponse::failure(e.to_string()),
  };

  match compute(&ctx, terms, engine).await {
    Ok(SeriesOutcome::Computed(result)) => {
      info!("[{}] done", ctx.request_id);
      SeriesResponse::Success(SuccessResponse {
        success: true,
        request_id: ctx.request_id.to_string(),
        coefficients: result.coefficients,
        singularities: result.singularities,
        rendered_forms: result.rendered_forms,
        terms: result.terms,
        validation: result.validation,
      })
    }
    Ok(SeriesOutcome::Invalid(validation)) => {
      info!("[{}] rejected by validation", ctx.request_id);
      SeriesResponse::Failure(FailureResponse {
        success: false,
        message: validation.failure_message(),
        validation_details: validation.outcomes,
      })
    }
    Err(e) => {
      warn!("[{}] failed: {}", ctx.request_id, e);
      SeriesResponse::failure(e.to_string())
    }
  }
}
