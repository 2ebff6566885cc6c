//! Closed-form Fourier series coefficients for piecewise functions.
//!
//! The heavy lifting (integration, simplification, solving, limits) is done
//! by an external Maxima process reached through [`engine::EngineGateway`].
//! This crate owns the orchestration around it: validating each piece,
//! synthesizing one coefficient per role, finding the harmonic indices where
//! those coefficients are indeterminate and expanding individual terms.

use thiserror::Error;

pub mod config;
pub mod engine;
pub mod expand;
pub mod parse;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod series;
pub mod singularity;
pub mod synthesize;
pub mod validate;

pub use config::EngineConfig;
pub use engine::{EngineError, EngineGateway, MaximaEngine};
pub use parse::parse_list;
pub use pipeline::{
  compute, run, InboundRequest, SeriesOutcome, SeriesRequest, SeriesResponse,
};
pub use series::{
  HalfRangeParity, Piece, PiecewiseFunction, Role, SeriesContext, SeriesKind,
};

/// Rejections raised at the inbound boundary, before the engine is involved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
  #[error("the piecewise function has no pieces")]
  NoPieces,
  #[error("piece {piece}: {field} is empty")]
  EmptyField { piece: usize, field: &'static str },
  #[error("integration variable `{0}` is not a plain symbol")]
  InvalidVariable(String),
  #[error(
    "integration variable `{0}` collides with the harmonic index symbol"
  )]
  VariableIsHarmonicIndex(String),
  #[error("unknown series kind `{0}`")]
  UnknownKind(String),
  #[error("the number of requested terms must be at least 1")]
  NoTerms,
}

#[derive(Error, Debug)]
pub enum SeriesError {
  #[error(transparent)]
  Engine(#[from] EngineError),
  #[error(transparent)]
  Request(#[from] RequestError),
  #[error("malformed engine output during {stage}: {output}")]
  MalformedOutput { stage: &'static str, output: String },
  #[error("coefficients requested for a series that failed validation")]
  NotValidated,
  #[error("no coefficient was synthesized for {0}")]
  MissingCoefficient(Role),
  #[error("term {index} did not resolve to a finite value: {value}")]
  UnresolvedTerm { index: i64, value: String },
}
