use super::*;
use fourier_series::{
  compute, run, EngineConfig, SeriesOutcome, SeriesRequest, SeriesResponse,
};

const LIMIT: &str = "string([fs_probe, fs_lim]);";

/// Scenario: `x` on `[-L, L]`, an odd function with only sine terms.
fn ramp_engine() -> ScriptedEngine {
  ScriptedEngine::new()
    .all_valid()
    .answer(&[SYNTHESIS, "integrate((x), x"], "[0,2*L,%pi/L]")
    .answer(&[SYNTHESIS, "integrate(cos("], "[0,2*L,%pi/L]")
    .answer(
      &[SYNTHESIS, "integrate(sin("],
      "[-(2*(-1)^n*L)/(%pi*n),2*L,%pi/L]",
    )
    .answer(&[CANDIDATES], "[0]")
    .answer(&[LIMIT], "[[false,true],0]")
    .answer(&[TERM, "subst(n = 1,"], "2*L*sin(%pi*x/L)/%pi")
    .answer(&[TERM, "subst(n = 2,"], "-L*sin(2*%pi*x/L)/%pi")
}

/// Scenario: the +1/-1 square wave, cosine expansion.
fn square_wave_engine() -> ScriptedEngine {
  ScriptedEngine::new()
    .all_valid()
    .answer(&[SYNTHESIS, "integrate((1), x"], "[0,T,%pi/T]")
    .answer(
      &[SYNTHESIS, "integrate(cos("],
      "[4*sin(%pi*n/2)/(%pi*n),T,%pi/T]",
    )
    .answer(&[CANDIDATES], "[0]")
    .answer(&[LIMIT, "limit(fs_acc, n, 0)"], "[[true,true],2]")
    .answer(&[TERM, "subst(n = 1,"], "4*cos(%pi*x/T)/%pi")
    .answer(&[TERM, "subst(n = 2,"], "0")
}

fn request(pieces: &[(&str, &str, &str)], kind: SeriesKind) -> SeriesRequest {
  let pieces = pieces
    .iter()
    .map(|&(expr, lo, hi)| Piece::new(expr, lo, hi))
    .collect();
  let function = PiecewiseFunction::new(pieces, "x").unwrap();
  SeriesRequest::new(function, kind, 2).unwrap()
}

#[tokio::test]
async fn odd_ramp_has_only_sine_coefficients() {
  let engine = ramp_engine();
  let outcome = compute(&ramp(), 2, &engine).await.unwrap();
  let SeriesOutcome::Computed(result) = outcome else {
    panic!("expected a computed series");
  };

  let texts: Vec<&str> = result
    .coefficients
    .iter()
    .map(|c| c.expression_text.as_str())
    .collect();
  assert_eq!(texts, vec!["0", "0", "-(2*(-1)^n*L)/(%pi*n)"]);
  // the pole of bn at n = 0 is not 0/0
  assert!(result.singularities.values().all(|s| s.is_empty()));
  assert_eq!(result.singularities.len(), 3);

  let values: Vec<&str> =
    result.terms.iter().map(|t| t.value_text.as_str()).collect();
  assert_eq!(
    values,
    vec!["0", "2*L*sin(%pi*x/L)/%pi", "-L*sin(2*%pi*x/L)/%pi"]
  );
  assert_eq!(result.rendered_forms["a0"], "TEX[0]");
  assert_eq!(result.rendered_forms["bn"], "TEX[-(2*(-1)^n*L)/(%pi*n)]");
  // only bn is searched for singular indices
  assert_eq!(engine.calls_containing(CANDIDATES), 1);
}

#[tokio::test]
async fn square_wave_reports_the_removable_singularity() {
  let engine = square_wave_engine();
  let outcome = compute(&square_wave(), 1, &engine).await.unwrap();
  let SeriesOutcome::Computed(result) = outcome else {
    panic!("expected a computed series");
  };

  let an = &result.singularities["an"];
  assert_eq!(an.len(), 1);
  assert_eq!(an[0].harmonic_index, 0);
  assert_eq!(an[0].limit_expression_text, "2");
  assert!(result.singularities["a0"].is_empty());

  let indices: Vec<i64> =
    result.terms.iter().map(|t| t.harmonic_index).collect();
  assert_eq!(indices, vec![0, 1]);
  assert_eq!(result.terms[1].value_text, "4*cos(%pi*x/T)/%pi");
}

#[tokio::test]
async fn success_response_shape() {
  let engine = square_wave_engine();
  let response = run(
    request(
      &[("1", "0", "T/2"), ("-1", "T/2", "T")],
      SeriesKind::HalfRange(HalfRangeParity::Cosine),
    ),
    &EngineConfig::default(),
    &engine,
  )
  .await;
  assert!(response.is_success());

  let json = serde_json::to_value(&response).unwrap();
  assert_eq!(json["success"], true);
  assert_eq!(json["coefficients"][1]["role"], "an");
  assert_eq!(
    json["coefficients"][1]["expressionText"],
    "4*sin(%pi*n/2)/(%pi*n)"
  );
  assert_eq!(json["singularities"]["an"][0]["harmonicIndex"], 0);
  assert_eq!(json["singularities"]["an"][0]["limitExpressionText"], "2");
  assert_eq!(json["singularities"]["an"][0]["limitTypeset"], "TEX[2]");
  assert_eq!(json["renderedForms"]["an"], "TEX[4*sin(%pi*n/2)/(%pi*n)]");
  assert_eq!(json["terms"].as_array().unwrap().len(), 3);
  assert_eq!(json["validation"]["overallValid"], true);
  assert!(json["requestId"].as_str().is_some());
}

#[tokio::test]
async fn validation_failure_stops_before_synthesis() {
  let engine = ScriptedEngine::new()
    .answer(
      &["fs_unresolved", "sin(n*fs_w0*x)*(exp(-x^2))"],
      "['integrate(sin(n*x)*exp(-x^2),x,%pi,2*%pi),true,false]",
    )
    .all_valid();
  let response = run(
    request(
      &[("1", "0", "%pi"), ("exp(-x^2)", "%pi", "2*%pi")],
      SeriesKind::Trigonometric,
    ),
    &EngineConfig::default(),
    &engine,
  )
  .await;

  let SeriesResponse::Failure(failure) = response else {
    panic!("expected a failure response");
  };
  assert!(!failure.success);
  assert!(failure.message.contains("piece 1 (bn)"), "{}", failure.message);
  assert_eq!(failure.validation_details.len(), 6);
  assert_eq!(engine.calls_containing(SYNTHESIS), 0);
}

#[tokio::test]
async fn malformed_engine_output_becomes_a_failure_response() {
  let engine = ScriptedEngine::new()
    .all_valid()
    .answer(&[SYNTHESIS], "[sin(n*%pi,2*L,%pi/L]");
  let response = run(
    request(&[("x", "-L", "L")], SeriesKind::Trigonometric),
    &EngineConfig::default(),
    &engine,
  )
  .await;

  let json = serde_json::to_value(&response).unwrap();
  assert_eq!(json["success"], false);
  assert!(json["message"]
    .as_str()
    .unwrap()
    .starts_with("malformed engine output during synthesis"));
}

#[tokio::test]
async fn engine_diagnostic_becomes_a_failure_response() {
  let engine = ScriptedEngine::new().fail(
    &["fs_unresolved"],
    EngineError::Diagnostic {
      pattern: "is not of type",
      output: "integrate: 1 is not of type symbol".into(),
    },
  );
  let response = run(
    request(&[("x", "-L", "L")], SeriesKind::Trigonometric),
    &EngineConfig::default(),
    &engine,
  )
  .await;
  assert!(!response.is_success());
}

#[tokio::test]
async fn harmonic_index_collision_is_rejected_without_engine_calls() {
  let engine = ScriptedEngine::new();
  let config = EngineConfig {
    harmonic_index: "x".into(),
    ..EngineConfig::default()
  };
  let response = run(
    request(&[("x", "-L", "L")], SeriesKind::Trigonometric),
    &config,
    &engine,
  )
  .await;
  assert!(!response.is_success());
  assert!(engine.calls().is_empty());
}
