use super::*;
use fourier_series::series::Role;
use fourier_series::synthesize::{synthesis_script, synthesize};
use fourier_series::validate::{validate, SeriesValidation, ValidationOutcome};
use fourier_series::SeriesError;

fn ramp_engine() -> ScriptedEngine {
  ScriptedEngine::new()
    .all_valid()
    .answer(&[SYNTHESIS, "integrate((x), x"], "[0,2*L,%pi/L]")
    .answer(&[SYNTHESIS, "integrate(cos("], "[0,2*L,%pi/L]")
    .answer(
      &[SYNTHESIS, "integrate(sin("],
      "[-(2*(-1)^n*L)/(%pi*n),2*L,%pi/L]",
    )
}

#[tokio::test]
async fn one_coefficient_per_role_in_role_order() {
  let engine = ramp_engine();
  let ctx = ramp();
  let validation = validate(&ctx, &engine).await.unwrap();
  let coefficients = synthesize(&ctx, &validation, &engine).await.unwrap();

  let summary: Vec<(Role, &str)> = coefficients
    .iter()
    .map(|c| (c.role, c.expression_text.as_str()))
    .collect();
  assert_eq!(
    summary,
    vec![
      (Role::A0, "0"),
      (Role::An, "0"),
      (Role::Bn, "-(2*(-1)^n*L)/(%pi*n)"),
    ]
  );
  for c in &coefficients {
    assert_eq!(c.period_text, "2*L");
    assert_eq!(c.w0_text, "%pi/L");
  }
  assert_eq!(engine.calls_containing(SYNTHESIS), 3);
}

#[tokio::test]
async fn synthesis_is_deterministic() {
  let ctx = ramp();
  assert_eq!(
    synthesis_script(&ctx, Role::Bn),
    synthesis_script(&ctx, Role::Bn)
  );

  let engine = ramp_engine();
  let validation = validate(&ctx, &engine).await.unwrap();
  let first = synthesize(&ctx, &validation, &engine).await.unwrap();
  let second = synthesize(&ctx, &validation, &engine).await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn refuses_to_run_after_failed_validation() {
  let engine = ramp_engine();
  let validation = SeriesValidation::from_outcomes(vec![ValidationOutcome {
    piece: 0,
    role: Role::Bn,
    is_integrable: false,
    has_special_functions: false,
    result_text: String::new(),
  }]);
  let err = synthesize(&ramp(), &validation, &engine).await.unwrap_err();
  assert!(matches!(err, SeriesError::NotValidated), "{err:?}");
  assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn any_role_failure_aborts_synthesis() {
  let engine = ScriptedEngine::new()
    .all_valid()
    .fail(
      &[SYNTHESIS, "integrate(sin("],
      EngineError::Diagnostic {
        pattern: "division by zero",
        output: "Division by zero".into(),
      },
    )
    .answer(&[SYNTHESIS], "[0,2*L,%pi/L]");
  let ctx = ramp();
  let validation = validate(&ctx, &engine).await.unwrap();
  let err = synthesize(&ctx, &validation, &engine).await.unwrap_err();
  assert!(
    matches!(err, SeriesError::Engine(EngineError::Diagnostic { .. })),
    "{err:?}"
  );
}

#[tokio::test]
async fn unbalanced_output_is_reported_not_thrown() {
  let engine = ScriptedEngine::new()
    .all_valid()
    .answer(&[SYNTHESIS], "[sin(n*%pi,2*L,%pi/L]");
  let ctx = ramp();
  let validation = validate(&ctx, &engine).await.unwrap();
  let err = synthesize(&ctx, &validation, &engine).await.unwrap_err();
  assert!(
    matches!(
      err,
      SeriesError::MalformedOutput {
        stage: "synthesis",
        ..
      }
    ),
    "{err:?}"
  );
}

#[test]
fn multi_piece_fold_accumulates_every_piece() {
  let text = synthesis_script(&square_wave(), Role::An)
    .as_str()
    .to_string();
  let integrals = text.matches("*integrate(").count();
  assert_eq!(integrals, 2);
  assert_eq!(text.matches("fs_acc: ratsimp(fs_acc)$").count(), 2);
}
