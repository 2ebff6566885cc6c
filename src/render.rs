//! Rendering Gateway: one engine call per expression, TeX out.

use crate::engine::{evaluate_value, EngineError, EngineGateway};
use crate::script::{RuleConfig, Script, ScriptBuilder};

pub fn typeset_script(rules: &RuleConfig, expression: &str) -> Script {
  ScriptBuilder::new(rules).typeset(expression)
}

pub async fn typeset(
  engine: &dyn EngineGateway,
  rules: &RuleConfig,
  expression: &str,
) -> Result<String, EngineError> {
  evaluate_value(engine, &typeset_script(rules, expression)).await
}
