use serde_json::Value;

use crate::{errors::CoreEngineError, model::Artifact};

/// Dato auxiliar que un step deja en el log como `StepSignal`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSignal {
    pub signal: String,
    pub data: Value,
}

impl StepSignal {
    pub fn new(signal: impl Into<String>, data: Value) -> Self {
        Self { signal: signal.into(),
               data }
    }
}

/// Resultado neutro de `StepDefinition::run`. Las señales sólo se registran
/// si el step termina bien.
#[derive(Debug)]
pub enum StepRunResult {
    Success { outputs: Vec<Artifact>, signals: Vec<StepSignal> },
    Failure { error: CoreEngineError },
}
