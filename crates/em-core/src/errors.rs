//! Errores específicos del core.
//!
//! `CoreEngineError` se guarda dentro de los eventos (`StepFailed`), por eso
//! es `Clone + Serialize`. Los errores ricos de cada protocolo se reducen a
//! `StepFailed { class, message }` al cruzar la frontera del engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clasificación estable de fallos de un step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Parámetros inválidos o plantilla de comando inconsistente.
    Configuration,
    /// El proceso externo terminó con estado distinto de cero.
    Execution,
    /// El proceso terminó bien pero no dejó ningún output declarado.
    OutputContract,
    /// Fallo HTTP / transporte al descargar datos.
    Download,
    /// Lectura/escritura de formatos científicos (STAR, MRC).
    Conversion,
    Io,
    Internal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Execution => "execution",
            ErrorClass::OutputContract => "output-contract",
            ErrorClass::Download => "download",
            ErrorClass::Conversion => "conversion",
            ErrorClass::Io => "io",
            ErrorClass::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("flow already completed")] FlowCompleted,
    #[error("missing required inputs")] MissingInputs,
    #[error("first step must be source kind")] FirstStepMustBeSource,
    #[error("flow has failed previously (stop-on-failure invariant)")] FlowHasFailed,
    #[error("artifact: {0}")] Artifact(String),
    #[error("{class} error: {message}")] StepFailed { class: ErrorClass, message: String },
    #[error("internal: {0}")] Internal(String),
}

impl CoreEngineError {
    /// Clase del error; los errores propios del engine son `Internal`.
    pub fn class(&self) -> ErrorClass {
        match self {
            CoreEngineError::StepFailed { class, .. } => *class,
            _ => ErrorClass::Internal,
        }
    }
}
