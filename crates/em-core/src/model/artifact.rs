//! Unidad de datos que pasa de un step al siguiente.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload JSON etiquetado con el tipo que lo produjo.
///
/// El engine no interpreta `payload`; sólo le asigna `hash` (sobre el JSON
/// canónico) al guardar los outputs de un step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_type: String,
    pub hash: String,
    pub payload: Value,
}

impl Artifact {
    pub(crate) fn unhashed(artifact_type: &str, payload: Value) -> Self {
        Self { artifact_type: artifact_type.to_string(),
               hash: String::new(),
               payload }
    }
}
