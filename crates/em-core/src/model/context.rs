use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Artifact;

/// Lo que recibe `StepDefinition::run`: el output del step anterior y los
/// parámetros con los que se calculó el fingerprint.
#[derive(Debug)]
pub struct ExecutionContext {
    pub input: Option<Artifact>,
    pub params: Value,
}

impl ExecutionContext {
    pub fn params_as<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}
