use serde_json::Value;

use super::run_result::StepRunResult;
use crate::model::ExecutionContext;

/// Papel del step en la cadena: sólo el primero puede ser `Source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Source,
    Transform,
    Sink,
}

/// Step tal como lo ve el engine (sin tipos). Lo normal es implementar
/// `TypedStep` y obtener esta interfaz por el impl genérico.
pub trait StepDefinition: std::fmt::Debug {
    /// Único dentro de la definición; entra al hash de la definición.
    fn id(&self) -> &str;

    fn kind(&self) -> StepKind;

    /// Parámetros efectivos; forman parte del fingerprint.
    fn base_params(&self) -> Value;

    fn run(&self, ctx: &ExecutionContext) -> StepRunResult;

    fn definition_hash(&self) -> String {
        crate::hashing::hash_value(&serde_json::json!({
            "id": self.id(),
            "kind": format!("{:?}", self.kind()),
            "base_params": self.base_params(),
        }))
    }
}
