//! Protocolos: parámetros de formulario, contexto compartido por sus steps y
//! el driver que construye el flujo, lo ejecuta y registra las salidas.
pub mod download_emdb;
pub mod generic_cmd;
pub mod remove_unlinked;
pub mod split_subsets;

use serde::Serialize;
use std::path::PathBuf;

use em_core::{ArtifactSpec, EventStore, FlowEngine, FlowRepository};

use crate::artifacts::HarvestedOutput;
use crate::run::{OutputRegistry, ProtocolRun, RelationKind, OUTPUTS_FILE};
use crate::ProtocolError;

/// Resultado de lanzar un protocolo, tal como lo muestra la CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolOutcome {
    pub protocol: String,
    pub run_dir: PathBuf,
    pub outputs: Vec<String>,
    pub summary: Vec<String>,
    pub flow_fingerprint: Option<String>,
}

/// Ejecuta el flujo completo y decodifica el artifact del último step.
pub(crate) fn run_to_report<T, E, R>(engine: &mut FlowEngine<E, R>) -> Result<T, ProtocolError>
    where T: ArtifactSpec,
          E: EventStore,
          R: FlowRepository
{
    let flow_id = engine.run()?;
    log::debug!("flow {flow_id} completed");
    let artifact = engine.last_output()
                         .ok_or_else(|| em_core::CoreEngineError::Internal("flow finished without output".into()))?;
    T::from_artifact(&artifact).map_err(|e| em_core::CoreEngineError::Artifact(e.to_string()).into())
}

/// Registra cada salida y la relaciona con todas las entradas `sources`.
pub(crate) fn register_outputs(registry: &mut OutputRegistry,
                               outputs: Vec<HarvestedOutput>,
                               sources: &[String],
                               relation: RelationKind)
                               -> Result<Vec<String>, ProtocolError> {
    let mut names = Vec::with_capacity(outputs.len());
    for output in outputs {
        registry.define_output(&output.name, output.object)?;
        for source in sources {
            match relation {
                RelationKind::Source => registry.define_source_relation(source, &output.name),
                RelationKind::Transform => registry.define_transform_relation(source, &output.name),
            }
        }
        names.push(output.name);
    }
    Ok(names)
}

/// Persiste el registro en `<run>/outputs.json` y compone el resultado.
pub(crate) fn finish(protocol: &str,
                     run: &ProtocolRun,
                     registry: &OutputRegistry,
                     outputs: Vec<String>,
                     flow_fingerprint: Option<String>)
                     -> Result<ProtocolOutcome, ProtocolError> {
    registry.save(&run.run_dir().join(OUTPUTS_FILE))?;
    Ok(ProtocolOutcome { protocol: protocol.to_string(),
                         run_dir: run.run_dir().to_path_buf(),
                         outputs,
                         summary: registry.summary().to_vec(),
                         flow_fingerprint })
}
