//! Envoltorio de comando externo genérico:
//! materializar entradas → resolver entorno/comando → ejecutar → recoger salidas.
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use em_convert::{ParticleCodec, RelionCodec, VolumeCodec};
use em_core::{EventStore, FlowEngine, InMemoryFlowRepository};
use em_domain::{ParticleSet, Volume};

use crate::artifacts::HarvestReport;
use crate::protocols::{finish, register_outputs, run_to_report, ProtocolOutcome};
use crate::run::{OutputRegistry, Pointer, ProtocolRun, RelationKind};
use crate::steps::{ExecuteCommandStep, HarvestOutputsStep, MaterializeInputsStep, ResolveCommandStep};
use crate::{HostSettings, ProtocolError};

pub const LABEL: &str = "generic_cmd";

/// Parámetros del formulario. Los valores por defecto son los del formulario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericCmdParams {
    /// Plantilla con `$EXTRA_DIR`, `$WORKING_DIR` y los ficheros de entrada.
    pub command: String,
    /// Texto libre `A=1 B=dos palabras`.
    pub env_vars: String,
    /// Añadir las variables al entorno actual (true) o usar sólo las declaradas.
    pub inherit_env: bool,
    pub conda_env: Option<String>,
    pub use_particles: bool,
    pub use_volumes: bool,
    pub output_particles_pattern: String,
    pub output_volumes_pattern: String,
    /// Etiquetas STAR extra (separadas por espacios, sin `_` inicial).
    pub extra_labels: String,
}

impl Default for GenericCmdParams {
    fn default() -> Self {
        Self { command: String::new(),
               env_vars: String::new(),
               inherit_env: true,
               conda_env: None,
               use_particles: true,
               use_volumes: false,
               output_particles_pattern: "outputParticles*.star".to_string(),
               // los volúmenes se recogen como ficheros MRC, no como STAR
               output_volumes_pattern: "outputVolume*.mrc".to_string(),
               extra_labels: String::new() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenericCmdInputs {
    pub particles: Vec<Pointer<ParticleSet>>,
    pub volumes: Vec<Pointer<Volume>>,
}

impl GenericCmdInputs {
    /// Ids de las entradas de los tipos habilitados, origen de cada salida.
    pub fn enabled_sources(&self, params: &GenericCmdParams) -> Vec<String> {
        let mut ids = Vec::new();
        if params.use_particles {
            ids.extend(self.particles.iter().map(|p| p.id.clone()));
        }
        if params.use_volumes {
            ids.extend(self.volumes.iter().map(|p| p.id.clone()));
        }
        ids
    }
}

#[derive(Debug)]
pub struct GenericCmdContext {
    pub params: GenericCmdParams,
    pub inputs: GenericCmdInputs,
    pub run: ProtocolRun,
    pub settings: HostSettings,
    pub particle_codec: Arc<dyn ParticleCodec>,
    pub volume_codec: Arc<dyn VolumeCodec>,
}

#[derive(Debug, Clone)]
pub struct GenericCmdProtocol {
    ctx: Arc<GenericCmdContext>,
}

impl GenericCmdProtocol {
    pub fn new(params: GenericCmdParams, inputs: GenericCmdInputs, run: ProtocolRun, settings: HostSettings) -> Self {
        let codec = Arc::new(RelionCodec::new());
        Self::with_codecs(params, inputs, run, settings, codec.clone(), codec)
    }

    pub fn with_codecs(params: GenericCmdParams,
                       inputs: GenericCmdInputs,
                       run: ProtocolRun,
                       settings: HostSettings,
                       particle_codec: Arc<dyn ParticleCodec>,
                       volume_codec: Arc<dyn VolumeCodec>)
                       -> Self {
        Self { ctx: Arc::new(GenericCmdContext { params,
                                                 inputs,
                                                 run,
                                                 settings,
                                                 particle_codec,
                                                 volume_codec }) }
    }

    pub fn context(&self) -> &GenericCmdContext {
        &self.ctx
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.ctx.params.command.trim().is_empty() {
            return Err(ProtocolError::InvalidParams("command is required".into()));
        }
        Ok(())
    }

    /// Texto de resumen/métodos una vez terminado.
    pub fn summary(&self) -> String {
        format!("You have run the command '{}'\n Env vars: {}",
                self.ctx.params.command, self.ctx.params.env_vars)
    }

    pub fn launch<E: EventStore>(&self, events: E, registry: &mut OutputRegistry) -> Result<ProtocolOutcome, ProtocolError> {
        self.validate()?;
        let mut engine = FlowEngine::builder(events, InMemoryFlowRepository::new())
            .first_step(MaterializeInputsStep::new(self.ctx.clone()))
            .add_step(ResolveCommandStep::new(self.ctx.clone()))
            .add_step(ExecuteCommandStep::new(self.ctx.clone()))
            .add_step(HarvestOutputsStep::new(self.ctx.clone()))
            .build();
        let report: HarvestReport = run_to_report(&mut engine)?;

        let sources = self.ctx.inputs.enabled_sources(&self.ctx.params);
        let names = register_outputs(registry, report.outputs, &sources, RelationKind::Source)?;
        registry.add_summary(self.summary());
        finish(LABEL, &self.ctx.run, registry, names, engine.flow_fingerprint())
    }
}
