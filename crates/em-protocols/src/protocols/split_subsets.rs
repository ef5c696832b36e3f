//! Reparte las partículas de un refinamiento 3D en N subconjuntos.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use em_convert::{ParticleCodec, RelionCodec};
use em_core::{EventStore, FlowEngine, InMemoryFlowRepository};

use crate::artifacts::HarvestReport;
use crate::protocols::{finish, register_outputs, run_to_report, ProtocolOutcome};
use crate::run::{OutputRegistry, Pointer, ProtocolRun, RelationKind};
use crate::steps::{LocateDataStarStep, SplitSubsetsStep};
use crate::ProtocolError;

pub const LABEL: &str = "split_subsets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSubsetsParams {
    pub number_of_subsets: usize,
    /// Asignar las partículas a los subconjuntos al azar.
    pub randomize: bool,
    /// Semilla del barajado; sin ella se usa el generador del hilo.
    pub seed: Option<u64>,
}

impl Default for SplitSubsetsParams {
    fn default() -> Self {
        Self { number_of_subsets: 2,
               randomize: false,
               seed: None }
    }
}

#[derive(Debug)]
pub struct SplitSubsetsContext {
    pub params: SplitSubsetsParams,
    /// Directorio `extra` del refinamiento de origen.
    pub input: Pointer<PathBuf>,
    pub run: ProtocolRun,
    pub particle_codec: Arc<dyn ParticleCodec>,
}

#[derive(Debug, Clone)]
pub struct SplitSubsetsProtocol {
    ctx: Arc<SplitSubsetsContext>,
}

impl SplitSubsetsProtocol {
    pub fn new(params: SplitSubsetsParams, input: Pointer<PathBuf>, run: ProtocolRun) -> Self {
        Self { ctx: Arc::new(SplitSubsetsContext { params,
                                                   input,
                                                   run,
                                                   particle_codec: Arc::new(RelionCodec::new()) }) }
    }

    pub fn methods(&self) -> String {
        format!("Particles were split into {} subsets.", self.ctx.params.number_of_subsets)
    }

    pub fn launch<E: EventStore>(&self, events: E, registry: &mut OutputRegistry) -> Result<ProtocolOutcome, ProtocolError> {
        if self.ctx.params.number_of_subsets == 0 {
            return Err(ProtocolError::InvalidParams("number of subsets must be at least 1".into()));
        }
        let mut engine = FlowEngine::builder(events, InMemoryFlowRepository::new())
            .first_step(LocateDataStarStep::new(self.ctx.clone()))
            .add_step(SplitSubsetsStep::new(self.ctx.clone()))
            .build();
        let report: HarvestReport = run_to_report(&mut engine)?;

        let sources = [self.ctx.input.id.clone()];
        let names = register_outputs(registry, report.outputs, &sources, RelationKind::Transform)?;
        registry.add_summary(self.methods());
        finish(LABEL, &self.ctx.run, registry, names, engine.flow_fingerprint())
    }
}
