//! Elimina de un conjunto los elementos cuyo fichero binario no existe.
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use em_core::{EventStore, FlowEngine, InMemoryFlowRepository};
use em_domain::EmSet;

use crate::artifacts::FilterReport;
use crate::protocols::{finish, register_outputs, run_to_report, ProtocolOutcome};
use crate::run::{OutputRegistry, Pointer, ProtocolRun, RelationKind};
use crate::steps::FilterLinkedStep;
use crate::ProtocolError;

pub const LABEL: &str = "remove_unlinked";
pub const EMPTY_RESULT_SUMMARY: &str = "Output was not generated. Resulting set was EMPTY!!!";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveUnlinkedParams {}

#[derive(Debug)]
pub struct RemoveUnlinkedContext {
    pub input: Pointer<EmSet>,
    pub run: ProtocolRun,
}

#[derive(Debug, Clone)]
pub struct RemoveUnlinkedProtocol {
    ctx: Arc<RemoveUnlinkedContext>,
}

impl RemoveUnlinkedProtocol {
    pub fn new(input: Pointer<EmSet>, run: ProtocolRun) -> Self {
        Self { ctx: Arc::new(RemoveUnlinkedContext { input, run }) }
    }

    pub fn launch<E: EventStore>(&self, events: E, registry: &mut OutputRegistry) -> Result<ProtocolOutcome, ProtocolError> {
        let mut engine = FlowEngine::builder(events, InMemoryFlowRepository::new())
            .first_step(FilterLinkedStep::new(self.ctx.clone()))
            .build();
        let report: FilterReport = run_to_report(&mut engine)?;

        let names = match report.output {
            Some(output) => {
                let sources = [self.ctx.input.id.clone()];
                register_outputs(registry, vec![output], &sources, RelationKind::Transform)?
            }
            None => {
                log::warn!("no item of {} has its binary file", self.ctx.input.id);
                registry.add_summary(EMPTY_RESULT_SUMMARY);
                Vec::new()
            }
        };
        finish(LABEL, &self.ctx.run, registry, names, engine.flow_fingerprint())
    }
}
