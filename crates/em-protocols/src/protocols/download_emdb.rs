//! Descarga de un mapa EMDB por id numérico como `outputVolume`.
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use em_core::{ErrorClass, EventStore, FlowEngine, InMemoryFlowRepository};

use crate::artifacts::HarvestReport;
use crate::protocols::{finish, register_outputs, run_to_report, ProtocolOutcome};
use crate::run::{OutputRegistry, ProtocolRun, RelationKind};
use crate::steps::download::{HttpMapFetcher, MapFetcher};
use crate::steps::{ExtractMapStep, FetchMapStep};
use crate::{HostSettings, ProtocolError};

pub const LABEL: &str = "download_emdb";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadEmdbParams {
    /// Sólo el número, p. ej. `1234`.
    pub emdb_id: String,
}

impl DownloadEmdbParams {
    pub fn validated_id(&self) -> Result<&str, ProtocolError> {
        let id = self.emdb_id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProtocolError::InvalidParams(format!("EMDB id must be numeric, got '{}'", self.emdb_id)));
        }
        Ok(id)
    }
}

#[derive(Debug)]
pub struct DownloadEmdbContext {
    pub params: DownloadEmdbParams,
    pub run: ProtocolRun,
    pub settings: HostSettings,
    pub fetcher: Arc<dyn MapFetcher>,
}

#[derive(Debug, Clone)]
pub struct DownloadEmdbProtocol {
    ctx: Arc<DownloadEmdbContext>,
}

impl DownloadEmdbProtocol {
    pub fn new(params: DownloadEmdbParams, run: ProtocolRun, settings: HostSettings) -> Self {
        Self::with_fetcher(params, run, settings, Arc::new(HttpMapFetcher::new()))
    }

    pub fn with_fetcher(params: DownloadEmdbParams,
                        run: ProtocolRun,
                        settings: HostSettings,
                        fetcher: Arc<dyn MapFetcher>)
                        -> Self {
        Self { ctx: Arc::new(DownloadEmdbContext { params,
                                                   run,
                                                   settings,
                                                   fetcher }) }
    }

    pub fn launch<E: EventStore>(&self, events: E, registry: &mut OutputRegistry) -> Result<ProtocolOutcome, ProtocolError> {
        let id = self.ctx.params.validated_id()?;
        let mut engine = FlowEngine::builder(events, InMemoryFlowRepository::new())
            .first_step(FetchMapStep::new(self.ctx.clone()))
            .add_step(ExtractMapStep::new(self.ctx.clone()))
            .build();
        let report: HarvestReport = run_to_report(&mut engine).inspect_err(|e| {
                                                                   if e.class() == ErrorClass::Download {
                                                                       log::error!("Failed to download EMDB map with ID {id}");
                                                                   }
                                                               })?;
        let names = register_outputs(registry, report.outputs, &[], RelationKind::Source)?;
        registry.add_summary(format!("EMDB map EMD-{id} downloaded"));
        finish(LABEL, &self.ctx.run, registry, names, engine.flow_fingerprint())
    }
}
