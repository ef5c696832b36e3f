//! `FlowEngine`: ejecuta una definición lineal step a step.
//!
//! Antes de cada step el estado se reconstruye desde el log (replay), así que
//! el engine no guarda más estado propio que los artifacts producidos.

use log::{debug, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::ENGINE_VERSION;
use crate::engine::EngineBuilderInit;
use crate::errors::CoreEngineError;
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::hashing::hash_value;
use crate::model::{Artifact, ExecutionContext};
use crate::repo::{FlowDefinition, FlowRepository, InMemoryFlowRepository};
use crate::step::{StepKind, StepRunResult, StepSignal};

#[derive(Debug)]
pub struct FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    event_store: E,
    repository: R,
    definition: FlowDefinition,
    flow_id: Uuid,
    /// Outputs producidos, indexados por hash.
    artifacts: HashMap<String, Artifact>,
}

impl FlowEngine<InMemoryEventStore, InMemoryFlowRepository> {
    /// Builder con log y repositorio en memoria.
    pub fn new() -> EngineBuilderInit<InMemoryEventStore, InMemoryFlowRepository> {
        Self::builder(InMemoryEventStore::default(), InMemoryFlowRepository::new())
    }
}

/// Todos los fingerprints incluyen la versión del engine.
fn fingerprint(mut fields: Value) -> String {
    if let Value::Object(map) = &mut fields {
        map.insert("engine_version".into(), Value::from(ENGINE_VERSION));
    }
    hash_value(&fields)
}

impl<E, R> FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    pub fn builder(event_store: E, repository: R) -> EngineBuilderInit<E, R> {
        EngineBuilderInit { event_store,
                            repository }
    }

    /// Engine con un `flow_id` nuevo para `definition`.
    pub fn with_definition(event_store: E, repository: R, definition: FlowDefinition) -> Self {
        Self { event_store,
               repository,
               definition,
               flow_id: Uuid::new_v4(),
               artifacts: HashMap::new() }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// Ejecuta los steps pendientes hasta completar el flujo o fallar.
    pub fn run(&mut self) -> Result<Uuid, CoreEngineError> {
        if self.definition
               .steps
               .first()
               .is_some_and(|s| s.kind() != StepKind::Source)
        {
            return Err(CoreEngineError::FirstStepMustBeSource);
        }
        loop {
            match self.step() {
                Ok(()) => {}
                Err(CoreEngineError::FlowCompleted) => return Ok(self.flow_id),
                Err(e) => return Err(e),
            }
        }
    }

    /// Ejecuta exactamente el siguiente step pendiente.
    pub fn step(&mut self) -> Result<(), CoreEngineError> {
        let flow_id = self.flow_id;
        let events = self.events_or_init();
        let instance = self.repository.load(flow_id, &events, &self.definition);

        if instance.failure().is_some() {
            return Err(CoreEngineError::FlowHasFailed);
        }
        if instance.completed || instance.cursor >= self.definition.len() {
            return Err(CoreEngineError::FlowCompleted);
        }

        let index = instance.cursor;
        let input = instance.previous_output().and_then(|h| self.artifacts.get(h).cloned());
        let step = self.definition.steps[index].as_ref();
        let step_id = step.id().to_string();
        let params = step.base_params();
        let ctx = ExecutionContext { input,
                                     params: params.clone() };

        debug!("flow {flow_id}: step {index} ({step_id}) started");
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepStarted { step_index: index,
                                                                  step_id: step_id.clone() });

        match step.run(&ctx) {
            StepRunResult::Success { outputs, signals } => {
                self.record_success(index, step_id, params, outputs, signals);
                Ok(())
            }
            StepRunResult::Failure { error } => {
                let fp = fingerprint(json!({
                    "definition_hash": step.definition_hash(),
                    "step_index": index,
                    "params": params,
                }));
                warn!("flow {flow_id}: step {index} ({step_id}) failed: {error}");
                self.event_store.append_kind(flow_id,
                                             FlowEventKind::StepFailed { step_index: index,
                                                                         step_id,
                                                                         error: error.clone(),
                                                                         fingerprint: fp });
                Err(error)
            }
        }
    }

    fn events_or_init(&mut self) -> Vec<FlowEvent> {
        let mut events = self.event_store.list(self.flow_id);
        if events.is_empty() {
            let init = FlowEventKind::FlowInitialized { definition_hash: self.definition.definition_hash.clone(),
                                                        step_count: self.definition.len() };
            events.push(self.event_store.append_kind(self.flow_id, init));
        }
        events
    }

    fn record_success(&mut self,
                      index: usize,
                      step_id: String,
                      params: Value,
                      outputs: Vec<Artifact>,
                      signals: Vec<StepSignal>) {
        let flow_id = self.flow_id;
        let mut hashes = Vec::with_capacity(outputs.len());
        for mut artifact in outputs {
            artifact.hash = hash_value(&artifact.payload);
            hashes.push(artifact.hash.clone());
            self.artifacts.insert(artifact.hash.clone(), artifact);
        }

        for s in signals {
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StepSignal { step_index: index,
                                                                     step_id: step_id.clone(),
                                                                     signal: s.signal,
                                                                     data: s.data });
        }

        let fp = fingerprint(json!({
            "definition_hash": self.definition.definition_hash,
            "step_index": index,
            "output_hashes": hashes,
            "params": params,
        }));
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepFinished { step_index: index,
                                                                   step_id,
                                                                   outputs: hashes,
                                                                   fingerprint: fp });
        debug!("flow {flow_id}: step {index} finished");

        if index + 1 == self.definition.len() {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let step_fps: Vec<String> = self.events()
                                        .into_iter()
                                        .filter_map(|e| match e.kind {
                                            FlowEventKind::StepFinished { fingerprint, .. } => Some(fingerprint),
                                            _ => None,
                                        })
                                        .collect();
        let flow_fp = fingerprint(json!({
            "definition_hash": self.definition.definition_hash,
            "step_fingerprints": step_fps,
        }));
        self.event_store
            .append_kind(self.flow_id, FlowEventKind::FlowCompleted { flow_fingerprint: flow_fp });
    }

    pub fn events(&self) -> Vec<FlowEvent> {
        self.event_store.list(self.flow_id)
    }

    /// Secuencia de códigos de evento (`I S F ... C`).
    pub fn event_codes(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.kind.code()).collect()
    }

    pub fn flow_fingerprint(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e.kind {
                                                   FlowEventKind::FlowCompleted { flow_fingerprint } => Some(flow_fingerprint),
                                                   _ => None,
                                               })
    }

    /// Primer output del último step terminado.
    pub fn last_output(&self) -> Option<Artifact> {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e.kind {
                FlowEventKind::StepFinished { outputs, .. } => outputs.into_iter().next(),
                _ => None,
            })
            .and_then(|h| self.artifacts.get(&h).cloned())
    }
}
