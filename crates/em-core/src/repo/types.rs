//! Replay del log: de la lista de eventos al estado de cada step.
//!
//! El repositorio no guarda nada por su cuenta; recorre los eventos en orden
//! y deja en cada `StepSlot` el último estado observado. Los outputs se
//! guardan como hashes; los artifacts viven en el engine.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::CoreEngineError;
use crate::event::{FlowEvent, FlowEventKind};
use crate::hashing::hash_value;
use crate::step::{StepDefinition, StepStatus};

#[derive(Debug)]
pub struct FlowInstance {
    pub id: Uuid,
    pub steps: Vec<StepSlot>,
    /// Índice del primer step sin ejecutar (== `steps.len()` si no queda ninguno).
    pub cursor: usize,
    pub completed: bool,
}

impl FlowInstance {
    pub fn failure(&self) -> Option<&CoreEngineError> {
        self.steps.iter().find_map(|s| s.error.as_ref())
    }

    /// Hash del primer output del step anterior a `cursor`.
    pub fn previous_output(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.steps.get(i))
            .and_then(|s| s.outputs.first())
            .map(String::as_str)
    }
}

#[derive(Debug)]
pub struct StepSlot {
    pub step_id: String,
    pub status: StepStatus,
    pub fingerprint: Option<String>,
    pub outputs: Vec<String>,
    pub error: Option<CoreEngineError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepSlot {
    fn pending(step_id: &str) -> Self {
        Self { step_id: step_id.to_string(),
               status: StepStatus::Pending,
               fingerprint: None,
               outputs: Vec::new(),
               error: None,
               started_at: None,
               finished_at: None }
    }

    fn apply(&mut self, kind: &FlowEventKind, ts: DateTime<Utc>) {
        match kind {
            FlowEventKind::StepStarted { .. } => {
                self.status = StepStatus::Running;
                self.started_at = Some(ts);
            }
            FlowEventKind::StepFinished { outputs, fingerprint, .. } => {
                self.status = StepStatus::FinishedOk;
                self.outputs = outputs.clone();
                self.fingerprint = Some(fingerprint.clone());
                self.finished_at = Some(ts);
            }
            FlowEventKind::StepFailed { error, fingerprint, .. } => {
                self.status = StepStatus::Failed;
                self.error = Some(error.clone());
                self.fingerprint = Some(fingerprint.clone());
                self.finished_at = Some(ts);
            }
            _ => {}
        }
    }
}

pub trait FlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance;
}

/// Lista ordenada de steps más el hash que identifica la secuencia.
#[derive(Debug)]
pub struct FlowDefinition {
    pub steps: Vec<Box<dyn StepDefinition>>,
    pub definition_hash: String,
}

impl FlowDefinition {
    /// El hash se calcula sobre los ids de los steps, en orden.
    pub fn from_steps(steps: Vec<Box<dyn StepDefinition>>) -> Self {
        let ids: Vec<&str> = steps.iter().map(|s| s.id()).collect();
        let definition_hash = hash_value(&serde_json::json!(ids));
        Self { steps, definition_hash }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFlowRepository;

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self
    }
}

impl FlowRepository for InMemoryFlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance {
        let mut steps: Vec<StepSlot> = definition.steps.iter().map(|s| StepSlot::pending(s.id())).collect();
        let mut completed = false;
        for ev in events {
            if matches!(ev.kind, FlowEventKind::FlowCompleted { .. }) {
                completed = true;
            } else if let Some(slot) = ev.kind.step_index().and_then(|i| steps.get_mut(i)) {
                slot.apply(&ev.kind, ev.ts);
            }
        }
        let cursor = steps.iter()
                          .position(|s| s.status == StepStatus::Pending)
                          .unwrap_or(steps.len());
        FlowInstance { id: flow_id,
                       steps,
                       cursor,
                       completed }
    }
}
