//! Eventos que deja una ejecución de protocolo.
//!
//! El log es la única fuente de verdad del estado de un flujo: el engine lo
//! lee antes de cada step y el `FlowRepository` lo reproduce para saber en
//! qué step va, qué produjo cada uno y si algo falló.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreEngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Abre el log de un `flow_id`; fija la definición que se va a ejecutar.
    FlowInitialized { definition_hash: String, step_count: usize },
    StepStarted { step_index: usize, step_id: String },
    /// `outputs` son hashes de artifacts, no los artifacts.
    StepFinished {
        step_index: usize,
        step_id: String,
        outputs: Vec<String>,
        fingerprint: String,
    },
    /// Terminal: ningún step posterior llega a ejecutarse.
    StepFailed {
        step_index: usize,
        step_id: String,
        error: CoreEngineError,
        fingerprint: String,
    },
    /// Dato auxiliar de un step (ficheros materializados, código de salida
    /// del comando...). No cambia el estado reconstruido.
    StepSignal {
        step_index: usize,
        step_id: String,
        signal: String,
        data: serde_json::Value,
    },
    FlowCompleted { flow_fingerprint: String },
}

impl FlowEventKind {
    /// Nombre estable de la variante, para logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlowInitialized { .. } => "FlowInitialized",
            Self::StepStarted { .. } => "StepStarted",
            Self::StepFinished { .. } => "StepFinished",
            Self::StepFailed { .. } => "StepFailed",
            Self::StepSignal { .. } => "StepSignal",
            Self::FlowCompleted { .. } => "FlowCompleted",
        }
    }

    /// Código de una letra (`I S F X G C`), útil para comparar secuencias en tests.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FlowInitialized { .. } => "I",
            Self::StepStarted { .. } => "S",
            Self::StepFinished { .. } => "F",
            Self::StepFailed { .. } => "X",
            Self::StepSignal { .. } => "G",
            Self::FlowCompleted { .. } => "C",
        }
    }

    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::StepStarted { step_index, .. }
            | Self::StepFinished { step_index, .. }
            | Self::StepFailed { step_index, .. }
            | Self::StepSignal { step_index, .. } => Some(*step_index),
            Self::FlowInitialized { .. } | Self::FlowCompleted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    /// Posición dentro del flujo, contigua desde 0.
    pub seq: u64,
    pub flow_id: Uuid,
    pub kind: FlowEventKind,
    /// Sólo informativo; no participa en ningún fingerprint.
    pub ts: DateTime<Utc>,
}

impl FlowEvent {
    /// Construye el siguiente evento de un flujo que ya tiene `len` eventos.
    pub fn next(flow_id: Uuid, len: usize, kind: FlowEventKind) -> Self {
        Self { seq: len as u64,
               flow_id,
               kind,
               ts: Utc::now() }
    }
}
