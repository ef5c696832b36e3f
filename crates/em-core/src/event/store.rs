use std::collections::HashMap;
use uuid::Uuid;

use super::{FlowEvent, FlowEventKind};

/// Log append-only de eventos, agrupado por flujo.
pub trait EventStore {
    /// Asigna `seq` y `ts`, guarda el evento y lo devuelve.
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent;
    /// Eventos del flujo en orden de `seq`; vacío si no existe.
    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent>;
}

/// Store volátil; los tests y los flujos que no necesitan auditoría.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    flows: HashMap<Uuid, Vec<FlowEvent>>,
}

impl InMemoryEventStore {
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        let log = self.flows.entry(flow_id).or_default();
        let ev = FlowEvent::next(flow_id, log.len(), kind);
        log.push(ev.clone());
        ev
    }

    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.flows.get(&flow_id).cloned().unwrap_or_default()
    }
}
