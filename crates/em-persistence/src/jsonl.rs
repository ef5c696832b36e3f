//! Event store sobre un archivo JSON Lines.
//!
//! - Una línea por `FlowEvent`, en orden de append.
//! - `seq` es contiguo por `flow_id` (empieza en 0), igual que el store en
//!   memoria del core, para que el replay sea idéntico.
//! - El trait `EventStore` es infalible: un fallo de escritura se registra
//!   con `log::error!` y el evento queda sólo en memoria.
use log::{debug, error};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use em_core::{EventStore, FlowEvent, FlowEventKind};

use crate::PersistenceError;

/// Nombre del log dentro de `logs/` de cada ejecución.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Lee todos los eventos de un archivo JSONL; líneas vacías se ignoran.
pub fn read_events(path: &Path) -> Result<Vec<FlowEvent>, PersistenceError> {
    let file = File::open(path).map_err(PersistenceError::io(path))?;
    let mut events = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(PersistenceError::io(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let ev = serde_json::from_str(&line).map_err(|source| PersistenceError::Malformed { path: path.to_path_buf(),
                                                                                            line: i + 1,
                                                                                            source })?;
        events.push(ev);
    }
    Ok(events)
}

#[derive(Debug)]
pub struct JsonlEventStore {
    path: PathBuf,
    inner: HashMap<Uuid, Vec<FlowEvent>>,
    write_failures: usize,
}

impl JsonlEventStore {
    /// Abre (o crea) el log en `path`, cargando los eventos ya escritos.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(PersistenceError::io(parent))?;
        }
        let mut inner: HashMap<Uuid, Vec<FlowEvent>> = HashMap::new();
        if path.exists() {
            for ev in read_events(&path)? {
                inner.entry(ev.flow_id).or_default().push(ev);
            }
        }
        debug!("event log {} opened ({} flows)", path.display(), inner.len());
        Ok(Self { path,
                  inner,
                  write_failures: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flujos presentes en el log, sin orden definido.
    pub fn flow_ids(&self) -> Vec<Uuid> {
        self.inner.keys().copied().collect()
    }

    /// Eventos que no pudieron escribirse al archivo.
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    fn persist(&self, ev: &FlowEvent) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(ev)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true)
                                         .append(true)
                                         .open(&self.path)
                                         .map_err(PersistenceError::io(&self.path))?;
        file.write_all(line.as_bytes()).map_err(PersistenceError::io(&self.path))?;
        file.flush().map_err(PersistenceError::io(&self.path))
    }
}

impl EventStore for JsonlEventStore {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        let ev = FlowEvent::next(flow_id, self.inner.get(&flow_id).map_or(0, Vec::len), kind);
        match self.persist(&ev) {
            Ok(()) => debug!("append flow_id={flow_id} seq={} kind={}", ev.seq, ev.kind.name()),
            Err(e) => {
                self.write_failures += 1;
                error!("could not append {} seq={} flow_id={flow_id}: {e}", ev.kind.name(), ev.seq);
            }
        }
        self.inner.entry(flow_id).or_default().push(ev.clone());
        ev
    }

    fn list(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.inner.get(&flow_id).cloned().unwrap_or_default()
    }
}
