use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Micrograph {
    pub id: u64,
    pub file: PathBuf,
    pub name: Option<String>,
}

impl Micrograph {
    pub fn new(id: u64, file: impl Into<PathBuf>) -> Self {
        Self { id,
               file: file.into(),
               name: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrographSet {
    id: Uuid,
    sampling_rate: Option<f64>,
    micrographs: Vec<Micrograph>,
}

impl MicrographSet {
    pub fn new(sampling_rate: Option<f64>) -> Self {
        Self { id: Uuid::new_v4(),
               sampling_rate,
               micrographs: Vec::new() }
    }

    pub fn empty_copy(&self) -> Self {
        Self::new(self.sampling_rate)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sampling_rate(&self) -> Option<f64> {
        self.sampling_rate
    }

    pub fn push(&mut self, micrograph: Micrograph) {
        self.micrographs.push(micrograph);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Micrograph> {
        self.micrographs.iter()
    }

    pub fn len(&self) -> usize {
        self.micrographs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.micrographs.is_empty()
    }
}
