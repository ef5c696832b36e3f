//! Artifacts tipados que fluyen entre los steps de los protocolos.
//!
//! Cada uno viaja como payload JSON etiquetado con su nombre de tipo; el hash lo
//! calcula el engine a partir del payload canónico.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use em_core::typed_artifact;

use crate::run::OutputObject;

// Ficheros de metadatos escritos en el directorio scratch, por tipo y en el
// orden de las entradas. `particle_hashes` (contenido de cada conjunto) entra
// en el hash del artifact y con él en los fingerprints de los steps siguientes.
typed_artifact!(MaterializedInputs {
    particle_files: Vec<PathBuf>,
    particle_hashes: Vec<String>,
    volume_files: Vec<PathBuf>,
});

// Comando final (placeholders sustituidos) y entorno exacto del proceso.
typed_artifact!(ResolvedCommand {
    command: String,
    env: BTreeMap<String, String>,
    cwd: PathBuf,
});

typed_artifact!(ExecutionRecord {
    exit_code: i32,
    stdout: String,
    stderr: String,
});

/// Una salida producida por un protocolo, pendiente de registrar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestedOutput {
    pub index: usize,
    pub name: String,
    pub file: Option<PathBuf>,
    pub object: OutputObject,
}

// Lista ordenada de salidas; el registro en el host es un paso explícito
// posterior a la ejecución del flujo.
typed_artifact!(HarvestReport { outputs: Vec<HarvestedOutput> });

typed_artifact!(DownloadedArchive {
    url: String,
    archive: PathBuf,
    bytes: u64,
});

typed_artifact!(FilterReport {
    input_size: usize,
    kept: usize,
    output: Option<HarvestedOutput>,
});

typed_artifact!(SelectedDataStar {
    path: PathBuf,
    particles: usize,
});
