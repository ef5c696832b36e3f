//! Lado "host" de una ejecución: directorio de trabajo del protocolo,
//! punteros de entrada y registro de salidas con sus relaciones.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use em_core::CoreEngineError;
use em_domain::{EmSet, MicrographSet, ParticleSet, Volume, VolumeSet};

use crate::ProtocolError;

pub const OUTPUTS_FILE: &str = "outputs.json";

/// Directorio de una ejecución: `<proyecto>/Runs/<id>_<label>/{extra,tmp,logs}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRun {
    id: String,
    label: String,
    project_dir: PathBuf,
    run_dir: PathBuf,
}

impl ProtocolRun {
    pub fn create(project_dir: &Path, label: &str) -> Result<Self, ProtocolError> {
        fs::create_dir_all(project_dir).map_err(ProtocolError::io(project_dir))?;
        let project_dir = project_dir.canonicalize().map_err(ProtocolError::io(project_dir))?;
        let id: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        let label: String = label.chars()
                                 .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                                 .collect();
        let run_dir = project_dir.join("Runs").join(format!("{id}_{label}"));
        for sub in ["extra", "tmp", "logs"] {
            let dir = run_dir.join(sub);
            fs::create_dir_all(&dir).map_err(ProtocolError::io(&dir))?;
        }
        log::debug!("created run directory {}", run_dir.display());
        Ok(Self { id,
                  label,
                  project_dir,
                  run_dir })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raíz del proyecto (destino de `$WORKING_DIR`).
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Directorio scratch (destino de `$EXTRA_DIR`).
    pub fn extra_dir(&self) -> PathBuf {
        self.run_dir.join("extra")
    }

    pub fn extra_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.extra_dir().join(name)
    }

    pub fn tmp_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.run_dir.join("tmp").join(name)
    }

    pub fn logs_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.run_dir.join("logs").join(name)
    }

    /// Rutas relativas se interpretan desde la raíz del proyecto.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// Ruta relativa a la raíz del proyecto, si cuelga de ella.
    pub fn relative_to_project<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.project_dir).unwrap_or(path)
    }
}

/// Referencia a un objeto producido por otra ejecución.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pointer<T> {
    pub id: String,
    pub value: T,
}

impl<T> Pointer<T> {
    pub fn new(id: impl Into<String>, value: T) -> Self {
        Self { id: id.into(), value }
    }
}

/// Objeto registrado como salida, etiquetado por tipo de dato.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutputObject {
    Particles(ParticleSet),
    Micrographs(MicrographSet),
    Volumes(VolumeSet),
    Volume(Volume),
}

impl OutputObject {
    pub fn size(&self) -> usize {
        match self {
            OutputObject::Particles(s) => s.len(),
            OutputObject::Micrographs(s) => s.len(),
            OutputObject::Volumes(s) => s.len(),
            OutputObject::Volume(_) => 1,
        }
    }
}

impl From<EmSet> for OutputObject {
    fn from(set: EmSet) -> Self {
        match set {
            EmSet::Particles(s) => OutputObject::Particles(s),
            EmSet::Micrographs(s) => OutputObject::Micrographs(s),
            EmSet::Volumes(s) => OutputObject::Volumes(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// La salida se deriva de la entrada (comando externo).
    Source,
    /// La salida es la entrada transformada (filtros, subconjuntos).
    Transform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub input: String,
    pub output: String,
}

/// Salidas nombradas de una ejecución, en orden de registro.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputRegistry {
    outputs: IndexMap<String, OutputObject>,
    relations: Vec<Relation>,
    summary: Vec<String>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_output(&mut self, name: &str, object: OutputObject) -> Result<(), ProtocolError> {
        if self.outputs.contains_key(name) {
            return Err(CoreEngineError::Internal(format!("output '{name}' defined twice")).into());
        }
        log::info!("defined output {name} ({} items)", object.size());
        self.outputs.insert(name.to_string(), object);
        Ok(())
    }

    pub fn define_source_relation(&mut self, input: &str, output: &str) {
        self.relations.push(Relation { kind: RelationKind::Source,
                                       input: input.to_string(),
                                       output: output.to_string() });
    }

    pub fn define_transform_relation(&mut self, input: &str, output: &str) {
        self.relations.push(Relation { kind: RelationKind::Transform,
                                       input: input.to_string(),
                                       output: output.to_string() });
    }

    pub fn add_summary(&mut self, line: impl Into<String>) {
        self.summary.push(line.into());
    }

    pub fn output(&self, name: &str) -> Option<&OutputObject> {
        self.outputs.get(name)
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relations_to<'a>(&'a self, output: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.output == output)
    }

    pub fn summary(&self) -> &[String] {
        &self.summary
    }

    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CoreEngineError::Internal(e.to_string()))?;
        fs::write(path, json).map_err(ProtocolError::io(path))
    }

    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let text = fs::read_to_string(path).map_err(ProtocolError::io(path))?;
        Ok(serde_json::from_str(&text).map_err(|e| CoreEngineError::Internal(e.to_string()))?)
    }
}
