//! Configuración del host.
//! Carga variables de entorno (.env) una sola vez y expone `AppConfig`, de la
//! que se derivan los `HostSettings` que reciben los protocolos.
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

use em_protocols::settings::{DEFAULT_EMDB_URL_TEMPLATE, DEFAULT_SHELL};
use em_protocols::{HostSettings, OutputRelay};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Raíz del proyecto; las ejecuciones se crean en `<proyecto>/Runs/`.
    pub project_dir: PathBuf,
    pub shell: String,
    pub conda_activation_cmd: Option<String>,
    pub emdb_url_template: String,
    /// Filtro de logging (sintaxis de `EnvFilter`).
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una función de búsqueda arbitraria.
    /// Los valores vacíos cuentan como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self { project_dir: get("EMFLOW_PROJECT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
               shell: get("EMFLOW_SHELL").unwrap_or_else(|| DEFAULT_SHELL.to_string()),
               conda_activation_cmd: get("EMFLOW_CONDA_ACTIVATION_CMD"),
               emdb_url_template: get("EMFLOW_EMDB_URL_TEMPLATE").unwrap_or_else(|| DEFAULT_EMDB_URL_TEMPLATE.to_string()),
               log_filter: get("EMFLOW_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()) }
    }

    pub fn host_settings(&self) -> HostSettings {
        HostSettings { shell: self.shell.clone(),
                       conda_activation_cmd: self.conda_activation_cmd.clone(),
                       emdb_url_template: self.emdb_url_template.clone(),
                       // stdout del binario queda reservado al resultado JSON
                       relay: OutputRelay::Stderr }
    }
}

/// Forzar carga temprana de .env desde el binario.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
