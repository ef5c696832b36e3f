use crate::runner::OutputRelay;

/// Ajustes del host que los protocolos reciben explícitamente (nunca leen
/// variables de entorno por su cuenta).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HostSettings {
    /// Shell con el que se lanza el comando (`<shell> -c <cmd>`).
    pub shell: String,
    /// Comando de activación de conda configurado en el host, si lo hay.
    pub conda_activation_cmd: Option<String>,
    /// Plantilla de URL de mapas EMDB; `{id}` se sustituye por el id.
    pub emdb_url_template: String,
    /// Destino del reenvío en vivo de la salida de los comandos externos.
    #[serde(default)]
    pub relay: OutputRelay,
}

pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_EMDB_URL_TEMPLATE: &str =
    "https://ftp.ebi.ac.uk/pub/databases/emdb/structures/EMD-{id}/map/emd_{id}.map.gz";

impl Default for HostSettings {
    fn default() -> Self {
        Self { shell: DEFAULT_SHELL.to_string(),
               conda_activation_cmd: None,
               emdb_url_template: DEFAULT_EMDB_URL_TEMPLATE.to_string(),
               relay: OutputRelay::Inherit }
    }
}

impl HostSettings {
    pub fn emdb_url(&self, id: &str) -> String {
        self.emdb_url_template.replace("{id}", id)
    }
}
