/// Entra en todos los fingerprints: cambiarla invalida los anteriores aunque
/// la definición y los datos sean los mismos.
pub const ENGINE_VERSION: &str = "EM1.0";
