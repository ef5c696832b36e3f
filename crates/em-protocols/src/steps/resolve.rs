//! ResolveCommandStep: entorno efectivo, prefijo de activación conda y
//! sustitución de `$EXTRA_DIR` / `$WORKING_DIR`.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use em_core::{StepKind, StepRunResultTyped, TypedStep};

use crate::artifacts::{MaterializedInputs, ResolvedCommand};
use crate::env::{effective_environment, EnvOverlay};
use crate::protocols::generic_cmd::{GenericCmdContext, GenericCmdParams};
use crate::ProtocolError;

pub const EXTRA_DIR_PLACEHOLDER: &str = "$EXTRA_DIR";
pub const WORKING_DIR_PLACEHOLDER: &str = "$WORKING_DIR";
pub const COMMAND_FILE: &str = "command.txt";

/// Prefijo de activación a partir del comando configurado en el host.
pub fn activation_prefix(configured: Option<&str>) -> String {
    match configured.filter(|c| !c.trim().is_empty()) {
        None => "conda activate ".to_string(),
        Some(c) if !c.trim_end().ends_with("activate") => format!("{c} conda activate "),
        Some(c) => c.to_string(),
    }
}

pub fn with_conda_env(command: &str, conda_env: Option<&str>, configured: Option<&str>) -> String {
    match conda_env.map(str::trim).filter(|e| !e.is_empty()) {
        Some(env) => format!("{} {env} && {command}", activation_prefix(configured)),
        None => command.to_string(),
    }
}

pub fn replace_dirs(command: &str, extra_dir: &Path, project_dir: &Path) -> String {
    command.replace(EXTRA_DIR_PLACEHOLDER, &format!("{}/", extra_dir.display()))
           .replace(WORKING_DIR_PLACEHOLDER, &format!("{}/", project_dir.display()))
}

/// Entorno ambiente del proceso actual (se omiten entradas no UTF-8).
pub fn ambient_environment() -> BTreeMap<String, String> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                       .collect()
}

pub fn resolve_command<I>(ctx: &GenericCmdContext, params: &GenericCmdParams, ambient: I) -> Result<ResolvedCommand, ProtocolError>
    where I: IntoIterator<Item = (String, String)>
{
    let overlay = EnvOverlay::parse(&params.env_vars);
    let env = effective_environment(ambient, &overlay, params.inherit_env);
    log::info!("env vars: {:?}", overlay);

    let command = with_conda_env(&params.command,
                                 params.conda_env.as_deref(),
                                 ctx.settings.conda_activation_cmd.as_deref());
    let extra = ctx.run.extra_dir();
    let command = replace_dirs(&command, &extra, ctx.run.project_dir());

    let command_file = ctx.run.extra_path(COMMAND_FILE);
    fs::write(&command_file, &command).map_err(ProtocolError::io(&command_file))?;

    Ok(ResolvedCommand { command,
                         env,
                         cwd: extra,
                         schema_version: 1 })
}

#[derive(Debug)]
pub struct ResolveCommandStep {
    ctx: Arc<GenericCmdContext>,
}

impl ResolveCommandStep {
    pub fn new(ctx: Arc<GenericCmdContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for ResolveCommandStep {
    type Params = GenericCmdParams;
    type Input = MaterializedInputs;
    type Output = ResolvedCommand;

    fn id(&self) -> &'static str {
        "resolve_command"
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    fn params_default(&self) -> GenericCmdParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, _input: Option<MaterializedInputs>, params: GenericCmdParams) -> StepRunResultTyped<ResolvedCommand> {
        StepRunResultTyped::from_result(resolve_command(&self.ctx, &params, ambient_environment()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_activation_when_none_configured() {
        assert_eq!(with_conda_env("run.sh", Some("cryo"), None), "conda activate  cryo && run.sh");
    }

    #[test]
    fn configured_activation_gets_conda_activate_appended() {
        let cmd = with_conda_env("run.sh", Some("cryo"), Some(". ~/miniconda3/etc/profile.d/conda.sh;"));
        assert_eq!(cmd, ". ~/miniconda3/etc/profile.d/conda.sh; conda activate  cryo && run.sh");
        let cmd = with_conda_env("run.sh", Some("cryo"), Some("source activate"));
        assert_eq!(cmd, "source activate cryo && run.sh");
    }

    #[test]
    fn no_conda_env_leaves_command_alone() {
        assert_eq!(with_conda_env("run.sh", Some("  "), Some("x")), "run.sh");
        assert_eq!(with_conda_env("run.sh", None, None), "run.sh");
    }

    #[test]
    fn placeholders_are_replaced_everywhere() {
        let out = replace_dirs("cp $EXTRA_DIRa.star $EXTRA_DIRb.star && ls $WORKING_DIR",
                               &PathBuf::from("/p/Runs/1_x/extra"),
                               &PathBuf::from("/p"));
        assert_eq!(out, "cp /p/Runs/1_x/extra/a.star /p/Runs/1_x/extra/b.star && ls /p/");
    }
}
