//! Ejecución del comando resuelto con salida en streaming.
//!
//! stdout y stderr se drenan en dos tareas concurrentes; cada línea se
//! reenvía a la consola en cuanto llega y se acumula para los logs.
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use em_core::CoreEngineError;

use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Adónde se reenvía en vivo la salida del comando.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputRelay {
    /// stdout a stdout y stderr a stderr.
    #[default]
    Inherit,
    /// Ambos streams a stderr; stdout queda para lo que imprima el host.
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Código de salida; -1 si el proceso terminó por señal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Error de ejecución con `stdout + "ERROR:\n" + stderr` si el código no es 0.
    pub fn ensure_success(self) -> Result<Self, ProtocolError> {
        if self.success() {
            return Ok(self);
        }
        Err(ProtocolError::CommandFailed { code: self.exit_code,
                                           transcript: format!("{}ERROR:\n{}", self.stdout, self.stderr) })
    }
}

async fn drain<R>(reader: R, stream: Stream, relay: OutputRelay) -> std::io::Result<String>
    where R: AsyncRead + Unpin
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut acc = String::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        match (stream, relay) {
            (Stream::Stdout, OutputRelay::Inherit) => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            _ => {
                let mut err = std::io::stderr().lock();
                let _ = err.write_all(text.as_bytes());
            }
        }
        acc.push_str(&text);
    }
    Ok(acc)
}

/// Lanza `<shell> -c <command>` con exactamente `env` como entorno y `cwd`
/// como directorio actual, y espera a que termine.
pub async fn run_streaming(shell: &str,
                           command: &str,
                           env: &BTreeMap<String, String>,
                           cwd: &Path,
                           relay: OutputRelay)
                           -> Result<CommandOutput, ProtocolError> {
    log::info!("running: {command}");
    let mut child = Command::new(shell).arg("-c")
                                       .arg(command)
                                       .env_clear()
                                       .envs(env)
                                       .current_dir(cwd)
                                       .stdin(Stdio::null())
                                       .stdout(Stdio::piped())
                                       .stderr(Stdio::piped())
                                       .spawn()
                                       .map_err(|source| ProtocolError::Spawn { command: command.to_string(),
                                                                                source })?;

    let stdout = child.stdout
                      .take()
                      .ok_or_else(|| CoreEngineError::Internal("child stdout not captured".into()))?;
    let stderr = child.stderr
                      .take()
                      .ok_or_else(|| CoreEngineError::Internal("child stderr not captured".into()))?;
    let out_task = tokio::spawn(drain(stdout, Stream::Stdout, relay));
    let err_task = tokio::spawn(drain(stderr, Stream::Stderr, relay));

    let status = child.wait()
                      .await
                      .map_err(|source| ProtocolError::Spawn { command: command.to_string(),
                                                               source })?;
    let join = |r: Result<std::io::Result<String>, tokio::task::JoinError>| -> Result<String, ProtocolError> {
        match r {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(source)) => Err(ProtocolError::Spawn { command: command.to_string(),
                                                          source }),
            Err(e) => Err(CoreEngineError::Internal(format!("output reader panicked: {e}")).into()),
        }
    };
    let stdout = join(out_task.await)?;
    let stderr = join(err_task.await)?;

    let exit_code = status.code().unwrap_or(-1);
    log::debug!("command finished with code {exit_code}");
    Ok(CommandOutput { exit_code,
                       stdout,
                       stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> BTreeMap<String, String> {
        std::env::vars().filter(|(k, _)| k == "PATH").collect()
    }

    #[tokio::test]
    async fn accumulates_stdout_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_streaming("/bin/sh", "echo hello", &base_env(), dir.path(), OutputRelay::Inherit).await.unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "");
        assert!(out.ensure_success().is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_carries_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_streaming("/bin/sh",
                                "echo partial; echo boom >&2; exit 1",
                                &base_env(),
                                dir.path(),
                                OutputRelay::Inherit).await
                                                     .unwrap();
        assert_eq!(out.exit_code, 1);
        let err = out.ensure_success().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("partial\nERROR:\nboom"));
        assert_eq!(err.class(), em_core::ErrorClass::Execution);
    }

    #[tokio::test]
    async fn environment_is_exactly_the_given_map() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = base_env();
        env.insert("EMFLOW_GREETING".into(), "two words".into());
        // relay a stderr: lo acumulado en stdout no cambia
        let out = run_streaming("/bin/sh",
                                "echo \"$EMFLOW_GREETING|${HOME:-unset}\"",
                                &env,
                                dir.path(),
                                OutputRelay::Stderr).await
                                                    .unwrap();
        assert_eq!(out.stdout, "two words|unset\n");
    }

    #[tokio::test]
    async fn runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_streaming("/bin/sh", "touch marker", &base_env(), dir.path(), OutputRelay::Inherit).await.unwrap();
        assert!(out.success());
        assert!(dir.path().join("marker").exists());
    }
}
