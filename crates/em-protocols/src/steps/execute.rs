//! ExecuteCommandStep: lanza el comando resuelto y guarda stdout/stderr en
//! `logs/`. El engine es síncrono; el runner async se conduce con un runtime
//! de hilo único propio del step.
use std::fs;
use std::future::Future;
use std::sync::Arc;

use em_core::{CoreEngineError, StepKind, StepRunResultTyped, StepSignal, TypedStep};

use crate::artifacts::{ExecutionRecord, ResolvedCommand};
use crate::protocols::generic_cmd::{GenericCmdContext, GenericCmdParams};
use crate::runner::run_streaming;
use crate::ProtocolError;

pub const STDOUT_LOG: &str = "stdout.log";
pub const STDERR_LOG: &str = "stderr.log";

fn block_on_own_runtime<F: Future>(future: F) -> std::io::Result<F::Output> {
    tokio::runtime::Builder::new_current_thread().enable_all()
                                                 .build()
                                                 .map(|runtime| runtime.block_on(future))
}

/// Conduce `future` hasta el final desde código síncrono. Dentro de un
/// runtime de tokio no se puede anidar otro, así que entonces se hace desde
/// un hilo aparte.
fn run_blocking<F>(future: F) -> Result<std::io::Result<F::Output>, ProtocolError>
    where F: Future + Send,
          F::Output: Send
{
    if tokio::runtime::Handle::try_current().is_err() {
        return Ok(block_on_own_runtime(future));
    }
    log::debug!("inside a tokio runtime, running the command from a dedicated thread");
    std::thread::scope(|scope| scope.spawn(|| block_on_own_runtime(future)).join())
        .map_err(|_| CoreEngineError::Internal("command runner thread panicked".into()).into())
}

pub fn execute(ctx: &GenericCmdContext, resolved: &ResolvedCommand) -> Result<ExecutionRecord, ProtocolError> {
    let output = run_blocking(run_streaming(&ctx.settings.shell,
                                            &resolved.command,
                                            &resolved.env,
                                            &resolved.cwd,
                                            ctx.settings.relay))?.map_err(ProtocolError::io(ctx.run.run_dir()))??;

    for (name, text) in [(STDOUT_LOG, &output.stdout), (STDERR_LOG, &output.stderr)] {
        let path = ctx.run.logs_path(name);
        fs::write(&path, text).map_err(ProtocolError::io(&path))?;
    }

    let output = output.ensure_success()?;
    Ok(ExecutionRecord { exit_code: output.exit_code,
                         stdout: output.stdout,
                         stderr: output.stderr,
                         schema_version: 1 })
}

#[derive(Debug)]
pub struct ExecuteCommandStep {
    ctx: Arc<GenericCmdContext>,
}

impl ExecuteCommandStep {
    pub fn new(ctx: Arc<GenericCmdContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for ExecuteCommandStep {
    type Params = GenericCmdParams;
    type Input = ResolvedCommand;
    type Output = ExecutionRecord;

    fn id(&self) -> &'static str {
        "execute_command"
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    fn params_default(&self) -> GenericCmdParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, input: Option<ResolvedCommand>, _params: GenericCmdParams) -> StepRunResultTyped<ExecutionRecord> {
        match input {
            Some(resolved) => StepRunResultTyped::with_signals(execute(&self.ctx, &resolved).map(|record| {
                let exit = StepSignal::new("command_exit",
                                           serde_json::json!({ "exit_code": record.exit_code,
                                                               "stdout_bytes": record.stdout.len(),
                                                               "stderr_bytes": record.stderr.len() }));
                (record, vec![exit])
            })),
            None => StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs },
        }
    }
}
