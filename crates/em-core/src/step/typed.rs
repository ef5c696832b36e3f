use serde::{de::DeserializeOwned, Serialize};

use super::{StepKind, StepRunResult, StepSignal};
use crate::errors::CoreEngineError;
use crate::model::{Artifact, ArtifactSpec, ExecutionContext};

/// `T: SameAs<U>` sólo se cumple si `T == U`; el builder lo usa para que la
/// entrada de cada step coincida con la salida del anterior.
pub trait SameAs<T> {}
impl<T> SameAs<T> for T {}

pub enum StepRunResultTyped<Out: ArtifactSpec> {
    Success { outputs: Vec<Out> },
    SuccessWithSignals { outputs: Vec<Out>, signals: Vec<StepSignal> },
    Failure { error: CoreEngineError },
}

impl<Out: ArtifactSpec> StepRunResultTyped<Out> {
    /// Un único output, o el error convertido a `CoreEngineError`.
    pub fn from_result<E: Into<CoreEngineError>>(res: Result<Out, E>) -> Self {
        match res {
            Ok(out) => Self::Success { outputs: vec![out] },
            Err(e) => Self::Failure { error: e.into() },
        }
    }

    /// Como `from_result`, pero acompañado de señales para el log.
    pub fn with_signals<E: Into<CoreEngineError>>(res: Result<(Out, Vec<StepSignal>), E>) -> Self {
        match res {
            Ok((out, signals)) => Self::SuccessWithSignals { outputs: vec![out],
                                                             signals },
            Err(e) => Self::Failure { error: e.into() },
        }
    }

    pub fn into_neutral(self) -> StepRunResult {
        let (outputs, signals) = match self {
            Self::Success { outputs } => (outputs, Vec::new()),
            Self::SuccessWithSignals { outputs, signals } => (outputs, signals),
            Self::Failure { error } => return StepRunResult::Failure { error },
        };
        match outputs.into_iter().map(ArtifactSpec::into_artifact).collect::<Result<Vec<Artifact>, _>>() {
            Ok(outputs) => StepRunResult::Success { outputs, signals },
            Err(e) => StepRunResult::Failure { error: CoreEngineError::Artifact(e.to_string()) },
        }
    }
}

/// Step con parámetros, entrada y salida tipados.
pub trait TypedStep {
    type Params: DeserializeOwned + Serialize + Clone + Default;
    /// Ignorado en los `Source`.
    type Input: ArtifactSpec;
    type Output: ArtifactSpec;

    fn id(&self) -> &'static str;

    fn kind(&self) -> StepKind;

    /// Parámetros con los que corre el step; entran al fingerprint.
    fn params_default(&self) -> Self::Params {
        Default::default()
    }

    fn run_typed(&self, input: Option<Self::Input>, params: Self::Params) -> StepRunResultTyped<Self::Output>;
}

impl<T> crate::step::StepDefinition for T where T: TypedStep + std::fmt::Debug + 'static
{
    fn id(&self) -> &str {
        <Self as TypedStep>::id(self)
    }

    fn kind(&self) -> StepKind {
        <Self as TypedStep>::kind(self)
    }

    fn base_params(&self) -> serde_json::Value {
        serde_json::to_value(self.params_default()).unwrap_or(serde_json::Value::Null)
    }

    fn run(&self, ctx: &ExecutionContext) -> StepRunResult {
        let params = ctx.params_as::<T::Params>().unwrap_or_else(|_| self.params_default());
        let input = match ctx.input.as_ref().map(T::Input::from_artifact).transpose() {
            Ok(input) => input,
            Err(e) => return StepRunResult::Failure { error: CoreEngineError::Artifact(e.to_string()) },
        };
        if input.is_none() && TypedStep::kind(self) != StepKind::Source {
            return StepRunResult::Failure { error: CoreEngineError::MissingInputs };
        }
        self.run_typed(input, params).into_neutral()
    }

    fn definition_hash(&self) -> String {
        crate::hashing::hash_value(&serde_json::json!({
            "id": TypedStep::id(self),
            "kind": format!("{:?}", TypedStep::kind(self)),
            "base_params": crate::step::StepDefinition::base_params(self),
            "type": std::any::type_name::<T>(),
        }))
    }
}
