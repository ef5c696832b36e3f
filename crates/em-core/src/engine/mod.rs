//! `FlowEngine` y su builder.

pub mod builder;
pub mod core;

pub use builder::{EngineBuilder, EngineBuilderInit};
pub use core::FlowEngine;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CoreEngineError, ErrorClass};
    use crate::event::FlowEventKind;
    use crate::model::ArtifactSpec;
    use crate::step::{StepKind, StepRunResultTyped, StepSignal, TypedStep};
    use crate::typed_artifact;

    typed_artifact!(Text { text: String });

    #[derive(Debug)]
    struct Seed(&'static str);

    impl TypedStep for Seed {
        type Params = ();
        type Input = Text;
        type Output = Text;
        fn id(&self) -> &'static str { "seed" }
        fn kind(&self) -> StepKind { StepKind::Source }
        fn run_typed(&self, _input: Option<Text>, _p: ()) -> StepRunResultTyped<Text> {
            StepRunResultTyped::Success { outputs: vec![Text { text: self.0.to_string(), schema_version: 1 }] }
        }
    }

    #[derive(Debug)]
    struct Upper;

    impl TypedStep for Upper {
        type Params = ();
        type Input = Text;
        type Output = Text;
        fn id(&self) -> &'static str { "upper" }
        fn kind(&self) -> StepKind { StepKind::Transform }
        fn run_typed(&self, input: Option<Text>, _p: ()) -> StepRunResultTyped<Text> {
            let text = input.map(|t| t.text.to_uppercase()).unwrap_or_default();
            StepRunResultTyped::SuccessWithSignals { outputs: vec![Text { text, schema_version: 1 }],
                                                     signals: vec![StepSignal::new("uppercased", serde_json::json!({}))] }
        }
    }

    #[derive(Debug)]
    struct Boom;

    impl TypedStep for Boom {
        type Params = ();
        type Input = Text;
        type Output = Text;
        fn id(&self) -> &'static str { "boom" }
        fn kind(&self) -> StepKind { StepKind::Sink }
        fn run_typed(&self, _input: Option<Text>, _p: ()) -> StepRunResultTyped<Text> {
            StepRunResultTyped::Failure { error: CoreEngineError::StepFailed { class: ErrorClass::Execution,
                                                                               message: "exit 1".into() } }
        }
    }

    #[test]
    fn linear_flow_runs_to_completion() {
        let mut engine = FlowEngine::new().first_step(Seed("hola")).add_step(Upper).build();
        engine.run().expect("flow should complete");

        assert_eq!(engine.event_codes(), vec!["I", "S", "F", "S", "G", "F", "C"]);
        let last = engine.last_output().expect("last output");
        assert_eq!(Text::from_artifact(&last).expect("decode").text, "HOLA");
        assert!(engine.flow_fingerprint().is_some());
    }

    #[test]
    fn step_by_step_then_completed() {
        let mut engine = FlowEngine::new().first_step(Seed("x")).add_step(Upper).build();
        assert!(engine.step().is_ok());
        assert!(engine.step().is_ok());
        assert_eq!(engine.step(), Err(CoreEngineError::FlowCompleted));
    }

    #[test]
    fn failure_stops_the_flow() {
        let mut engine = FlowEngine::new().first_step(Seed("x")).add_step(Boom).build();
        let err = engine.run().expect_err("must fail");
        assert_eq!(err.class(), ErrorClass::Execution);
        let events = engine.events();
        assert!(events.iter().any(|e| matches!(e.kind, FlowEventKind::StepFailed { .. })));
        assert!(!events.iter().any(|e| matches!(e.kind, FlowEventKind::FlowCompleted { .. })));
        assert_eq!(engine.step(), Err(CoreEngineError::FlowHasFailed));
    }

    #[test]
    fn flow_must_start_with_a_source() {
        let mut engine = FlowEngine::new().first_step(Upper).add_step(Upper).build();
        assert_eq!(engine.run(), Err(CoreEngineError::FirstStepMustBeSource));
        assert!(engine.events().is_empty());
    }

    #[test]
    fn fingerprint_is_reproducible() {
        let mut a = FlowEngine::new().first_step(Seed("same")).add_step(Upper).build();
        let mut b = FlowEngine::new().first_step(Seed("same")).add_step(Upper).build();
        a.run().unwrap();
        b.run().unwrap();
        assert_eq!(a.flow_fingerprint(), b.flow_fingerprint());
    }
}
