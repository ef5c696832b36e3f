//! Construcción tipada de un `FlowEngine`.
//!
//! `first_step` fija el step inicial; cada `add_step` sólo compila si la
//! entrada del nuevo step es el mismo tipo que la salida del último:
//!
//! ```ignore
//! let engine = FlowEngine::builder(events, InMemoryFlowRepository::new())
//!     .first_step(MaterializeInputsStep::new(ctx.clone()))
//!     .add_step(ResolveCommandStep::new(ctx.clone()))
//!     .build();
//! ```

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::engine::FlowEngine;
use crate::event::EventStore;
use crate::repo::{FlowDefinition, FlowRepository};
use crate::step::{SameAs, StepDefinition, TypedStep};

/// Builder sin steps todavía.
#[derive(Debug)]
pub struct EngineBuilderInit<E: EventStore, R: FlowRepository> {
    pub(crate) event_store: E,
    pub(crate) repository: R,
}

impl<E: EventStore, R: FlowRepository> EngineBuilderInit<E, R> {
    /// Un primer step que no sea `Source` se rechaza al ejecutar el flujo.
    pub fn first_step<S>(self, step: S) -> EngineBuilder<S, E, R>
        where S: TypedStep + Debug + 'static
    {
        EngineBuilder { init: self,
                        steps: vec![Box::new(step)],
                        last: PhantomData }
    }
}

/// `S` es el último step añadido; sólo se usa su `Output`.
pub struct EngineBuilder<S: TypedStep, E: EventStore, R: FlowRepository> {
    init: EngineBuilderInit<E, R>,
    steps: Vec<Box<dyn StepDefinition>>,
    last: PhantomData<S>,
}

impl<S: TypedStep, E: EventStore, R: FlowRepository> EngineBuilder<S, E, R> {
    pub fn add_step<N>(mut self, next: N) -> EngineBuilder<N, E, R>
        where N: TypedStep + Debug + 'static,
              N::Input: SameAs<S::Output>
    {
        self.steps.push(Box::new(next));
        EngineBuilder { init: self.init,
                        steps: self.steps,
                        last: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn build(self) -> FlowEngine<E, R> {
        FlowEngine::with_definition(self.init.event_store,
                                    self.init.repository,
                                    FlowDefinition::from_steps(self.steps))
    }
}
