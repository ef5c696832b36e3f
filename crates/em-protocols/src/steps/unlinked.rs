//! FilterLinkedStep (Source): conserva los elementos cuyo fichero binario
//! existe. La comprobación se reparte con rayon sin perder el orden.
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use em_core::{StepKind, StepRunResultTyped, TypedStep};

use crate::artifacts::{FilterReport, HarvestedOutput};
use crate::protocols::remove_unlinked::{RemoveUnlinkedContext, RemoveUnlinkedParams};
use crate::run::OutputObject;
use crate::ProtocolError;

/// Cada cuántos elementos se informa del progreso.
pub fn progress_step(total: usize) -> usize {
    (total / 10000).max(10000)
}

pub fn filter_linked(ctx: &RemoveUnlinkedContext) -> Result<FilterReport, ProtocolError> {
    let set = &ctx.input.value;
    let files = set.item_files();
    let total = files.len();
    let step = progress_step(total);
    let checked = AtomicUsize::new(0);

    let mask: Vec<bool> = files.par_iter()
                               .map(|file| {
                                   let exists = ctx.run.resolve(file).exists();
                                   let i = checked.fetch_add(1, Ordering::Relaxed);
                                   if i % step == 0 {
                                       log::info!("checked {}/{total} items", i + 1);
                                   }
                                   exists
                               })
                               .collect();

    let kept = mask.iter().filter(|k| **k).count();
    log::info!("{kept} of {total} {} have their binary file", set.kind());
    let output = if kept > 0 {
        let filtered = set.retain_mask(&mask)?;
        Some(HarvestedOutput { index: 0,
                               name: set.output_key().to_string(),
                               file: None,
                               object: OutputObject::from(filtered) })
    } else {
        None
    };
    Ok(FilterReport { input_size: total,
                      kept,
                      output,
                      schema_version: 1 })
}

#[derive(Debug)]
pub struct FilterLinkedStep {
    ctx: Arc<RemoveUnlinkedContext>,
}

impl FilterLinkedStep {
    pub fn new(ctx: Arc<RemoveUnlinkedContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for FilterLinkedStep {
    type Params = RemoveUnlinkedParams;
    type Input = FilterReport;
    type Output = FilterReport;

    fn id(&self) -> &'static str {
        "remove_unlinked_items"
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn run_typed(&self, _input: Option<FilterReport>, _params: RemoveUnlinkedParams) -> StepRunResultTyped<FilterReport> {
        StepRunResultTyped::from_result(filter_linked(&self.ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_every_ten_thousand_at_least() {
        assert_eq!(progress_step(0), 10000);
        assert_eq!(progress_step(50_000), 10000);
        assert_eq!(progress_step(500_000_000), 50000);
    }
}
