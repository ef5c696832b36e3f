/// Estado de un step tras el replay: `Pending -> Running -> FinishedOk | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    FinishedOk,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::FinishedOk | Self::Failed)
    }
}
