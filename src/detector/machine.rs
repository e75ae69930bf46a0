use statig::prelude::*;

use super::commands::{DetectorApplyStatus, DetectorCommand, Phase};

#[derive(Clone, Copy, Debug)]
pub(super) struct DetectorMachine {
    pub(super) phase: Phase,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: DetectorApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: DetectorApplyStatus::Unchanged,
        }
    }
}

impl DetectorMachine {
    pub(super) fn new() -> Self {
        Self { phase: Phase::Idle }
    }
}

#[state_machine(initial = "State::idle()")]
impl DetectorMachine {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &DetectorCommand) -> Outcome<State> {
        match event {
            DetectorCommand::Start => {
                self.phase = Phase::Detecting;
                context.status = DetectorApplyStatus::Applied;
                Transition(State::detecting())
            }
            DetectorCommand::Stop => {
                context.status = DetectorApplyStatus::Unchanged;
                Handled
            }
        }
    }

    #[state]
    fn detecting(
        &mut self,
        context: &mut DispatchContext,
        event: &DetectorCommand,
    ) -> Outcome<State> {
        match event {
            DetectorCommand::Stop => {
                self.phase = Phase::Idle;
                context.status = DetectorApplyStatus::Applied;
                Transition(State::idle())
            }
            DetectorCommand::Start => {
                context.status = DetectorApplyStatus::Unchanged;
                Handled
            }
        }
    }
}
