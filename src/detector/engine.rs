use statig::blocking::IntoStateMachineExt as _;

use super::commands::{DetectorApplyStatus, DetectorCommand, DetectorControl, Phase};
use super::machine::{DetectorMachine, DispatchContext};

#[derive(Clone, Copy, Debug)]
pub struct DetectorApplyResult {
    pub before: Phase,
    pub after: Phase,
    pub status: DetectorApplyStatus,
}

impl DetectorApplyResult {
    pub fn changed(self) -> bool {
        matches!(self.status, DetectorApplyStatus::Applied)
    }

    pub fn control(self) -> Option<DetectorControl> {
        match (self.before, self.after) {
            (Phase::Idle, Phase::Detecting) => Some(DetectorControl::Subscribe),
            (Phase::Detecting, Phase::Idle) => Some(DetectorControl::Unsubscribe),
            _ => None,
        }
    }
}

pub struct DetectorEngine {
    machine: statig::blocking::StateMachine<DetectorMachine>,
}

impl Default for DetectorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorEngine {
    pub fn new() -> Self {
        Self {
            machine: DetectorMachine::new().state_machine(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine.inner().phase
    }

    pub fn apply(&mut self, command: DetectorCommand) -> DetectorApplyResult {
        let before = self.phase();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&command, &mut context);
        let after = self.phase();
        DetectorApplyResult {
            before,
            after,
            status: context.status,
        }
    }
}
