#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DetectorCommand {
    Start,
    Stop,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Phase {
    #[default]
    Idle,
    Detecting,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DetectorApplyStatus {
    Applied,
    /// Start while detecting or stop while idle.
    Unchanged,
}

/// Side effect the runtime must perform after a phase change.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DetectorControl {
    Subscribe,
    Unsubscribe,
}
