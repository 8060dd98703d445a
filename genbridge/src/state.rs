//! Lifecycle state of one bridge run.

/// The per-run state of the bridge controller.
///
/// Runs advance strictly forward:
/// `NotStarted -> InputLoaded -> EngineInitialized -> Relaying -> Terminated`.
/// Any fatal error moves the run to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BridgeState {
    /// Nothing has happened yet.
    #[default]
    NotStarted,
    /// The complete input payload is held in memory.
    InputLoaded,
    /// The engine accepted the input and its output is subscribed.
    EngineInitialized,
    /// Lines are being relayed to the sink.
    Relaying,
    /// The engine finished and every line was relayed.
    Terminated,
    /// A fatal error aborted the run.
    Failed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InputLoaded => write!(f, "InputLoaded"),
            Self::EngineInitialized => write!(f, "EngineInitialized"),
            Self::Relaying => write!(f, "Relaying"),
            Self::Terminated => write!(f, "Terminated"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl BridgeState {
    /// The state a successful step leads to, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::InputLoaded),
            Self::InputLoaded => Some(Self::EngineInitialized),
            Self::EngineInitialized => Some(Self::Relaying),
            Self::Relaying => Some(Self::Terminated),
            Self::Terminated | Self::Failed => None,
        }
    }

    /// Whether moving to `to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if to == Self::Failed {
            return !self.is_final();
        }
        self.next() == Some(to)
    }

    /// Only a relaying run accepts output lines.
    #[must_use]
    pub fn accepts_output(self) -> bool {
        matches!(self, Self::Relaying)
    }

    /// Check if the run has ended, successfully or not.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}
