/// Follower state definitions for tracking one pagination stream
///
/// A follower alternates between fetching a page and emitting its records
/// until the stream runs out, a fetch fails for good, or shutdown is
/// requested between two pages.
use std::fmt;

/// Represents the current state of a pagination follower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowerState {
    // ===== Active States =====
    /// A page request (with its retries) is in flight
    Fetching,

    /// The fetched page is being transformed and appended
    Emitting,

    // ===== Terminal States =====
    /// The last page had no cursor
    Done,

    /// A fetch exhausted its retry budget or was rejected
    Failed,

    /// Shutdown was requested before the next fetch
    Interrupted,
}

impl FollowerState {
    /// Returns true if the follower will not fetch again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fetching | Self::Emitting)
    }

    /// Returns true if the stream was fully consumed or definitively given up
    ///
    /// Interrupted streams are the only terminal ones that must be revisited.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving to `next` is a legal step
    pub fn can_transition_to(&self, next: FollowerState) -> bool {
        matches!(
            (self, next),
            (Self::Fetching, Self::Emitting)
                | (Self::Fetching, Self::Failed)
                | (Self::Emitting, Self::Fetching)
                | (Self::Emitting, Self::Done)
                | (Self::Emitting, Self::Failed)
                | (Self::Emitting, Self::Interrupted)
                | (Self::Fetching, Self::Interrupted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Emitting => "emitting",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for FollowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a follower ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerOutcome {
    /// Terminal state reached
    pub state: FollowerState,

    /// Pages fetched and emitted
    pub pages: u64,

    /// Rows the store accepted
    pub rows: u64,
}

impl FollowerOutcome {
    pub fn is_settled(&self) -> bool {
        self.state.is_settled()
    }
}
