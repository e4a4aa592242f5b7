use core::fmt::Debug;

use thiserror::Error;

/// Error returned while composing a chart or starting a machine.
///
/// Construction problems are reported synchronously to the caller; they are
/// never turned into lifecycle notifications.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartError<S>
where
    S: Debug,
{
    /// A state with the same id was already added to the chart.
    #[error("a state with id {0:?} is already registered")]
    DuplicateState(S),

    /// The id does not refer to any state in the chart.
    #[error("unknown state id {0:?}")]
    UnknownState(S),

    /// The child was already nested under another state.
    #[error("state {0:?} already has a parent")]
    AlreadyHasParent(S),

    /// Nesting the child under the parent would make the parent its own
    /// ancestor.
    #[error("nesting {child:?} under {parent:?} would create a cycle")]
    CycleDetected { parent: S, child: S },

    /// The initial substate must be a direct child of the composite state.
    #[error("{child:?} is not a substate of {parent:?}")]
    NotAChild { parent: S, child: S },

    /// Every state with children needs an initial substate before the
    /// machine can start.
    #[error("composite state {0:?} has no initial substate")]
    MissingInitialSubstate(S),

    /// The machine was already started.
    #[error("state machine was already started")]
    AlreadyStarted,
}

/// Error returned when an event cannot be accepted by the queue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The machine has not been initialized yet.
    #[error("state machine has not been initialized")]
    NotInitialized,

    /// The machine was stopped and no longer accepts events.
    #[error("state machine has been stopped")]
    Stopped,
}
