#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]

mod active;
mod chart;
mod engine;
mod error;
mod notify;
mod passive;
mod queue;
mod state;
mod transition;

pub use active::ActiveMachine;
pub use chart::Chart;
pub use error::{ChartError, SendError};
pub use notify::{
    BeginDispatch, ExceptionThrown, FaultPhase, TransitionCompleted, TransitionDeclined,
};
pub use passive::PassiveMachine;
pub use queue::EventSender;
pub use state::{EntryAction, ExitAction, HistoryKind, State};
pub use transition::{Action, Guard, Transition};

/// Prelude containing the types needed to compose and run a machine.
pub mod prelude {
    pub use crate::{
        ActiveMachine, BeginDispatch, Chart, ChartError, EventSender, ExceptionThrown, FaultPhase,
        HistoryKind, PassiveMachine, SendError, State, Transition, TransitionCompleted,
        TransitionDeclined,
    };
}
