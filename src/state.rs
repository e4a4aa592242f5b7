use std::collections::HashMap;

use crate::queue::EventSender;
use crate::transition::TransitionSlot;

/// Index of a state inside a chart's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateIndex(pub(crate) usize);

/// What a composite state remembers about its last active substate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryKind {
    /// Re-entry always goes through the initial substate.
    #[default]
    None,
    /// Re-entry restores the most recently exited direct child.
    Shallow,
    /// Re-entry restores the leaf that was active when the state was exited.
    Deep,
}

/// Entry action of a state. The sender can be used to queue follow-up
/// events; they are processed after the current dispatch completes.
pub type EntryAction<E, A> = Box<dyn FnMut(&EventSender<E, A>) -> anyhow::Result<()> + Send>;

/// Exit action of a state.
pub type ExitAction<E, A> = Box<dyn FnMut(&EventSender<E, A>) -> anyhow::Result<()> + Send>;

/// Definition of a single state, passed to [`Chart::add_state`].
///
/// [`Chart::add_state`]: crate::Chart::add_state
///
/// ```
/// use hsmkit::{HistoryKind, State};
///
/// let state: State<&str, u32> = State::new("playing")
///     .on_entry(|_| Ok(()))
///     .history(HistoryKind::Shallow);
/// ```
pub struct State<S, E, A = ()> {
    pub(crate) id: S,
    pub(crate) entry: Option<EntryAction<E, A>>,
    pub(crate) exit: Option<ExitAction<E, A>>,
    pub(crate) history: HistoryKind,
}

impl<S, E, A> State<S, E, A> {
    /// Create a state with the given id and no actions.
    pub fn new(id: S) -> Self {
        Self {
            id,
            entry: None,
            exit: None,
            history: HistoryKind::None,
        }
    }

    /// Set the entry action, executed every time the state is entered.
    pub fn on_entry<F>(mut self, action: F) -> Self
    where
        F: FnMut(&EventSender<E, A>) -> anyhow::Result<()> + Send + 'static,
    {
        self.entry = Some(Box::new(action));
        self
    }

    /// Set the exit action, executed every time the state is exited.
    pub fn on_exit<F>(mut self, action: F) -> Self
    where
        F: FnMut(&EventSender<E, A>) -> anyhow::Result<()> + Send + 'static,
    {
        self.exit = Some(Box::new(action));
        self
    }

    /// Set the history kind of the state.
    pub fn history(mut self, kind: HistoryKind) -> Self {
        self.history = kind;
        self
    }
}

/// Arena node: a state definition plus its links into the tree.
pub(crate) struct Node<S, E, A> {
    pub(crate) id: S,
    pub(crate) parent: Option<StateIndex>,
    pub(crate) children: Vec<StateIndex>,
    pub(crate) initial: Option<StateIndex>,
    pub(crate) history: HistoryKind,
    /// Most recently active child (shallow) or descendant leaf (deep).
    pub(crate) slot: Option<StateIndex>,
    pub(crate) entry: Option<EntryAction<E, A>>,
    pub(crate) exit: Option<ExitAction<E, A>>,
    pub(crate) table: HashMap<E, Vec<TransitionSlot<E, A>>>,
}

impl<S, E, A> Node<S, E, A> {
    pub(crate) fn from_state(state: State<S, E, A>) -> Self {
        Self {
            id: state.id,
            parent: None,
            children: Vec::new(),
            initial: None,
            history: state.history,
            slot: None,
            entry: state.entry,
            exit: state.exit,
            table: HashMap::new(),
        }
    }
}
