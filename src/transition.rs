use crate::queue::EventSender;
use crate::state::StateIndex;

/// Guard of a transition, evaluated with the event arguments.
///
/// A failing guard counts as "guard said no" for handler selection and is
/// additionally reported over the exception-thrown channel.
pub type Guard<E, A> = Box<dyn Fn(&EventSender<E, A>, &A) -> anyhow::Result<bool> + Send>;

/// Action of a transition, invoked with the event arguments.
pub type Action<E, A> = Box<dyn FnMut(&EventSender<E, A>, &A) -> anyhow::Result<()> + Send>;

/// Definition of a transition, passed to [`Chart::add_transition`].
///
/// A transition built with [`Transition::to`] is external: taking it exits
/// the states between the current leaf and the lowest common ancestor of
/// source and target, then enters the states down to the target. A target
/// equal to the source is a self-transition and exits and re-enters the
/// source. A transition built with [`Transition::internal`] runs its actions
/// without exiting or entering any state.
///
/// [`Chart::add_transition`]: crate::Chart::add_transition
pub struct Transition<S, E, A = ()> {
    pub(crate) target: Option<S>,
    pub(crate) guard: Option<Guard<E, A>>,
    pub(crate) actions: Vec<Action<E, A>>,
}

impl<S, E, A> Transition<S, E, A> {
    /// An external transition to the given target state.
    pub fn to(target: S) -> Self {
        Self {
            target: Some(target),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// An internal transition: actions only, the current state is kept.
    pub fn internal() -> Self {
        Self {
            target: None,
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Guard the transition. Among the transitions a state defines for one
    /// event, the first whose guard passes is taken.
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&EventSender<E, A>, &A) -> anyhow::Result<bool> + Send + 'static,
    {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Append an action. Actions run in the order they were added, between
    /// the exit and entry chains, and a failing action does not prevent the
    /// remaining ones from running.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: FnMut(&EventSender<E, A>, &A) -> anyhow::Result<()> + Send + 'static,
    {
        self.actions.push(Box::new(action));
        self
    }
}

/// A transition with its target resolved into the arena.
pub(crate) struct TransitionSlot<E, A> {
    pub(crate) target: Option<StateIndex>,
    pub(crate) guard: Option<Guard<E, A>>,
    pub(crate) actions: Vec<Action<E, A>>,
}
