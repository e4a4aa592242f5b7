//! Lifecycle notification channels.
//!
//! Every dispatch emits exactly one begin-dispatch notification followed by
//! exactly one terminal notification (declined or completed). Exception
//! notifications are non-terminal and may occur any number of times in
//! between. Subscribers are called synchronously, in registration order, on
//! the thread that runs the dispatch.

use parking_lot::Mutex;

/// The phase of a dispatch in which a callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPhase {
    /// A transition guard returned an error while being evaluated.
    Guard,
    /// An entry action returned an error.
    Entry,
    /// An exit action returned an error.
    Exit,
    /// A transition action returned an error.
    Action,
    /// A lifecycle subscriber returned an error.
    Subscriber,
}

/// Emitted immediately before handler resolution for an event.
pub struct BeginDispatch<'a, S, E, A> {
    /// The event being dispatched.
    pub event: &'a E,
    /// The current leaf state at the time of dispatch.
    pub source: &'a S,
    /// The event arguments.
    pub args: &'a A,
}

/// Emitted when no transition matched the event, after all guards were
/// scanned up to the root.
pub struct TransitionDeclined<'a, S, E, A> {
    pub event: &'a E,
    pub source: &'a S,
    pub args: &'a A,
}

/// Emitted after a transition committed.
///
/// For an external transition `target` is the leaf resolved by drilling
/// into the transition's target; for an internal transition it is the
/// unchanged current leaf.
pub struct TransitionCompleted<'a, S, E, A> {
    pub event: &'a E,
    /// The state whose transition table matched the event.
    pub source: &'a S,
    pub target: &'a S,
    pub args: &'a A,
}

/// Emitted whenever a guard, action, entry/exit hook or subscriber fails.
///
/// Failures never abort the dispatch chain and are never returned to the
/// caller that queued the event.
pub struct ExceptionThrown<'a, S, E, A> {
    /// The event being dispatched; `None` for failures during
    /// initialization.
    pub event: Option<&'a E>,
    /// The state the failure is attributed to.
    pub source: Option<&'a S>,
    pub args: Option<&'a A>,
    pub phase: FaultPhase,
    pub error: &'a anyhow::Error,
    /// `false` when the failure occurred while the machine was still
    /// entering its initial configuration.
    pub machine_initialized: bool,
}

type BeginDispatchFn<S, E, A> =
    Box<dyn for<'a> Fn(&BeginDispatch<'a, S, E, A>) -> anyhow::Result<()> + Send>;
type DeclinedFn<S, E, A> =
    Box<dyn for<'a> Fn(&TransitionDeclined<'a, S, E, A>) -> anyhow::Result<()> + Send>;
type CompletedFn<S, E, A> =
    Box<dyn for<'a> Fn(&TransitionCompleted<'a, S, E, A>) -> anyhow::Result<()> + Send>;
type ExceptionFn<S, E, A> =
    Box<dyn for<'a> Fn(&ExceptionThrown<'a, S, E, A>) -> anyhow::Result<()> + Send>;

/// Registration lists for the four lifecycle channels.
pub(crate) struct Bus<S, E, A> {
    begin_dispatch: Mutex<Vec<BeginDispatchFn<S, E, A>>>,
    transition_declined: Mutex<Vec<DeclinedFn<S, E, A>>>,
    transition_completed: Mutex<Vec<CompletedFn<S, E, A>>>,
    exception_thrown: Mutex<Vec<ExceptionFn<S, E, A>>>,
}

impl<S, E, A> Bus<S, E, A> {
    pub(crate) fn new() -> Self {
        Self {
            begin_dispatch: Mutex::new(Vec::new()),
            transition_declined: Mutex::new(Vec::new()),
            transition_completed: Mutex::new(Vec::new()),
            exception_thrown: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe_begin_dispatch(
        &self,
        subscriber: impl for<'a> Fn(&BeginDispatch<'a, S, E, A>) -> anyhow::Result<()> + Send + 'static,
    ) {
        self.begin_dispatch.lock().push(Box::new(subscriber));
    }

    pub(crate) fn subscribe_transition_declined(
        &self,
        subscriber: impl for<'a> Fn(&TransitionDeclined<'a, S, E, A>) -> anyhow::Result<()>
            + Send
            + 'static,
    ) {
        self.transition_declined.lock().push(Box::new(subscriber));
    }

    pub(crate) fn subscribe_transition_completed(
        &self,
        subscriber: impl for<'a> Fn(&TransitionCompleted<'a, S, E, A>) -> anyhow::Result<()>
            + Send
            + 'static,
    ) {
        self.transition_completed.lock().push(Box::new(subscriber));
    }

    pub(crate) fn subscribe_exception_thrown(
        &self,
        subscriber: impl for<'a> Fn(&ExceptionThrown<'a, S, E, A>) -> anyhow::Result<()> + Send + 'static,
    ) {
        self.exception_thrown.lock().push(Box::new(subscriber));
    }

    /// Deliver to all begin-dispatch subscribers, returning their failures.
    pub(crate) fn emit_begin_dispatch(
        &self,
        notification: &BeginDispatch<'_, S, E, A>,
    ) -> Vec<anyhow::Error> {
        let subscribers = self.begin_dispatch.lock();
        let mut failures = Vec::new();
        for subscriber in subscribers.iter() {
            if let Err(error) = subscriber(notification) {
                failures.push(error);
            }
        }
        failures
    }

    pub(crate) fn emit_transition_declined(
        &self,
        notification: &TransitionDeclined<'_, S, E, A>,
    ) -> Vec<anyhow::Error> {
        let subscribers = self.transition_declined.lock();
        let mut failures = Vec::new();
        for subscriber in subscribers.iter() {
            if let Err(error) = subscriber(notification) {
                failures.push(error);
            }
        }
        failures
    }

    pub(crate) fn emit_transition_completed(
        &self,
        notification: &TransitionCompleted<'_, S, E, A>,
    ) -> Vec<anyhow::Error> {
        let subscribers = self.transition_completed.lock();
        let mut failures = Vec::new();
        for subscriber in subscribers.iter() {
            if let Err(error) = subscriber(notification) {
                failures.push(error);
            }
        }
        failures
    }

    /// Deliver to all exception-thrown subscribers.
    ///
    /// Failures raised here are returned to the engine, which drops them
    /// without emitting further notifications so subscriber failures cannot
    /// loop.
    pub(crate) fn emit_exception_thrown(
        &self,
        notification: &ExceptionThrown<'_, S, E, A>,
    ) -> Vec<anyhow::Error> {
        let subscribers = self.exception_thrown.lock();
        let mut failures = Vec::new();
        for subscriber in subscribers.iter() {
            if let Err(error) = subscriber(notification) {
                failures.push(error);
            }
        }
        failures
    }
}
