use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::chart::Chart;
use crate::engine::Engine;
use crate::error::{ChartError, SendError};
use crate::notify::{
    BeginDispatch, Bus, ExceptionThrown, TransitionCompleted, TransitionDeclined,
};
use crate::queue::{event_queue, EventSender, Gate, Pending};

/// A machine whose queue is drained on the caller's thread.
///
/// [`send`] only appends to the queue; nothing runs until [`execute`] is
/// called, which dequeues and dispatches until the queue is empty. Events
/// queued by callback code during a dispatch are processed in the same
/// `execute` call, in FIFO order.
///
/// [`send`]: PassiveMachine::send
/// [`execute`]: PassiveMachine::execute
pub struct PassiveMachine<S, E, A = ()> {
    engine: Engine<S, E, A>,
    queue: Receiver<Pending<E, A>>,
    sender: EventSender<E, A>,
    gate: Arc<Gate>,
    bus: Arc<Bus<S, E, A>>,
}

impl<S, E, A> PassiveMachine<S, E, A>
where
    S: Clone + Eq + Hash + Debug,
    E: Eq + Hash + Debug,
{
    pub(crate) fn new(chart: Chart<S, E, A>) -> Self {
        let gate = Gate::new();
        let (sender, queue) = event_queue(gate.clone());
        let bus = Arc::new(Bus::new());
        let published = Arc::new(Mutex::new(None));
        let engine = Engine::new(chart, bus.clone(), sender.clone(), published);
        Self {
            engine,
            queue,
            sender,
            gate,
            bus,
        }
    }

    /// Lock the structure and enter the initial configuration below `root`,
    /// running entry actions top-down.
    ///
    /// Entry failures during initialization are reported over the
    /// exception-thrown channel with `machine_initialized = false`; the
    /// machine stays at the state it was entering.
    pub fn initialize(&mut self, root: &S) -> Result<(), ChartError<S>> {
        if self.gate.is_started() {
            return Err(ChartError::AlreadyStarted);
        }
        self.engine.start(root)?;
        self.gate.set_initialized();
        Ok(())
    }

    /// Append an event to the queue. Returns immediately; no transition
    /// runs until [`execute`](Self::execute) is called.
    pub fn send(&self, event: E, args: A) -> Result<(), SendError> {
        self.sender.send(event, args)
    }

    /// Dispatch queued events on the calling thread until the queue is
    /// empty.
    pub fn execute(&mut self) -> Result<(), SendError> {
        self.gate.check()?;
        while let Ok(pending) = self.queue.try_recv() {
            self.engine.dispatch(pending.event, pending.args);
            if let Some(done) = pending.done {
                let _ = done.send(());
            }
        }
        Ok(())
    }

    /// Id of the current leaf state, or `None` before initialization.
    pub fn current_state_id(&self) -> Option<S> {
        self.engine.current_state_id()
    }

    /// A cloneable handle for queueing events from elsewhere.
    pub fn handle(&self) -> EventSender<E, A> {
        self.sender.clone()
    }

    /// Subscribe to the notification emitted before handler resolution.
    pub fn subscribe_begin_dispatch(
        &self,
        subscriber: impl for<'a> Fn(&BeginDispatch<'a, S, E, A>) -> anyhow::Result<()> + Send + 'static,
    ) {
        self.bus.subscribe_begin_dispatch(subscriber);
    }

    /// Subscribe to the notification emitted when no transition matched.
    pub fn subscribe_transition_declined(
        &self,
        subscriber: impl for<'a> Fn(&TransitionDeclined<'a, S, E, A>) -> anyhow::Result<()>
            + Send
            + 'static,
    ) {
        self.bus.subscribe_transition_declined(subscriber);
    }

    /// Subscribe to the notification emitted after a transition committed.
    pub fn subscribe_transition_completed(
        &self,
        subscriber: impl for<'a> Fn(&TransitionCompleted<'a, S, E, A>) -> anyhow::Result<()>
            + Send
            + 'static,
    ) {
        self.bus.subscribe_transition_completed(subscriber);
    }

    /// Subscribe to the notification emitted for every captured callback
    /// failure.
    pub fn subscribe_exception_thrown(
        &self,
        subscriber: impl for<'a> Fn(&ExceptionThrown<'a, S, E, A>) -> anyhow::Result<()> + Send + 'static,
    ) {
        self.bus.subscribe_exception_thrown(subscriber);
    }
}
