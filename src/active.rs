use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::chart::Chart;
use crate::engine::Engine;
use crate::error::{ChartError, SendError};
use crate::notify::{
    BeginDispatch, Bus, ExceptionThrown, TransitionCompleted, TransitionDeclined,
};
use crate::queue::{event_queue, EventSender, Gate, Pending};
use crate::state::StateIndex;

/// A machine whose queue is drained by a dedicated worker thread.
///
/// The worker is spawned by [`initialize`] and blocks until the queue is
/// non-empty, then drains it fully before blocking again. Every guard,
/// action, entry/exit hook and lifecycle subscriber runs on the worker;
/// [`send`] never runs user code on the caller's thread.
///
/// [`initialize`]: ActiveMachine::initialize
/// [`send`]: ActiveMachine::send
pub struct ActiveMachine<S, E, A = ()> {
    sender: EventSender<E, A>,
    gate: Arc<Gate>,
    bus: Arc<Bus<S, E, A>>,
    published: Arc<Mutex<Option<S>>>,
    boot: Option<Boot<S, E, A>>,
    worker: Option<JoinHandle<()>>,
    stop_tx: Sender<()>,
}

/// Everything the worker takes ownership of when it starts.
struct Boot<S, E, A> {
    chart: Chart<S, E, A>,
    queue: Receiver<Pending<E, A>>,
    stop_rx: Receiver<()>,
}

impl<S, E, A> ActiveMachine<S, E, A>
where
    S: Clone + Eq + Hash + Debug + Send + 'static,
    E: Eq + Hash + Debug + Send + 'static,
    A: Send + 'static,
{
    pub(crate) fn new(chart: Chart<S, E, A>) -> Self {
        let gate = Gate::new();
        let (sender, queue) = event_queue(gate.clone());
        let (stop_tx, stop_rx) = bounded(1);
        Self {
            sender,
            gate,
            bus: Arc::new(Bus::new()),
            published: Arc::new(Mutex::new(None)),
            boot: Some(Boot {
                chart,
                queue,
                stop_rx,
            }),
            worker: None,
            stop_tx,
        }
    }

    /// Start the worker thread and enter the initial configuration below
    /// `root` on it.
    ///
    /// Structural problems (unknown root, composite state without an
    /// initial substate) are returned synchronously. Entry failures during
    /// initialization are reported over the exception-thrown channel with
    /// `machine_initialized = false`.
    pub fn initialize(&mut self, root: &S) -> Result<(), ChartError<S>> {
        let boot = self.boot.take().ok_or(ChartError::AlreadyStarted)?;
        if let Err(error) = boot.chart.validate() {
            self.boot = Some(boot);
            return Err(error);
        }
        let root = match boot.chart.index_of(root) {
            Ok(index) => index,
            Err(error) => {
                self.boot = Some(boot);
                return Err(error);
            }
        };
        let engine = Engine::new(
            boot.chart,
            self.bus.clone(),
            self.sender.clone(),
            self.published.clone(),
        );
        let queue = boot.queue;
        let stop_rx = boot.stop_rx;
        self.worker = Some(thread::spawn(move || run_worker(engine, queue, stop_rx, root)));
        self.gate.set_initialized();
        Ok(())
    }

    /// Append an event to the queue and signal the worker. Returns
    /// immediately.
    pub fn send(&self, event: E, args: A) -> Result<(), SendError> {
        self.sender.send(event, args)
    }

    /// Append an event and block until the worker finished dispatching it.
    ///
    /// Must not be called from guard, action, entry/exit or subscriber
    /// code: those run on the worker, which would wait on itself.
    pub fn send_wait(&self, event: E, args: A) -> Result<(), SendError> {
        let (done_tx, done_rx) = bounded(1);
        self.sender.send_acked(event, args, done_tx)?;
        done_rx.recv().map_err(|_| SendError::Stopped)
    }

    /// Stop accepting events, let the worker drain the queue, and join it.
    /// Also performed on drop.
    pub fn stop(&mut self) {
        self.shutdown();
    }

    /// Id of the current leaf state, or `None` before initialization.
    pub fn current_state_id(&self) -> Option<S> {
        self.published.lock().clone()
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

impl<S, E, A> ActiveMachine<S, E, A> {
    fn shutdown(&mut self) {
        self.gate.set_stopped();
        let _ = self.stop_tx.try_send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<S, E, A> Drop for ActiveMachine<S, E, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S, E, A>(
    mut engine: Engine<S, E, A>,
    queue: Receiver<Pending<E, A>>,
    stop: Receiver<()>,
    root: StateIndex,
) where
    S: Clone + Eq + Hash + Debug,
    E: Eq + Hash + Debug,
{
    debug!("dispatch worker started");
    engine.enter_initial(root);
    loop {
        select! {
            recv(queue) -> message => match message {
                Ok(pending) => {
                    engine.dispatch(pending.event, pending.args);
                    if let Some(done) = pending.done {
                        let _ = done.send(());
                    }
                }
                Err(_) => break,
            },
            recv(stop) -> _ => {
                // Drain whatever was accepted before the stop, then exit.
                while let Ok(pending) = queue.try_recv() {
                    engine.dispatch(pending.event, pending.args);
                    if let Some(done) = pending.done {
                        let _ = done.send(());
                    }
                }
                break;
            }
        }
    }
    debug!("dispatch worker stopped");
}
