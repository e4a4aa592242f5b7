use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::SendError;

/// A queued event together with its argument payload.
pub(crate) struct Pending<E, A> {
    pub(crate) event: E,
    pub(crate) args: A,
    /// Rendezvous acknowledged once the dispatch of this event completed.
    pub(crate) done: Option<Sender<()>>,
}

/// Tracks whether the machine accepts events.
pub(crate) struct Gate {
    initialized: AtomicBool,
    stopped: AtomicBool,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            initialized: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn check(&self) -> Result<(), SendError> {
        if self.stopped.load(Ordering::Acquire) {
            Err(SendError::Stopped)
        } else if !self.initialized.load(Ordering::Acquire) {
            Err(SendError::NotInitialized)
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.initialized.load(Ordering::Acquire) || self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub(crate) fn set_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// Cloneable handle that appends events to a machine's queue.
///
/// Every guard, action and entry/exit hook receives a reference to the
/// sender of its own machine, so callback code can queue follow-up events
/// while a dispatch is in progress. Such reentrant sends are processed
/// strictly after the events already in the queue.
pub struct EventSender<E, A = ()> {
    tx: Sender<Pending<E, A>>,
    gate: Arc<Gate>,
}

impl<E, A> EventSender<E, A> {
    /// Append an event to the queue.
    ///
    /// Never blocks and never runs a transition. Fails if the machine has
    /// not been initialized or was stopped.
    pub fn send(&self, event: E, args: A) -> Result<(), SendError> {
        self.gate.check()?;
        self.tx
            .send(Pending {
                event,
                args,
                done: None,
            })
            .map_err(|_| SendError::Stopped)
    }

    pub(crate) fn send_acked(&self, event: E, args: A, done: Sender<()>) -> Result<(), SendError> {
        self.gate.check()?;
        self.tx
            .send(Pending {
                event,
                args,
                done: Some(done),
            })
            .map_err(|_| SendError::Stopped)
    }
}

impl<E, A> Clone for EventSender<E, A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            gate: self.gate.clone(),
        }
    }
}

/// Create the unbounded FIFO shared by a machine and its sender handles.
pub(crate) fn event_queue<E, A>(gate: Arc<Gate>) -> (EventSender<E, A>, Receiver<Pending<E, A>>) {
    let (tx, rx) = unbounded();
    (EventSender { tx, gate }, rx)
}
