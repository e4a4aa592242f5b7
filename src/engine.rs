use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::chart::Chart;
use crate::error::ChartError;
use crate::notify::{
    BeginDispatch, Bus, ExceptionThrown, FaultPhase, TransitionCompleted, TransitionDeclined,
};
use crate::queue::EventSender;
use crate::state::{HistoryKind, StateIndex};

/// Runs a single dispatch at a time. Both dispatcher variants own one of
/// these; the passive machine drives it from `execute`, the active machine
/// from its worker thread.
pub(crate) struct Engine<S, E, A> {
    chart: Chart<S, E, A>,
    current: Option<StateIndex>,
    bus: Arc<Bus<S, E, A>>,
    sender: EventSender<E, A>,
    published: Arc<Mutex<Option<S>>>,
}

impl<S, E, A> Engine<S, E, A>
where
    S: Clone + Eq + Hash + Debug,
    E: Eq + Hash + Debug,
{
    pub(crate) fn new(
        chart: Chart<S, E, A>,
        bus: Arc<Bus<S, E, A>>,
        sender: EventSender<E, A>,
        published: Arc<Mutex<Option<S>>>,
    ) -> Self {
        Self {
            chart,
            current: None,
            bus,
            sender,
            published,
        }
    }

    /// Validate the chart and enter the initial configuration below `root`.
    pub(crate) fn start(&mut self, root: &S) -> Result<(), ChartError<S>> {
        self.chart.validate()?;
        let root = self.chart.index_of(root)?;
        self.enter_initial(root);
        Ok(())
    }

    /// Enter the configuration below `root` by following initial substates
    /// down to a leaf, running entry actions top-down.
    ///
    /// An entry failure is reported with `machine_initialized = false` and
    /// stops the descent; the machine stays at the state it was entering.
    pub(crate) fn enter_initial(&mut self, root: StateIndex) {
        self.current = Some(root);
        let mut entered = self.run_entry(root, None, None, false);
        let mut state = root;
        while entered {
            let Some(child) = self.chart.states[state.0].initial else {
                break;
            };
            state = child;
            self.current = Some(state);
            entered = self.run_entry(state, None, None, false);
        }
        self.publish();
        if let Some(id) = self.current_state_id() {
            debug!(state = ?id, "entered initial configuration");
        }
    }

    pub(crate) fn current_state_id(&self) -> Option<S> {
        self.current.map(|index| self.chart.states[index.0].id.clone())
    }

    /// Run one full dispatch: resolve the handler by walking up from the
    /// current leaf, then run the exit chain, the transition actions and
    /// the entry chain, and report the outcome on the lifecycle channels.
    pub(crate) fn dispatch(&mut self, event: E, args: A) {
        let Some(leaf) = self.current else {
            return;
        };
        debug!(event = ?event, "dispatching event");
        self.notify_begin(&event, leaf, &args);

        // First ancestor with a transition whose guard admits the event. A
        // failing guard is reported and treated as if it returned false.
        let mut selected: Option<(StateIndex, usize)> = None;
        let mut cursor = Some(leaf);
        'resolve: while let Some(state) = cursor {
            if let Some(transitions) = self.chart.states[state.0].table.get(&event) {
                for (slot, transition) in transitions.iter().enumerate() {
                    let admitted = match &transition.guard {
                        None => true,
                        Some(guard) => match guard(&self.sender, &args) {
                            Ok(admitted) => admitted,
                            Err(error) => {
                                self.notify_exception(
                                    Some(&event),
                                    Some(state),
                                    Some(&args),
                                    FaultPhase::Guard,
                                    &error,
                                    true,
                                );
                                false
                            }
                        },
                    };
                    if admitted {
                        selected = Some((state, slot));
                        break 'resolve;
                    }
                }
            }
            cursor = self.chart.states[state.0].parent;
        }

        let Some((owner, slot)) = selected else {
            debug!(event = ?event, "transition declined");
            self.notify_declined(&event, leaf, &args);
            return;
        };

        let target = self.chart.states[owner.0].table[&event][slot].target;

        let Some(target) = target else {
            // Internal transition: actions only, the configuration is kept.
            self.run_actions(owner, &event, slot, &args);
            self.notify_completed(&event, owner, leaf, &args);
            return;
        };

        // The boundary stays active: exit up to it from the current leaf,
        // enter down from it to the target. A self-transition exits and
        // re-enters its source, so its boundary is the source's parent.
        let boundary = if owner == target {
            self.chart.states[owner.0].parent
        } else {
            self.lca(owner, target)
        };

        self.exit_to(boundary, leaf, &event, &args);
        self.run_actions(owner, &event, slot, &args);
        self.enter_from(boundary, target, &event, &args);
        let resolved = self.drill(target, &event, &args);

        self.current = Some(resolved);
        self.publish();
        debug!(
            source = ?self.chart.states[owner.0].id,
            target = ?self.chart.states[resolved.0].id,
            "transition completed"
        );
        self.notify_completed(&event, owner, resolved, &args);
    }

    /// Exit every state from `leaf` up to (not including) `boundary`,
    /// bottom-up, recording history on the parents of exited states.
    fn exit_to(&mut self, boundary: Option<StateIndex>, leaf: StateIndex, event: &E, args: &A) {
        let mut cursor = Some(leaf);
        while cursor != boundary {
            let Some(state) = cursor else {
                break;
            };
            self.run_exit(state, event, args);
            let parent = self.chart.states[state.0].parent;
            if let Some(parent) = parent {
                match self.chart.states[parent.0].history {
                    HistoryKind::None => {}
                    HistoryKind::Shallow => self.chart.states[parent.0].slot = Some(state),
                    HistoryKind::Deep => self.chart.states[parent.0].slot = Some(leaf),
                }
            }
            cursor = parent;
        }
    }

    /// Enter every state from `boundary` (exclusive) down to `target`
    /// (inclusive), top-down. Empty when the target is the boundary
    /// itself, i.e. a transition to a state that is already active.
    fn enter_from(&mut self, boundary: Option<StateIndex>, target: StateIndex, event: &E, args: &A) {
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while cursor != boundary {
            let Some(state) = cursor else {
                break;
            };
            path.push(state);
            cursor = self.chart.states[state.0].parent;
        }
        for state in path.into_iter().rev() {
            self.run_entry(state, Some(event), Some(args), true);
        }
    }

    /// Descend from a composite state to a leaf: through the history slot
    /// when one applies, through initial substates otherwise.
    fn drill(&mut self, from: StateIndex, event: &E, args: &A) -> StateIndex {
        let mut state = from;
        loop {
            if self.chart.states[state.0].children.is_empty() {
                return state;
            }
            match (
                self.chart.states[state.0].history,
                self.chart.states[state.0].slot,
            ) {
                (HistoryKind::Shallow, Some(child)) => {
                    self.run_entry(child, Some(event), Some(args), true);
                    state = child;
                }
                (HistoryKind::Deep, Some(stored)) => {
                    self.enter_from(Some(state), stored, event, args);
                    state = stored;
                }
                _ => {
                    let Some(child) = self.chart.states[state.0].initial else {
                        return state;
                    };
                    self.run_entry(child, Some(event), Some(args), true);
                    state = child;
                }
            }
        }
    }

    fn run_entry(
        &mut self,
        state: StateIndex,
        event: Option<&E>,
        args: Option<&A>,
        machine_initialized: bool,
    ) -> bool {
        trace!(state = ?self.chart.states[state.0].id, "entering state");
        let result = match self.chart.states[state.0].entry.as_mut() {
            Some(action) => action(&self.sender),
            None => Ok(()),
        };
        match result {
            Ok(()) => true,
            Err(error) => {
                self.notify_exception(
                    event,
                    Some(state),
                    args,
                    FaultPhase::Entry,
                    &error,
                    machine_initialized,
                );
                false
            }
        }
    }

    fn run_exit(&mut self, state: StateIndex, event: &E, args: &A) {
        trace!(state = ?self.chart.states[state.0].id, "exiting state");
        let result = match self.chart.states[state.0].exit.as_mut() {
            Some(action) => action(&self.sender),
            None => Ok(()),
        };
        if let Err(error) = result {
            self.notify_exception(
                Some(event),
                Some(state),
                Some(args),
                FaultPhase::Exit,
                &error,
                true,
            );
        }
    }

    /// Run the actions of the selected transition in order. A failure is
    /// reported but does not skip the remaining actions.
    fn run_actions(&mut self, owner: StateIndex, event: &E, slot: usize, args: &A) {
        let count = self.chart.states[owner.0]
            .table
            .get(event)
            .map_or(0, |transitions| transitions[slot].actions.len());
        for index in 0..count {
            let result = match self.chart.states[owner.0].table.get_mut(event) {
                Some(transitions) => (transitions[slot].actions[index])(&self.sender, args),
                None => Ok(()),
            };
            if let Err(error) = result {
                self.notify_exception(
                    Some(event),
                    Some(owner),
                    Some(args),
                    FaultPhase::Action,
                    &error,
                    true,
                );
            }
        }
    }

    /// Deepest state that is an ancestor-or-self of both arguments.
    fn lca(&self, a: StateIndex, b: StateIndex) -> Option<StateIndex> {
        let mut ancestors = Vec::new();
        let mut cursor = Some(a);
        while let Some(index) = cursor {
            ancestors.push(index);
            cursor = self.chart.states[index.0].parent;
        }
        let mut cursor = Some(b);
        while let Some(index) = cursor {
            if ancestors.contains(&index) {
                return Some(index);
            }
            cursor = self.chart.states[index.0].parent;
        }
        None
    }

    fn publish(&self) {
        *self.published.lock() = self.current_state_id();
    }

    fn notify_begin(&self, event: &E, source: StateIndex, args: &A) {
        let notification = BeginDispatch {
            event,
            source: &self.chart.states[source.0].id,
            args,
        };
        let failures = self.bus.emit_begin_dispatch(&notification);
        self.raise_subscriber_faults(Some(event), Some(source), Some(args), failures);
    }

    fn notify_declined(&self, event: &E, source: StateIndex, args: &A) {
        let notification = TransitionDeclined {
            event,
            source: &self.chart.states[source.0].id,
            args,
        };
        let failures = self.bus.emit_transition_declined(&notification);
        self.raise_subscriber_faults(Some(event), Some(source), Some(args), failures);
    }

    fn notify_completed(&self, event: &E, source: StateIndex, target: StateIndex, args: &A) {
        let notification = TransitionCompleted {
            event,
            source: &self.chart.states[source.0].id,
            target: &self.chart.states[target.0].id,
            args,
        };
        let failures = self.bus.emit_transition_completed(&notification);
        self.raise_subscriber_faults(Some(event), Some(source), Some(args), failures);
    }

    fn notify_exception(
        &self,
        event: Option<&E>,
        source: Option<StateIndex>,
        args: Option<&A>,
        phase: FaultPhase,
        error: &anyhow::Error,
        machine_initialized: bool,
    ) {
        debug!(?phase, error = %error, "captured callback failure");
        let notification = ExceptionThrown {
            event,
            source: source.map(|index| &self.chart.states[index.0].id),
            args,
            phase,
            error,
            machine_initialized,
        };
        for failure in self.bus.emit_exception_thrown(&notification) {
            trace!(error = %failure, "exception subscriber failed, not re-dispatched");
        }
    }

    /// Failures returned by subscribers of the other channels are reported
    /// as exception-thrown notifications of their own.
    fn raise_subscriber_faults(
        &self,
        event: Option<&E>,
        source: Option<StateIndex>,
        args: Option<&A>,
        failures: Vec<anyhow::Error>,
    ) {
        for error in failures {
            self.notify_exception(event, source, args, FaultPhase::Subscriber, &error, true);
        }
    }
}
