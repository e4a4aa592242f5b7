use core::fmt::Debug;
use core::hash::Hash;
use std::collections::HashMap;

use crate::active::ActiveMachine;
use crate::error::ChartError;
use crate::passive::PassiveMachine;
use crate::state::{Node, State, StateIndex};
use crate::transition::{Transition, TransitionSlot};

/// A statechart under construction: the state tree plus the transition
/// tables.
///
/// States are added first, then nested with [`add_substate`], wired with
/// [`add_transition`] and finally turned into a [`PassiveMachine`] or an
/// [`ActiveMachine`]. All construction errors are reported synchronously;
/// once a machine has been initialized the structure is fixed.
///
/// The chart is generic over the state id type `S`, the event id type `E`
/// and one opaque argument payload `A` that is passed by reference to
/// guards, actions and subscribers.
///
/// [`add_substate`]: Chart::add_substate
/// [`add_transition`]: Chart::add_transition
pub struct Chart<S, E, A = ()> {
    pub(crate) states: Vec<Node<S, E, A>>,
    pub(crate) index: HashMap<S, StateIndex>,
}

impl<S, E, A> Chart<S, E, A>
where
    S: Clone + Eq + Hash + Debug,
    E: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a state. Ids must be unique within the chart.
    pub fn add_state(&mut self, state: State<S, E, A>) -> Result<(), ChartError<S>> {
        if self.index.contains_key(&state.id) {
            return Err(ChartError::DuplicateState(state.id));
        }
        let index = StateIndex(self.states.len());
        self.index.insert(state.id.clone(), index);
        self.states.push(Node::from_state(state));
        Ok(())
    }

    /// Nest `child` under `parent`.
    ///
    /// The child must not already have a parent, and the relation must
    /// remain a forest.
    pub fn add_substate(&mut self, parent: &S, child: &S) -> Result<(), ChartError<S>> {
        let parent_index = self.index_of(parent)?;
        let child_index = self.index_of(child)?;
        if self.states[child_index.0].parent.is_some() {
            return Err(ChartError::AlreadyHasParent(child.clone()));
        }
        if parent_index == child_index || self.is_ancestor(child_index, parent_index) {
            return Err(ChartError::CycleDetected {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        self.states[child_index.0].parent = Some(parent_index);
        self.states[parent_index.0].children.push(child_index);
        Ok(())
    }

    /// Select which direct child is entered when the composite state is the
    /// target of a transition and has no applicable history.
    pub fn set_initial_substate(&mut self, parent: &S, child: &S) -> Result<(), ChartError<S>> {
        let parent_index = self.index_of(parent)?;
        let child_index = self.index_of(child)?;
        if self.states[child_index.0].parent != Some(parent_index) {
            return Err(ChartError::NotAChild {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        self.states[parent_index.0].initial = Some(child_index);
        Ok(())
    }

    /// Append a transition to the source state's table for `event`.
    ///
    /// Transitions for the same event are tried in the order they were
    /// added; the first one whose guard passes is taken.
    pub fn add_transition(
        &mut self,
        source: &S,
        event: E,
        transition: Transition<S, E, A>,
    ) -> Result<(), ChartError<S>> {
        let source_index = self.index_of(source)?;
        let target = match &transition.target {
            Some(id) => Some(self.index_of(id)?),
            None => None,
        };
        self.states[source_index.0]
            .table
            .entry(event)
            .or_default()
            .push(TransitionSlot {
                target,
                guard: transition.guard,
                actions: transition.actions,
            });
        Ok(())
    }

    /// Consume the chart into a machine whose queue is drained by
    /// [`PassiveMachine::execute`].
    pub fn passive_machine(self) -> PassiveMachine<S, E, A>
    where
        E: Debug,
    {
        PassiveMachine::new(self)
    }

    /// Consume the chart into a machine whose queue is drained by a
    /// dedicated worker thread.
    pub fn active_machine(self) -> ActiveMachine<S, E, A>
    where
        S: Send + 'static,
        E: Send + Debug + 'static,
        A: Send + 'static,
    {
        ActiveMachine::new(self)
    }

    pub(crate) fn index_of(&self, id: &S) -> Result<StateIndex, ChartError<S>> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ChartError::UnknownState(id.clone()))
    }

    /// Check the invariants that only hold once composition is finished:
    /// every composite state must have an initial substate.
    pub(crate) fn validate(&self) -> Result<(), ChartError<S>> {
        for node in &self.states {
            if !node.children.is_empty() && node.initial.is_none() {
                return Err(ChartError::MissingInitialSubstate(node.id.clone()));
            }
        }
        Ok(())
    }

    /// Whether `ancestor` lies on the parent chain of `state`.
    fn is_ancestor(&self, ancestor: StateIndex, state: StateIndex) -> bool {
        let mut cursor = self.states[state.0].parent;
        while let Some(index) = cursor {
            if index == ancestor {
                return true;
            }
            cursor = self.states[index.0].parent;
        }
        false
    }
}

impl<S, E, A> Default for Chart<S, E, A>
where
    S: Clone + Eq + Hash + Debug,
    E: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
