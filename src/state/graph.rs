//! Derived read states and the dependency graph deciding when they are
//! recomputed.
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::drivers::dualsense::hid_report::InputReport;

use super::cell::{lock, AnyState, ListenerId, StateCell, StateName, StateValue};

/// Stable index of a state inside a [DependencyGraph]
pub type CellId = usize;

/// Computes a raw state value from the current input report. Derived states
/// read their dependencies from captured handles instead of the report.
pub type CalcFn<T> = Box<dyn Fn(&InputReport) -> T + Send + Sync>;

/// Decides whether a report carries the data a state is computed from
pub type AvailableFn = fn(&InputReport) -> bool;

fn always(_: &InputReport) -> bool {
    true
}

/// Latest input report together with the timestamp of the cycle that
/// delivered it
#[derive(Default)]
pub struct ReportSlot {
    current: Mutex<Option<(InputReport, u64)>>,
    cycle_timestamp: AtomicU64,
}

impl ReportSlot {
    pub fn store(&self, report: InputReport, cycle_timestamp: u64) {
        *lock(&self.current) = Some((report, cycle_timestamp));
        self.cycle_timestamp.store(cycle_timestamp, Ordering::Release);
    }

    pub fn snapshot(&self) -> Option<(InputReport, u64)> {
        *lock(&self.current)
    }

    pub fn cycle_timestamp(&self) -> u64 {
        self.cycle_timestamp.load(Ordering::Acquire)
    }
}

/// A [StateCell] whose value is computed from the input report or from other
/// read states.
pub struct ReadState<N, T> {
    id: CellId,
    cell: StateCell<N, T>,
    calc: CalcFn<T>,
    available: AvailableFn,
    report: Arc<ReportSlot>,
    can_update_itself: bool,
    /// Cycle the value was last computed for. Held while computing so a
    /// concurrent reader waits for the result instead of computing twice.
    computed_at: Mutex<u64>,
}

impl<N: StateName, T: StateValue> ReadState<N, T> {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn cell(&self) -> &StateCell<N, T> {
        &self.cell
    }

    /// True when the state was skipped during the current cycle and may
    /// recompute itself on read.
    pub fn is_self_updatable(&self) -> bool {
        self.can_update_itself && self.report.cycle_timestamp() > *lock(&self.computed_at)
    }

    fn refresh(&self) {
        if self.is_self_updatable() {
            self.calc_value(false);
        }
    }

    /// Current value in mapped units, recomputed first if it is stale
    pub fn value(&self) -> Option<T> {
        self.refresh();
        self.cell.value()
    }

    /// Current raw value, recomputed first if it is stale
    pub fn value_raw(&self) -> Option<T> {
        self.refresh();
        self.cell.value_raw()
    }

    /// Recompute from the current report. Returns whether the value changed.
    /// Reports lacking the state's data leave it untouched, and a state is
    /// computed at most once per cycle: later calls in the same cycle return
    /// false and keep the pending change for [StateCell::trigger_change_if_changed].
    pub fn calc_value(&self, trigger_change: bool) -> bool {
        let Some((report, cycle_timestamp)) = self.report.snapshot() else {
            return false;
        };
        if !(self.available)(&report) {
            return false;
        }
        let changed = {
            let mut computed_at = lock(&self.computed_at);
            if *computed_at >= cycle_timestamp {
                return false;
            }
            let value = (self.calc)(&report);
            *computed_at = cycle_timestamp;
            self.cell.set_value_without_triggering_change(value)
        };
        if changed && trigger_change {
            self.cell.trigger_change_if_changed();
        }
        changed
    }
}

impl<N, T> Deref for ReadState<N, T> {
    type Target = StateCell<N, T>;

    fn deref(&self) -> &Self::Target {
        &self.cell
    }
}

/// Type erased read state as stored in the graph
pub trait Node<N>: AnyState<N> {
    /// Recompute without notifying listeners
    fn stage(&self);
}

impl<N: StateName, T: StateValue> AnyState<N> for ReadState<N, T> {
    fn state_name(&self) -> N {
        self.cell.name()
    }

    fn has_listeners(&self) -> bool {
        self.cell.has_listeners()
    }

    fn has_changed(&self) -> bool {
        self.cell.has_changed()
    }

    fn change_timestamp(&self) -> u64 {
        self.cell.change_timestamp()
    }

    fn trigger_change_if_changed(&self) {
        self.cell.trigger_change_if_changed()
    }

    fn on_any_change(&self, callback: Arc<dyn Fn(N, u64) + Send + Sync>) -> ListenerId {
        AnyState::on_any_change(&self.cell, callback)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.cell.remove_listener(id)
    }
}

impl<N: StateName, T: StateValue> Node<N> for ReadState<N, T> {
    fn stage(&self) {
        self.calc_value(false);
    }
}

/// Read states indexed by [CellId] with their dependency edges. Edges are
/// bookkeeping only and decide whether recomputing a state is worthwhile.
pub struct DependencyGraph<N> {
    nodes: Vec<Arc<dyn Node<N>>>,
    depends_on: Vec<Vec<CellId>>,
    /// Transitive dependents of every node
    dependents: Vec<Vec<CellId>>,
}

impl<N: StateName> DependencyGraph<N> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: CellId) -> &Arc<dyn Node<N>> {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<dyn Node<N>>> {
        self.nodes.iter()
    }

    pub fn find(&self, name: N) -> Option<&Arc<dyn Node<N>>> {
        self.nodes.iter().find(|node| node.state_name() == name)
    }

    pub fn depends_on(&self, id: CellId) -> &[CellId] {
        &self.depends_on[id]
    }

    pub fn dependents(&self, id: CellId) -> &[CellId] {
        &self.dependents[id]
    }

    pub fn has_listened_dependents(&self, id: CellId) -> bool {
        self.dependents[id]
            .iter()
            .any(|d| self.nodes[*d].has_listeners())
    }

    /// Whether a dependency changed during the cycle started at
    /// `cycle_timestamp`. Change flags left over from earlier cycles do not
    /// count.
    pub fn has_changed_dependencies(&self, id: CellId, cycle_timestamp: u64) -> bool {
        self.depends_on[id].iter().any(|d| {
            let node = &self.nodes[*d];
            node.has_changed() && node.change_timestamp() >= cycle_timestamp
        })
    }

    /// Whether the node should be recomputed during the cycle started at
    /// `cycle_timestamp`
    pub fn is_updatable(&self, id: CellId, enforce_update: bool, cycle_timestamp: u64) -> bool {
        enforce_update
            || self.nodes[id].has_listeners()
            || self.has_listened_dependents(id)
            || self.has_changed_dependencies(id, cycle_timestamp)
    }
}

/// Allocates read states by index, then wires their edges
pub struct GraphBuilder<N> {
    report: Arc<ReportSlot>,
    can_update_itself: bool,
    available: AvailableFn,
    nodes: Vec<Arc<dyn Node<N>>>,
    edges: Vec<(CellId, CellId)>,
}

impl<N: StateName> GraphBuilder<N> {
    pub fn new(report: Arc<ReportSlot>, can_update_itself: bool) -> Self {
        Self {
            report,
            can_update_itself,
            available: always,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add<T, F>(&mut self, cell: StateCell<N, T>, calc: F) -> Arc<ReadState<N, T>>
    where
        T: StateValue,
        F: Fn(&InputReport) -> T + Send + Sync + 'static,
    {
        let state = Arc::new(ReadState {
            id: self.nodes.len(),
            cell,
            calc: Box::new(calc),
            available: self.available,
            report: self.report.clone(),
            can_update_itself: self.can_update_itself,
            computed_at: Mutex::new(0),
        });
        self.nodes.push(state.clone());
        state
    }

    /// States added after this call are only computed from reports passing
    /// `available`
    pub fn requiring(&mut self, available: AvailableFn) {
        self.available = available;
    }

    /// Record that `dependent` is computed from each of `dependencies`
    pub fn depend(&mut self, dependent: CellId, dependencies: &[CellId]) {
        for dependency in dependencies {
            self.edges.push((dependent, *dependency));
        }
    }

    pub fn build(self) -> DependencyGraph<N> {
        let count = self.nodes.len();
        let mut depends_on = vec![Vec::new(); count];
        let mut direct_dependents = vec![Vec::new(); count];
        for (dependent, dependency) in self.edges {
            depends_on[dependent].push(dependency);
            direct_dependents[dependency].push(dependent);
        }

        let mut dependents = vec![Vec::new(); count];
        for (id, all) in dependents.iter_mut().enumerate() {
            let mut stack = direct_dependents[id].clone();
            while let Some(next) = stack.pop() {
                if all.contains(&next) {
                    continue;
                }
                all.push(next);
                stack.extend(direct_dependents[next].iter().copied());
            }
            all.sort_unstable();
        }

        DependencyGraph {
            nodes: self.nodes,
            depends_on,
            dependents,
        }
    }
}
