//! Observable value slots and their listener registries.
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

/// Values that can be stored in a [StateCell]
pub trait StateValue: Clone + PartialEq + Debug + Send + Sync + 'static {}
impl<T> StateValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Identifiers used to name cells
pub trait StateName: Copy + PartialEq + Debug + Send + Sync + 'static {}
impl<T> StateName for T where T: Copy + PartialEq + Debug + Send + Sync + 'static {}

/// Compares the stored value with an incoming one. Returns whether the value
/// changed along with the value that should be stored, which may differ from
/// the incoming one (e.g. snapped into a deadzone).
pub type CompareFn<T> = Box<dyn Fn(Option<&T>, &T) -> (bool, T) + Send + Sync>;

/// Converts between raw and mapped values
pub type MapFn<T> = Box<dyn Fn(&T) -> T + Send + Sync>;

/// Lock a mutex, recovering the guard if a listener panicked while holding it.
/// Every guarded assignment is a single statement so the data stays coherent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monotonic timestamp in nanoseconds. Consecutive calls never return the same
/// value, so timestamps can be used to order cycles and changes.
pub fn timestamp() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = START.get_or_init(Instant::now).elapsed().as_nanos() as u64;
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// Handle returned when registering a listener, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Change notification carrying mapped values
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<N, T> {
    pub name: N,
    pub old_value: Option<T>,
    pub new_value: T,
    pub timestamp: u64,
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listener<E> {
    id: ListenerId,
    once: bool,
    callback: Callback<E>,
}

/// Registry of callbacks for a single kind of event. Callbacks are invoked
/// outside of the registry lock so they may add or remove listeners.
pub struct Listeners<E> {
    entries: Mutex<Vec<Listener<E>>>,
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, once: bool, callback: Callback<E>) -> ListenerId {
        let id = ListenerId::next();
        lock(&self.entries).push(Listener { id, once, callback });
        id
    }

    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.push(false, Arc::new(callback))
    }

    /// Add a callback that is removed after its first invocation
    pub fn add_once<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.push(true, Arc::new(callback))
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Invoke every registered callback in registration order
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = {
            let mut entries = lock(&self.entries);
            let callbacks = entries.iter().map(|l| l.callback.clone()).collect();
            entries.retain(|l| !l.once);
            callbacks
        };
        for callback in callbacks {
            callback(event);
        }
    }
}

struct Slot<T> {
    value: Option<T>,
    last_value: Option<T>,
    change_timestamp: u64,
    changed: bool,
}

/// A single observable value. The stored value is always raw; optional
/// mapping functions translate to and from the application's units at the
/// read/write boundary.
pub struct StateCell<N, T> {
    name: N,
    slot: Mutex<Slot<T>>,
    listeners: Listeners<ChangeEvent<N, T>>,
    compare: Option<CompareFn<T>>,
    raw_to_mapped: Option<MapFn<T>>,
    mapped_to_raw: Option<MapFn<T>>,
    default_value: Option<T>,
    ignore_none: bool,
}

impl<N: StateName, T: StateValue> StateCell<N, T> {
    pub fn new(name: N) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot {
                value: None,
                last_value: None,
                change_timestamp: 0,
                changed: false,
            }),
            listeners: Listeners::new(),
            compare: None,
            raw_to_mapped: None,
            mapped_to_raw: None,
            default_value: None,
            ignore_none: true,
        }
    }

    /// Initial raw value
    pub fn with_value(mut self, value: T) -> Self {
        self.slot
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .value = Some(value);
        self
    }

    /// Value assumed whenever the stored value is missing
    pub fn with_default_value(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }

    /// When set (the default), the first value is adopted silently instead
    /// of being reported as a change.
    pub fn with_ignore_none(mut self, ignore_none: bool) -> Self {
        self.ignore_none = ignore_none;
        self
    }

    pub fn with_compare<F>(mut self, compare: F) -> Self
    where
        F: Fn(Option<&T>, &T) -> (bool, T) + Send + Sync + 'static,
    {
        self.compare = Some(Box::new(compare));
        self
    }

    pub fn with_mapping(
        mut self,
        raw_to_mapped: Option<MapFn<T>>,
        mapped_to_raw: Option<MapFn<T>>,
    ) -> Self {
        self.raw_to_mapped = raw_to_mapped;
        self.mapped_to_raw = mapped_to_raw;
        self
    }

    pub fn name(&self) -> N {
        self.name
    }

    fn to_mapped(&self, value: T) -> T {
        match &self.raw_to_mapped {
            Some(map) => map(&value),
            None => value,
        }
    }

    /// Convert a value in mapped units to raw units
    pub fn to_raw(&self, value: T) -> T {
        match &self.mapped_to_raw {
            Some(map) => map(&value),
            None => value,
        }
    }

    /// Current value in mapped units
    pub fn value(&self) -> Option<T> {
        self.value_raw().map(|v| self.to_mapped(v))
    }

    pub fn value_raw(&self) -> Option<T> {
        let slot = lock(&self.slot);
        slot.value.clone().or_else(|| self.default_value.clone())
    }

    /// Value before the most recent assignment, in mapped units
    pub fn last_value(&self) -> Option<T> {
        self.last_value_raw().map(|v| self.to_mapped(v))
    }

    pub fn last_value_raw(&self) -> Option<T> {
        lock(&self.slot).last_value.clone()
    }

    /// Whether the most recent assignment changed the value
    pub fn has_changed(&self) -> bool {
        lock(&self.slot).changed
    }

    pub fn change_timestamp(&self) -> u64 {
        lock(&self.slot).change_timestamp
    }

    /// Set a value given in mapped units and notify listeners on change
    pub fn set_value(&self, value: T) -> bool {
        let raw = self.to_raw(value);
        self.assign(raw, true)
    }

    /// Set a raw value and notify listeners on change
    pub fn set_value_raw(&self, value: T) -> bool {
        self.assign(value, true)
    }

    /// Set a raw value, deferring notification to
    /// [StateCell::trigger_change_if_changed].
    pub fn set_value_without_triggering_change(&self, value: T) -> bool {
        self.assign(value, false)
    }

    fn assign(&self, value: T, trigger: bool) -> bool {
        let changed = {
            let mut slot = lock(&self.slot);
            let old = slot.value.clone().or_else(|| self.default_value.clone());
            if old.is_none() && self.ignore_none {
                let value = match &self.compare {
                    Some(compare) => compare(None, &value).1,
                    None => value,
                };
                slot.last_value = Some(value.clone());
                slot.value = Some(value);
                slot.changed = false;
                slot.change_timestamp = timestamp();
                return false;
            }
            let (changed, value) = match &self.compare {
                Some(compare) => compare(old.as_ref(), &value),
                None => (old.as_ref() != Some(&value), value),
            };
            slot.last_value = old;
            slot.value = Some(value);
            slot.changed = changed;
            slot.change_timestamp = timestamp();
            changed
        };
        if changed && trigger {
            self.trigger_change();
        }
        changed
    }

    /// Notify listeners if the most recent assignment changed the value
    pub fn trigger_change_if_changed(&self) {
        if self.has_changed() {
            self.trigger_change();
        }
    }

    fn trigger_change(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let (old_value, new_value, timestamp) = {
            let slot = lock(&self.slot);
            (
                slot.last_value.clone(),
                slot.value.clone(),
                slot.change_timestamp,
            )
        };
        let Some(new_value) = new_value else {
            return;
        };
        let event = ChangeEvent {
            name: self.name,
            old_value: old_value.map(|v| self.to_mapped(v)),
            new_value: self.to_mapped(new_value),
            timestamp,
        };
        self.listeners.emit(&event);
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Called with the new mapped value
    pub fn on_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners.add(move |e: &ChangeEvent<N, T>| callback(&e.new_value))
    }

    /// Called with the previous and the new mapped value
    pub fn on_change_with_old<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(Option<&T>, &T) + Send + Sync + 'static,
    {
        self.listeners
            .add(move |e: &ChangeEvent<N, T>| callback(e.old_value.as_ref(), &e.new_value))
    }

    /// Called with the full change event
    pub fn on_change_full<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChangeEvent<N, T>) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    /// Called with the new mapped value on the next change only
    pub fn once_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners
            .add_once(move |e: &ChangeEvent<N, T>| callback(&e.new_value))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.clear();
    }
}

impl<N: StateName, T: StateValue> Debug for StateCell<N, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("StateCell")
            .field("name", &self.name)
            .field("value", &slot.value)
            .field("last_value", &slot.last_value)
            .field("changed", &slot.changed)
            .finish()
    }
}

/// Type erased view of a cell, used where cells of different value types are
/// handled together.
pub trait AnyState<N>: Send + Sync {
    fn state_name(&self) -> N;
    fn has_listeners(&self) -> bool;
    fn has_changed(&self) -> bool;
    /// Timestamp of the most recent assignment
    fn change_timestamp(&self) -> u64;
    fn trigger_change_if_changed(&self);
    /// Register a callback receiving only the name and timestamp of changes
    fn on_any_change(&self, callback: Arc<dyn Fn(N, u64) + Send + Sync>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

impl<N: StateName, T: StateValue> AnyState<N> for StateCell<N, T> {
    fn state_name(&self) -> N {
        self.name
    }

    fn has_listeners(&self) -> bool {
        StateCell::has_listeners(self)
    }

    fn has_changed(&self) -> bool {
        StateCell::has_changed(self)
    }

    fn change_timestamp(&self) -> u64 {
        StateCell::change_timestamp(self)
    }

    fn trigger_change_if_changed(&self) {
        StateCell::trigger_change_if_changed(self)
    }

    fn on_any_change(&self, callback: Arc<dyn Fn(N, u64) + Send + Sync>) -> ListenerId {
        self.on_change_full(move |e| callback(e.name, e.timestamp))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        StateCell::remove_listener(self, id)
    }
}
