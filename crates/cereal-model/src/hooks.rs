//! Hook slots of the entity base type
//!
//! [`ModelBase`] holds the three override points every [`Entity`] shares
//! during serialization:
//!
//! - [`Slot::Reduce`]: supplies a [`Reduction`] recipe (constructor + args)
//! - [`Slot::GetState`]: captures state for the state-transfer path
//! - [`Slot::SetState`]: applies captured state on reconstruction
//!
//! Each slot is either [`SlotValue::Present`] or [`SlotValue::Absent`];
//! absence is an ordinary state, not an error.

use crate::entity::Entity;
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Captured entity state (field name -> value)
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Reduce hook: entity -> reconstruction recipe
pub type ReduceHook = Arc<dyn Fn(&Entity) -> Reduction + Send + Sync>;

/// State capture hook
pub type GetStateHook = Arc<dyn Fn(&Entity) -> StateMap + Send + Sync>;

/// State apply hook
pub type SetStateHook = Arc<dyn Fn(&mut Entity, StateMap) + Send + Sync>;

/// Reconstruction recipe produced by a reduce hook
///
/// `constructor` names a function registered with the decoder; `args` is
/// handed to it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    /// Registered constructor name
    pub constructor: String,

    /// Constructor arguments
    pub args: serde_json::Value,
}

impl Reduction {
    /// Create new reduction
    #[inline]
    #[must_use]
    pub fn new(constructor: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            constructor: constructor.into(),
            args,
        }
    }
}

/// Named hook slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Reduction recipe hook
    Reduce,

    /// State capture hook
    GetState,

    /// State apply hook
    SetState,
}

impl Slot {
    /// Every slot, in capture order
    pub const ALL: [Slot; 3] = [Slot::Reduce, Slot::GetState, Slot::SetState];

    /// Slot name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reduce => "reduce",
            Self::GetState => "get_state",
            Self::SetState => "set_state",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A hook bound to one of the slots
#[derive(Clone)]
pub enum Hook {
    /// Value for [`Slot::Reduce`]
    Reduce(ReduceHook),

    /// Value for [`Slot::GetState`]
    GetState(GetStateHook),

    /// Value for [`Slot::SetState`]
    SetState(SetStateHook),
}

impl Hook {
    /// Slot this hook binds to
    #[must_use]
    pub fn slot(&self) -> Slot {
        match self {
            Self::Reduce(_) => Slot::Reduce,
            Self::GetState(_) => Slot::GetState,
            Self::SetState(_) => Slot::SetState,
        }
    }

    /// Identity comparison: same slot and same underlying function object
    #[must_use]
    pub fn ptr_eq(&self, other: &Hook) -> bool {
        match (self, other) {
            (Self::Reduce(a), Self::Reduce(b)) => Arc::ptr_eq(a, b),
            (Self::GetState(a), Self::GetState(b)) => Arc::ptr_eq(a, b),
            (Self::SetState(a), Self::SetState(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook::{}", self.slot())
    }
}

/// Slot content: bound or unbound
#[derive(Debug, Clone)]
pub enum SlotValue<H> {
    /// Slot holds a value
    Present(H),

    /// Slot is unbound
    Absent,
}

impl<H> SlotValue<H> {
    /// Check if slot holds a value
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Borrow the value, if any
    #[inline]
    #[must_use]
    pub fn as_option(&self) -> Option<&H> {
        match self {
            Self::Present(h) => Some(h),
            Self::Absent => None,
        }
    }
}

impl<H> From<Option<H>> for SlotValue<H> {
    fn from(value: Option<H>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl SlotValue<Hook> {
    /// Identity comparison of two slot values
    #[must_use]
    pub fn same_as(&self, other: &SlotValue<Hook>) -> bool {
        match (self, other) {
            (Self::Present(a), Self::Present(b)) => a.ptr_eq(b),
            (Self::Absent, Self::Absent) => true,
            _ => false,
        }
    }
}

/// Point-in-time copy of all three slots
#[derive(Clone, Default)]
pub struct HookSnapshot {
    /// Reduce hook, if bound
    pub reduce: Option<ReduceHook>,

    /// State capture hook, if bound
    pub get_state: Option<GetStateHook>,

    /// State apply hook, if bound
    pub set_state: Option<SetStateHook>,
}

impl HookSnapshot {
    /// Read a slot
    #[must_use]
    pub fn get(&self, slot: Slot) -> SlotValue<Hook> {
        match slot {
            Slot::Reduce => self.reduce.clone().map(Hook::Reduce).into(),
            Slot::GetState => self.get_state.clone().map(Hook::GetState).into(),
            Slot::SetState => self.set_state.clone().map(Hook::SetState).into(),
        }
    }

    fn set(&mut self, hook: Hook) {
        match hook {
            Hook::Reduce(h) => self.reduce = Some(h),
            Hook::GetState(h) => self.get_state = Some(h),
            Hook::SetState(h) => self.set_state = Some(h),
        }
    }

    fn take(&mut self, slot: Slot) -> SlotValue<Hook> {
        match slot {
            Slot::Reduce => self.reduce.take().map(Hook::Reduce).into(),
            Slot::GetState => self.get_state.take().map(Hook::GetState).into(),
            Slot::SetState => self.set_state.take().map(Hook::SetState).into(),
        }
    }

    /// Identity comparison of all three slots
    #[must_use]
    pub fn same_as(&self, other: &HookSnapshot) -> bool {
        Slot::ALL
            .iter()
            .all(|&slot| self.get(slot).same_as(&other.get(slot)))
    }
}

impl fmt::Debug for HookSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSnapshot")
            .field("reduce", &self.reduce.is_some())
            .field("get_state", &self.get_state.is_some())
            .field("set_state", &self.set_state.is_some())
            .finish()
    }
}

#[derive(Default)]
struct SlotTable {
    hooks: HookSnapshot,
    active_scopes: usize,
}

/// Shared hook table of the entity base type
///
/// The table is guarded by a reentrant lock: a thread holding
/// [`ModelBase::lock`] may call any method again (nested codec calls),
/// while other threads block until the holder releases it.
pub struct ModelBase {
    table: ReentrantMutex<RefCell<SlotTable>>,
}

/// Exclusive (reentrant) hold on a [`ModelBase`]
///
/// While alive, other threads block on every [`ModelBase`] method; the
/// holding thread may keep calling them.
#[must_use = "the table is released as soon as the lock is dropped"]
pub struct ModelBaseLock<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<SlotTable>>,
}

impl fmt::Debug for ModelBaseLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModelBaseLock")
    }
}

static GLOBAL: Lazy<Arc<ModelBase>> = Lazy::new(|| Arc::new(ModelBase::with_defaults()));

impl ModelBase {
    /// Create a base type with every slot unbound
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: ReentrantMutex::new(RefCell::new(SlotTable::default())),
        }
    }

    /// Create a base type carrying the default state-transfer hooks
    ///
    /// `reduce` stays unbound: without an override the serializer captures
    /// full field state through `get_state`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let base = Self::new();
        base.set(Hook::GetState(Arc::new(default_get_state)));
        base.set(Hook::SetState(Arc::new(default_set_state)));
        base
    }

    /// Process-wide base type
    #[must_use]
    pub fn global() -> Arc<ModelBase> {
        Arc::clone(&GLOBAL)
    }

    /// Hold the table for the current thread
    ///
    /// Blocks while another thread holds it; returns immediately when the
    /// current thread already does.
    pub fn lock(&self) -> ModelBaseLock<'_> {
        ModelBaseLock {
            _guard: self.table.lock(),
        }
    }

    /// Read a slot
    #[must_use]
    pub fn get(&self, slot: Slot) -> SlotValue<Hook> {
        self.table.lock().borrow().hooks.get(slot)
    }

    /// Bind a hook to its slot
    pub fn set(&self, hook: Hook) {
        self.table.lock().borrow_mut().hooks.set(hook);
    }

    /// Unbind a slot, returning what it held
    pub fn take(&self, slot: Slot) -> SlotValue<Hook> {
        self.table.lock().borrow_mut().hooks.take(slot)
    }

    /// Put a slot back to a captured value (bound or unbound)
    ///
    /// Returns what the slot held before the call.
    pub fn restore(&self, slot: Slot, value: SlotValue<Hook>) -> SlotValue<Hook> {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        let previous = table.hooks.take(slot);
        if let SlotValue::Present(hook) = value {
            debug_assert_eq!(hook.slot(), slot, "hook restored into foreign slot");
            table.hooks.set(hook);
        }
        previous
    }

    /// Copy all three slots
    #[must_use]
    pub fn snapshot(&self) -> HookSnapshot {
        self.table.lock().borrow().hooks.clone()
    }

    /// Number of override scopes currently open
    #[must_use]
    pub fn active_scopes(&self) -> usize {
        self.table.lock().borrow().active_scopes
    }

    /// Record a scope opening; returns the new depth
    pub fn enter_scope(&self) -> usize {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        table.active_scopes += 1;
        table.active_scopes
    }

    /// Record a scope closing; returns the new depth
    pub fn exit_scope(&self) -> usize {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        table.active_scopes = table.active_scopes.saturating_sub(1);
        table.active_scopes
    }
}

impl Default for ModelBase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModelBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBase")
            .field("hooks", &self.snapshot())
            .field("active_scopes", &self.active_scopes())
            .finish()
    }
}

/// Default state capture: every field
#[must_use]
pub fn default_get_state(entity: &Entity) -> StateMap {
    entity
        .fields()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Default state apply: replace all fields
pub fn default_set_state(entity: &mut Entity, state: StateMap) {
    let fields = entity.fields_mut();
    fields.clear();
    fields.extend(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn reduce_hook(name: &'static str) -> Hook {
        Hook::Reduce(Arc::new(move |_: &Entity| {
            Reduction::new(name, serde_json::Value::Null)
        }))
    }

    #[test]
    fn new_base_is_unbound() {
        let base = ModelBase::new();
        for slot in Slot::ALL {
            assert!(!base.get(slot).is_present(), "{slot} should be absent");
        }
    }

    #[test]
    fn defaults_bind_state_transfer_only() {
        let base = ModelBase::with_defaults();
        assert!(!base.get(Slot::Reduce).is_present());
        assert!(base.get(Slot::GetState).is_present());
        assert!(base.get(Slot::SetState).is_present());
    }

    #[test]
    fn set_and_take() {
        let base = ModelBase::new();
        base.set(reduce_hook("a"));
        assert!(base.get(Slot::Reduce).is_present());

        let taken = base.take(Slot::Reduce);
        assert!(taken.is_present());
        assert!(!base.get(Slot::Reduce).is_present());
    }

    #[test]
    fn take_absent_is_absent() {
        let base = ModelBase::new();
        assert!(matches!(base.take(Slot::GetState), SlotValue::Absent));
    }

    #[test]
    fn restore_present_reinstalls_same_hook() {
        let base = ModelBase::new();
        base.set(reduce_hook("a"));
        let captured = base.get(Slot::Reduce);

        base.set(reduce_hook("b"));
        base.restore(Slot::Reduce, captured.clone());

        assert!(base.get(Slot::Reduce).same_as(&captured));
    }

    #[test]
    fn restore_absent_unbinds() {
        let base = ModelBase::new();
        base.set(reduce_hook("a"));

        let previous = base.restore(Slot::Reduce, SlotValue::Absent);

        assert!(previous.is_present());
        assert!(!base.get(Slot::Reduce).is_present());
    }

    #[test]
    fn snapshot_identity() {
        let base = ModelBase::with_defaults();
        let before = base.snapshot();
        assert!(before.same_as(&base.snapshot()));

        base.set(Hook::GetState(Arc::new(default_get_state)));
        assert!(!before.same_as(&base.snapshot()));
    }

    #[test]
    fn lock_is_reentrant() {
        let base = ModelBase::new();
        let _outer = base.lock();
        base.set(reduce_hook("nested"));
        assert!(base.get(Slot::Reduce).is_present());
    }

    #[test]
    fn lock_excludes_other_threads() {
        let base = Arc::new(ModelBase::new());
        let guard = base.lock();

        let other = Arc::clone(&base);
        let handle = thread::spawn(move || {
            other.set(reduce_hook("late"));
        });

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!base.get(Slot::Reduce).is_present());

        drop(guard);
        handle.join().unwrap();
        assert!(base.get(Slot::Reduce).is_present());
    }

    #[test]
    fn scope_depth_counts() {
        let base = ModelBase::new();
        assert_eq!(base.enter_scope(), 1);
        assert_eq!(base.enter_scope(), 2);
        assert_eq!(base.exit_scope(), 1);
        assert_eq!(base.exit_scope(), 0);
        assert_eq!(base.exit_scope(), 0);
    }

    #[test]
    fn default_state_roundtrip() {
        let source = Entity::with_pk("testapp.Thing", 1).field("name", "foo");
        let state = default_get_state(&source);

        let mut target = Entity::with_pk("testapp.Thing", 1).field("stale", true);
        default_set_state(&mut target, state);

        assert_eq!(target, source);
    }

    #[test]
    fn global_is_shared() {
        assert!(Arc::ptr_eq(&ModelBase::global(), &ModelBase::global()));
    }
}
