//! Entity override scope
//!
//! [`PatchedModel`] swaps the entity base type into by-reference mode for as
//! long as it lives:
//!
//! - `reduce` is bound to [`reduce_by_identity`]
//! - `get_state` and `set_state` are unbound
//!
//! All three slots are captured into an [`OverrideBinding`] before anything
//! is touched and put back, one by one, when the guard drops. Drop runs on
//! normal return, on `?` early return and during unwinding, so the base type
//! never stays patched.
//!
//! The guard also holds the [`ModelBase`] lock. A second thread opening a
//! scope on the same base waits for the first to finish; a nested scope on
//! the same thread opens immediately and, because it captures the outer
//! scope's already-installed hooks, restores exactly those on exit.

use cereal_model::{
    extract, Entity, Hook, ModelBase, ModelBaseLock, ReduceHook, Reduction, Slot, SlotValue,
};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Constructor name written by [`reduce_by_identity`]
pub const MODEL_UNPICKLE: &str = "cereal.model_unpickle";

static IDENTITY_REDUCE: Lazy<ReduceHook> = Lazy::new(|| Arc::new(reduce_by_identity) as ReduceHook);

static ABSENT: SlotValue<Hook> = SlotValue::Absent;

/// Reduce an entity to its identity descriptor
///
/// The recipe asks the decoder to call [`MODEL_UNPICKLE`] with the
/// entity's `(model, pk)`; no field data is carried.
#[must_use]
pub fn reduce_by_identity(entity: &Entity) -> Reduction {
    let identity = extract(entity);
    Reduction::new(
        MODEL_UNPICKLE,
        serde_json::json!({ "model": identity.model, "pk": identity.pk }),
    )
}

/// Slot configuration captured at scope entry
#[derive(Debug, Clone)]
pub struct OverrideBinding {
    slots: Vec<(Slot, SlotValue<Hook>)>,
}

impl OverrideBinding {
    /// Capture every slot of `base`
    #[must_use]
    pub fn capture(base: &ModelBase) -> Self {
        Self {
            slots: Slot::ALL.iter().map(|&slot| (slot, base.get(slot))).collect(),
        }
    }

    /// Captured value of one slot
    #[must_use]
    pub fn get(&self, slot: Slot) -> &SlotValue<Hook> {
        self.slots
            .iter()
            .find(|(s, _)| *s == slot)
            .map_or(&ABSENT, |(_, value)| value)
    }

    /// Check whether `base` currently matches this binding exactly
    #[must_use]
    pub fn matches(&self, base: &ModelBase) -> bool {
        self.slots
            .iter()
            .all(|(slot, value)| base.get(*slot).same_as(value))
    }
}

/// Scope state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// No override in place
    Inactive,
    /// Override installed
    Active,
}

/// Active override scope on a [`ModelBase`]
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct PatchedModel<'a> {
    base: &'a ModelBase,
    binding: Option<OverrideBinding>,
    installed: ReduceHook,
    depth: usize,
    _lock: ModelBaseLock<'a>,
}

impl<'a> PatchedModel<'a> {
    /// Open a scope installing [`reduce_by_identity`]
    pub fn enter(base: &'a ModelBase) -> Self {
        Self::enter_with(base, Arc::clone(&IDENTITY_REDUCE))
    }

    /// Open a scope installing a custom reduce hook
    pub fn enter_with(base: &'a ModelBase, reduce: ReduceHook) -> Self {
        let lock = base.lock();
        let binding = OverrideBinding::capture(base);

        base.set(Hook::Reduce(Arc::clone(&reduce)));
        base.take(Slot::GetState);
        base.take(Slot::SetState);

        let depth = base.enter_scope();
        tracing::debug!(depth, "entered entity override scope");

        Self {
            base,
            binding: Some(binding),
            installed: reduce,
            depth,
            _lock: lock,
        }
    }

    /// Nesting depth of this scope (1 for the outermost)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ScopeState {
        if self.binding.is_some() {
            ScopeState::Active
        } else {
            ScopeState::Inactive
        }
    }

    /// Slot configuration that will be restored on exit
    #[inline]
    #[must_use]
    pub fn binding(&self) -> Option<&OverrideBinding> {
        self.binding.as_ref()
    }

    /// Close the scope now
    pub fn exit(mut self) {
        self.restore();
    }

    fn expected_at_exit(&self, slot: Slot) -> SlotValue<Hook> {
        match slot {
            Slot::Reduce => SlotValue::Present(Hook::Reduce(Arc::clone(&self.installed))),
            Slot::GetState | Slot::SetState => SlotValue::Absent,
        }
    }

    fn restore(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };

        for (slot, value) in binding.slots {
            let expected = self.expected_at_exit(slot);
            let displaced = self.base.restore(slot, value);
            if !displaced.same_as(&expected) {
                tracing::warn!(%slot, "slot was rebound inside override scope; discarding");
            }
        }

        let remaining = self.base.exit_scope();
        tracing::debug!(depth = self.depth, remaining, "exited entity override scope");
    }
}

impl Drop for PatchedModel<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

impl fmt::Debug for PatchedModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchedModel")
            .field("state", &self.state())
            .field("depth", &self.depth)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Open an override scope on `base`
pub fn patched_model(base: &ModelBase) -> PatchedModel<'_> {
    PatchedModel::enter(base)
}
