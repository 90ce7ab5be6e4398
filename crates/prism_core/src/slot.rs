//! Per-object, per-property value storage
//!
//! A [`ValueSlot`] holds every candidate source for one property on one object
//! and resolves them in a fixed order:
//!
//! ```text
//! animated > bound > local > styled > inherited > default
//! ```
//!
//! Animated and bound values are sampled during a digest and cached, so
//! `get` between digests returns what the last frame observed. Sources that
//! only change through the slot's own setters (local, styled) notify eagerly
//! when the slot does not take part in digests.
//!
//! Slots never call back into user code while their owner's slot map is
//! borrowed. Mutators return whether the change callback is due and the owner
//! fires it after releasing the map.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::animation::{same_handle, AnimationRef, ClockRef};
use crate::binding::{Binding, BindingExpression};
use crate::error::BindingError;
use crate::meta::TypeInfo;
use crate::object::DependencyObject;
use crate::registry::PropertyDescriptor;
use crate::value::{PropertyType, Value};

/// Which source currently provides a property's value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueSource {
    Animated,
    Bound,
    Local,
    Styled,
    Inherited,
    Default,
}

struct ActiveAnimation<T> {
    animation: AnimationRef<T>,
    clock: ClockRef,
    seed: T,
    current: T,
}

pub(crate) struct ValueSlot<T> {
    descriptor: Arc<PropertyDescriptor>,
    local: Option<T>,
    styled: Option<T>,
    default: T,
    /// Value observed by the last digest or eager notification
    previous: T,
    animation: Option<ActiveAnimation<T>>,
    binding: Option<Binding<T>>,
    requires_digest: bool,
    same: fn(&T, &T) -> bool,
}

impl<T: PropertyType> ValueSlot<T> {
    pub(crate) fn new(descriptor: Arc<PropertyDescriptor>, owner: &DependencyObject) -> Self {
        let default = descriptor.default_value::<T>();
        let mut slot = Self {
            descriptor,
            local: None,
            styled: None,
            previous: default.clone(),
            default,
            animation: None,
            binding: None,
            requires_digest: false,
            same: T::same,
        };
        slot.previous = slot.resolve(owner);
        slot.refresh_requires_digest();
        slot
    }

    pub(crate) fn requires_digest(&self) -> bool {
        self.requires_digest
    }

    fn refresh_requires_digest(&mut self) {
        self.requires_digest = self.binding.is_some()
            || self.animation.is_some()
            || (self.descriptor.is_inherited() && self.local.is_none() && self.styled.is_none());
    }

    // ─── resolution ───

    fn resolve(&self, owner: &DependencyObject) -> T {
        if let Some(active) = &self.animation {
            return active.current.clone();
        }
        if let Some(bound) = self.binding.as_ref().and_then(Binding::cached) {
            return bound.clone();
        }
        self.resolve_unbound(owner)
    }

    fn resolve_unbound(&self, owner: &DependencyObject) -> T {
        self.local
            .as_ref()
            .or(self.styled.as_ref())
            .cloned()
            .or_else(|| self.inherited(owner))
            .unwrap_or_else(|| self.default.clone())
    }

    fn inherited(&self, owner: &DependencyObject) -> Option<T> {
        if self.descriptor.is_inherited() {
            owner.inherited_value::<T>(self.descriptor.id())
        } else {
            None
        }
    }

    /// Resolved value as of the last digest
    pub(crate) fn get(&self, owner: &DependencyObject) -> T {
        self.resolve(owner)
    }

    /// Resolved value ignoring animation, with the binding source read live
    pub(crate) fn get_fresh(&self, owner: &DependencyObject) -> T {
        match &self.binding {
            Some(binding) => {
                let source = owner.binding_source();
                binding.read_fresh(source.as_deref()).0
            }
            None => self.resolve_unbound(owner),
        }
    }

    /// Display string: the binding's sticky text if any, else the resolved value
    pub(crate) fn get_string(&self, owner: &DependencyObject) -> String {
        if let Some(sticky) = self.binding.as_ref().and_then(Binding::sticky) {
            return sticky.to_string();
        }
        self.resolve(owner).into_value().to_string()
    }

    pub(crate) fn value_source(&self, owner: &DependencyObject) -> ValueSource {
        if self.animation.is_some() {
            ValueSource::Animated
        } else if self.binding.as_ref().is_some_and(|b| b.cached().is_some()) {
            ValueSource::Bound
        } else if self.local.is_some() {
            ValueSource::Local
        } else if self.styled.is_some() {
            ValueSource::Styled
        } else if self.inherited(owner).is_some() {
            ValueSource::Inherited
        } else {
            ValueSource::Default
        }
    }

    /// Recompute the digest flag and apply the eager notification rule
    ///
    /// Slots outside the digest cycle report a change as soon as the resolved
    /// value moves; slots inside it wait for the next digest.
    #[must_use]
    fn settle(&mut self, owner: &DependencyObject) -> bool {
        self.refresh_requires_digest();
        if self.requires_digest {
            return false;
        }
        let current = self.resolve(owner);
        if (self.same)(&current, &self.previous) {
            return false;
        }
        tracing::trace!(property = self.descriptor.name(), "eager change notification");
        self.previous = current;
        true
    }

    // ─── mutation ───

    #[must_use]
    pub(crate) fn set_local(&mut self, owner: &DependencyObject, value: T) -> bool {
        self.clear_animation_state("local value set");
        if let Some(binding) = &mut self.binding {
            let source = owner.binding_source();
            if !binding.write(source.as_deref(), &value) {
                tracing::trace!(
                    property = self.descriptor.name(),
                    "bound write dropped (no source or read-only)"
                );
            }
            return self.settle(owner);
        }
        self.local = Some(value);
        self.settle(owner)
    }

    #[must_use]
    pub(crate) fn set_styled(&mut self, owner: &DependencyObject, value: T) -> bool {
        self.styled = Some(value);
        self.settle(owner)
    }

    #[must_use]
    pub(crate) fn clear_local(&mut self, owner: &DependencyObject) -> bool {
        self.local = None;
        self.settle(owner)
    }

    #[must_use]
    pub(crate) fn clear_styled(&mut self, owner: &DependencyObject) -> bool {
        self.styled = None;
        self.settle(owner)
    }

    /// Attach a binding; rebinding the same expression is a no-op
    pub(crate) fn bind(
        &mut self,
        owner: &DependencyObject,
        view_model_type: &'static TypeInfo,
        expression: BindingExpression,
    ) -> Result<bool, BindingError> {
        if self
            .binding
            .as_ref()
            .is_some_and(|b| b.is_same(view_model_type, &expression))
        {
            return Ok(false);
        }
        let binding = Binding::new(view_model_type, expression)?;
        tracing::debug!(
            property = self.descriptor.name(),
            view_model = view_model_type.name(),
            expression = %binding.expression(),
            "bound property"
        );
        self.binding = Some(binding);
        Ok(self.settle(owner))
    }

    #[must_use]
    pub(crate) fn unbind(&mut self, owner: &DependencyObject) -> bool {
        let Some(binding) = self.binding.take() else {
            return false;
        };
        tracing::debug!(
            property = self.descriptor.name(),
            expression = %binding.expression(),
            "unbound property"
        );
        self.settle(owner)
    }

    /// Attach an animation seeded with the current resolved value
    #[must_use]
    pub(crate) fn animate(
        &mut self,
        owner: &DependencyObject,
        animation: AnimationRef<T>,
        clock: ClockRef,
    ) -> bool {
        if let Some(active) = &self.animation {
            if same_handle(&active.animation, &animation) && same_handle(&active.clock, &clock) {
                return false;
            }
        }
        let seed = self.resolve(owner);
        tracing::debug!(
            property = self.descriptor.name(),
            duration = ?animation.duration(),
            "animation attached"
        );
        self.animation = Some(ActiveAnimation {
            animation,
            clock,
            current: seed.clone(),
            seed,
        });
        self.settle(owner)
    }

    #[must_use]
    pub(crate) fn clear_animation(&mut self, owner: &DependencyObject) -> bool {
        self.clear_animation_state("cleared");
        self.settle(owner)
    }

    fn clear_animation_state(&mut self, reason: &'static str) {
        if self.animation.take().is_some() {
            tracing::debug!(property = self.descriptor.name(), reason, "animation detached");
        }
    }

    /// Re-invoke the default provider
    #[must_use]
    pub(crate) fn reset_default(&mut self, owner: &DependencyObject) -> bool {
        self.default = self.descriptor.default_value::<T>();
        self.settle(owner)
    }

    /// Advance animation, poll the binding and report whether the value changed
    pub(crate) fn digest(&mut self, owner: &DependencyObject, time: Duration) -> bool {
        if let Some(active) = &mut self.animation {
            let elapsed = active.clock.elapsed_time(time);
            active.current = active.animation.evaluate(elapsed, &active.seed);
        }

        let mut sticky_changed = false;
        if let Some(binding) = &mut self.binding {
            let before = binding.sticky().map(str::to_owned);
            let source = owner.binding_source();
            if binding.poll(source.as_deref()) {
                sticky_changed = binding.sticky() != before.as_deref();
            }
        }

        let current = self.resolve(owner);
        let changed = sticky_changed || !(self.same)(&current, &self.previous);
        if changed {
            tracing::trace!(
                property = self.descriptor.name(),
                from = ?self.previous,
                to = ?current,
                "digest observed change"
            );
        }
        self.previous = current;
        changed
    }
}

/// Type-erased view of a slot for storage in the owner's map
pub(crate) trait ErasedSlot {
    fn descriptor(&self) -> &Arc<PropertyDescriptor>;
    fn requires_digest(&self) -> bool;
    fn digest(&mut self, owner: &DependencyObject, time: Duration) -> bool;
    fn value_source(&self, owner: &DependencyObject) -> ValueSource;
    fn value(&self, owner: &DependencyObject) -> Value;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: PropertyType> ErasedSlot for ValueSlot<T> {
    fn descriptor(&self) -> &Arc<PropertyDescriptor> {
        &self.descriptor
    }

    fn requires_digest(&self) -> bool {
        self.requires_digest
    }

    fn digest(&mut self, owner: &DependencyObject, time: Duration) -> bool {
        ValueSlot::digest(self, owner, time)
    }

    fn value_source(&self, owner: &DependencyObject) -> ValueSource {
        ValueSlot::value_source(self, owner)
    }

    fn value(&self, owner: &DependencyObject) -> Value {
        self.get(owner).into_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
