//! Dependency objects
//!
//! A [`DependencyObject`] is the per-element container of property values. It
//! owns a sparse map from property id to value slot, creating
//! slots on first use, and tracks which of them need per-frame digestion so a
//! [`DigestList`] only ever visits objects that have work to do.
//!
//! Objects are single-threaded and shared through `Rc`. They form a parent
//! chain used for value inheritance and for finding the view whose view-model
//! bindings read from.
//!
//! ```ignore
//! let button = DependencyObject::new(&BUTTON_TYPE)?;
//! button.set_value(&OPACITY, 0.5);
//! button.bind(&BRIGHTNESS, &SETTINGS_TYPE, "{{Display.Brightness}}")?;
//! digest_list.digest(frame_time);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::animation::{AnimationRef, ClockRef};
use crate::binding::{BindingExpression, View, ViewHost};
use crate::digest::{DigestKey, DigestList};
use crate::error::{PropertyError, Result};
use crate::meta::TypeInfo;
use crate::registry::{self, DependencyProperty, PropertyDescriptor, PropertyId};
use crate::slot::{ErasedSlot, ValueSlot, ValueSource};
use crate::value::{ObjectRef, PropertyType, Value};

static DEPENDENCY_OBJECT_TYPE: LazyLock<TypeInfo> =
    LazyLock::new(|| TypeInfo::class::<DependencyObject>("DependencyObject").build());

/// Root of every type that can own dependency properties
pub fn dependency_object_type() -> &'static TypeInfo {
    &DEPENDENCY_OBJECT_TYPE
}

/// Per-element property container
pub struct DependencyObject {
    type_info: &'static TypeInfo,
    this: Weak<DependencyObject>,
    parent: RefCell<Weak<DependencyObject>>,
    view: RefCell<Option<Arc<dyn View>>>,
    slots: RefCell<FxHashMap<PropertyId, Box<dyn ErasedSlot>>>,
    /// Slots whose requires-digest flag is set
    digest_set: RefCell<SmallVec<[PropertyId; 4]>>,
    digest_list: RefCell<Option<Rc<DigestList>>>,
    digest_key: Cell<Option<DigestKey>>,
}

impl DependencyObject {
    /// Create an object of a participating type
    pub fn new(type_info: &'static TypeInfo) -> Result<Rc<Self>> {
        if !type_info.is_a(dependency_object_type()) {
            return Err(PropertyError::NotAParticipant(type_info.name()));
        }
        Ok(Rc::new_cyclic(|this| Self {
            type_info,
            this: this.clone(),
            parent: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            slots: RefCell::new(FxHashMap::default()),
            digest_set: RefCell::new(SmallVec::new()),
            digest_list: RefCell::new(None),
            digest_key: Cell::new(None),
        }))
    }

    pub fn type_info(&self) -> &'static TypeInfo {
        self.type_info
    }

    /// Find a property declared on this object's type or its ancestors
    pub fn find_property(&self, name: &str) -> Result<Option<Arc<PropertyDescriptor>>> {
        registry::find_by_name(name, self.type_info)
    }

    // =========================================================================
    // Tree
    // =========================================================================

    pub fn parent(&self) -> Option<Rc<DependencyObject>> {
        self.parent.borrow().upgrade()
    }

    /// Set or clear the parent; a parent that would create a cycle is rejected
    pub fn set_parent(&self, parent: Option<&Rc<DependencyObject>>) -> bool {
        if let Some(parent) = parent {
            let cyclic = std::iter::successors(Some(Rc::clone(parent)), |node| node.parent())
                .any(|node| std::ptr::eq(&*node, self));
            if cyclic {
                tracing::warn!(ty = self.type_info.name(), "rejected parent that would create a cycle");
                return false;
            }
        }
        *self.parent.borrow_mut() = parent.map_or_else(Weak::new, Rc::downgrade);
        true
    }

    fn ancestors(&self) -> impl Iterator<Item = Rc<DependencyObject>> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// Nearest ancestor value of an inherited property
    pub(crate) fn inherited_value<T: PropertyType>(&self, id: PropertyId) -> Option<T> {
        self.ancestors().find_map(|ancestor| ancestor.slot_value::<T>(id))
    }

    fn slot_value<T: PropertyType>(&self, id: PropertyId) -> Option<T> {
        let slots = self.slots.try_borrow().ok()?;
        slots
            .get(&id)?
            .as_any()
            .downcast_ref::<ValueSlot<T>>()
            .map(|slot| slot.get(self))
    }

    // =========================================================================
    // View
    // =========================================================================

    pub fn set_view(&self, view: Option<Arc<dyn View>>) {
        *self.view.borrow_mut() = view;
    }

    /// The view-model bindings on this object read from
    pub fn binding_source(&self) -> Option<ObjectRef> {
        self.view().and_then(|view| view.view_model())
    }

    // =========================================================================
    // Slot access
    // =========================================================================

    /// Run `f` on the slot for `descriptor`, creating it on first use
    ///
    /// The slot map is released before the digest set is updated and before
    /// the caller fires any change callback. A slot created for a different
    /// Rust type is reported as a type mismatch.
    fn with_slot<T, R>(
        &self,
        descriptor: &Arc<PropertyDescriptor>,
        f: impl FnOnce(&mut ValueSlot<T>, &DependencyObject) -> R,
    ) -> Result<R>
    where
        T: PropertyType,
    {
        let id = descriptor.id();
        let (result, requires_digest) = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots
                .entry(id)
                .or_insert_with(|| {
                    Box::new(ValueSlot::<T>::new(Arc::clone(descriptor), self)) as Box<dyn ErasedSlot>
                });
            let Some(slot) = slot.as_any_mut().downcast_mut::<ValueSlot<T>>() else {
                let expected = descriptor.rust_type_name().unwrap_or("another type");
                return Err(descriptor.rust_type_mismatch::<T>(expected));
            };
            let result = f(slot, self);
            (result, slot.requires_digest())
        };
        self.update_digest_membership(id, requires_digest);
        Ok(result)
    }

    /// Typed handles are pinned to their Rust type, so a rejection here means
    /// the handle was forged from a descriptor used with another type
    fn or_rejected<R>(
        &self,
        descriptor: &PropertyDescriptor,
        result: Result<R>,
        fallback: impl FnOnce() -> R,
    ) -> R {
        result.unwrap_or_else(|err| {
            tracing::error!(property = descriptor.name(), %err, "typed property access rejected");
            fallback()
        })
    }

    fn notify_changed(&self, descriptor: &PropertyDescriptor) {
        tracing::trace!(property = descriptor.name(), id = %descriptor.id(), "property changed");
        descriptor.metadata().notify_changed(self);
    }

    fn mutate<T: PropertyType>(
        &self,
        descriptor: &Arc<PropertyDescriptor>,
        f: impl FnOnce(&mut ValueSlot<T>, &DependencyObject) -> bool,
    ) -> Result<()> {
        if self.with_slot(descriptor, f)? {
            self.notify_changed(descriptor);
        }
        Ok(())
    }

    fn mutate_typed<T: PropertyType>(
        &self,
        property: &DependencyProperty<T>,
        f: impl FnOnce(&mut ValueSlot<T>, &DependencyObject) -> bool,
    ) {
        let descriptor = property.descriptor();
        let result = self.mutate(descriptor, f);
        self.or_rejected(descriptor, result, || ());
    }

    // =========================================================================
    // Typed API
    // =========================================================================

    /// Resolved value as of the last digest
    pub fn get_value<T: PropertyType>(&self, property: &DependencyProperty<T>) -> T {
        let descriptor = property.descriptor();
        let result = self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| slot.get(owner));
        self.or_rejected(descriptor, result, || descriptor.default_value())
    }

    /// Value from non-animated sources with bindings read live
    pub fn get_fresh_value<T: PropertyType>(&self, property: &DependencyProperty<T>) -> T {
        let descriptor = property.descriptor();
        let result = self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| {
            slot.get_fresh(owner)
        });
        self.or_rejected(descriptor, result, || descriptor.default_value())
    }

    /// Display string, including text a binding could not convert
    pub fn get_string<T: PropertyType>(&self, property: &DependencyProperty<T>) -> String {
        let descriptor = property.descriptor();
        let result = self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| {
            slot.get_string(owner)
        });
        self.or_rejected(descriptor, result, String::new)
    }

    pub fn value_source<T: PropertyType>(&self, property: &DependencyProperty<T>) -> ValueSource {
        let descriptor = property.descriptor();
        let result = self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| {
            slot.value_source(owner)
        });
        self.or_rejected(descriptor, result, || ValueSource::Default)
    }

    /// Set the local value (or write through the binding if bound)
    pub fn set_value<T: PropertyType>(&self, property: &DependencyProperty<T>, value: T) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| {
            slot.set_local(owner, value)
        });
    }

    pub fn set_styled<T: PropertyType>(&self, property: &DependencyProperty<T>, value: T) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| {
            slot.set_styled(owner, value)
        });
    }

    pub fn clear_value<T: PropertyType>(&self, property: &DependencyProperty<T>) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| slot.clear_local(owner));
    }

    pub fn clear_styled<T: PropertyType>(&self, property: &DependencyProperty<T>) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| slot.clear_styled(owner));
    }

    /// Bind a property to a view-model member path
    ///
    /// The `{{ }}` delimiters are optional here.
    pub fn bind<T: PropertyType>(
        &self,
        property: &DependencyProperty<T>,
        view_model_type: &'static TypeInfo,
        expression: &str,
    ) -> Result<()> {
        let expression = BindingExpression::parse(expression, false)?;
        let descriptor = property.descriptor();
        let notify = self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| {
            slot.bind(owner, view_model_type, expression)
        })??;
        if notify {
            self.notify_changed(descriptor);
        }
        Ok(())
    }

    pub fn unbind<T: PropertyType>(&self, property: &DependencyProperty<T>) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| slot.unbind(owner));
    }

    /// Drive a property from an animation; the current value seeds it
    pub fn animate<T: PropertyType>(
        &self,
        property: &DependencyProperty<T>,
        animation: AnimationRef<T>,
        clock: ClockRef,
    ) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| {
            slot.animate(owner, animation, clock)
        });
    }

    pub fn clear_animation<T: PropertyType>(&self, property: &DependencyProperty<T>) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| {
            slot.clear_animation(owner)
        });
    }

    /// Re-run the property's default provider
    pub fn reset_default<T: PropertyType>(&self, property: &DependencyProperty<T>) {
        self.mutate_typed(property, |slot: &mut ValueSlot<T>, owner| {
            slot.reset_default(owner)
        });
    }

    // =========================================================================
    // Untyped API
    // =========================================================================

    /// Typed read through an untyped descriptor, checked against its value type
    pub fn try_get_value<T: PropertyType>(&self, descriptor: &Arc<PropertyDescriptor>) -> Result<T> {
        descriptor.check_type::<T>()?;
        self.with_slot(descriptor, |slot: &mut ValueSlot<T>, owner| slot.get(owner))
    }

    pub fn try_set_value<T: PropertyType>(
        &self,
        descriptor: &Arc<PropertyDescriptor>,
        value: T,
    ) -> Result<()> {
        descriptor.check_type::<T>()?;
        self.mutate(descriptor, |slot: &mut ValueSlot<T>, owner| slot.set_local(owner, value))
    }

    pub fn try_clear_value<T: PropertyType>(&self, descriptor: &Arc<PropertyDescriptor>) -> Result<()> {
        descriptor.check_type::<T>()?;
        self.mutate(descriptor, |slot: &mut ValueSlot<T>, owner| slot.clear_local(owner))
    }

    /// Current value of an existing slot as a dynamic value
    pub fn get_untyped(&self, descriptor: &PropertyDescriptor) -> Option<Value> {
        let slots = self.slots.borrow();
        slots.get(&descriptor.id()).map(|slot| slot.value(self))
    }

    /// Whether a slot exists for the property
    pub fn has_slot(&self, descriptor: &PropertyDescriptor) -> bool {
        self.slots.borrow().contains_key(&descriptor.id())
    }

    // =========================================================================
    // Digest
    // =========================================================================

    /// Whether any slot needs per-frame evaluation
    pub fn requires_digest(&self) -> bool {
        !self.digest_set.borrow().is_empty()
    }

    /// Evaluate every slot that requires it and fire change callbacks
    pub fn digest(&self, time: Duration) {
        let pending: SmallVec<[PropertyId; 4]> = self.digest_set.borrow().clone();
        for id in pending {
            let outcome = {
                let mut slots = self.slots.borrow_mut();
                let Some(slot) = slots.get_mut(&id) else {
                    continue;
                };
                let changed = slot.digest(self, time);
                (changed, slot.requires_digest(), Arc::clone(slot.descriptor()))
            };
            let (changed, requires_digest, descriptor) = outcome;
            self.update_digest_membership(id, requires_digest);
            if changed {
                self.notify_changed(&descriptor);
            }
        }
    }

    /// Register with a host digest list (replacing any previous one)
    pub fn attach_digest_list(&self, list: &Rc<DigestList>) {
        self.detach_digest_list();
        *self.digest_list.borrow_mut() = Some(Rc::clone(list));
        if self.requires_digest() {
            self.register_for_digest();
        }
    }

    pub fn detach_digest_list(&self) {
        self.unregister_from_digest();
        self.digest_list.borrow_mut().take();
    }

    fn update_digest_membership(&self, id: PropertyId, requires_digest: bool) {
        let (was_empty, is_empty) = {
            let mut set = self.digest_set.borrow_mut();
            let was_empty = set.is_empty();
            match (requires_digest, set.iter().position(|p| *p == id)) {
                (true, None) => set.push(id),
                (false, Some(index)) => {
                    set.swap_remove(index);
                }
                _ => {}
            }
            (was_empty, set.is_empty())
        };
        if was_empty && !is_empty {
            self.register_for_digest();
        } else if !was_empty && is_empty {
            self.unregister_from_digest();
        }
    }

    fn register_for_digest(&self) {
        if self.digest_key.get().is_some() {
            return;
        }
        if let Some(list) = self.digest_list.borrow().as_ref() {
            self.digest_key.set(Some(list.insert(self.this.clone())));
            tracing::debug!(ty = self.type_info.name(), "registered with digest list");
        }
    }

    fn unregister_from_digest(&self) {
        let Some(key) = self.digest_key.take() else {
            return;
        };
        if let Some(list) = self.digest_list.borrow().as_ref() {
            list.remove(key);
            tracing::debug!(ty = self.type_info.name(), "unregistered from digest list");
        }
    }
}

impl ViewHost for DependencyObject {
    /// Own view, else the nearest ancestor's
    fn view(&self) -> Option<Arc<dyn View>> {
        self.view
            .borrow()
            .clone()
            .or_else(|| self.ancestors().find_map(|node| node.view.borrow().clone()))
    }
}

impl Drop for DependencyObject {
    fn drop(&mut self) {
        if let (Some(key), Some(list)) = (self.digest_key.take(), self.digest_list.get_mut().take()) {
            list.remove(key);
        }
    }
}

impl fmt::Debug for DependencyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyObject")
            .field("type", &self.type_info.name())
            .field("slots", &self.slots.borrow().len())
            .field("digest_set", &self.digest_set.borrow().len())
            .finish()
    }
}
