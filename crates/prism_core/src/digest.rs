//! Host-side digest list
//!
//! Objects with at least one slot that needs per-frame evaluation register
//! themselves here; everything else stays out of the frame loop. The host
//! calls [`DigestList::digest`] once per frame.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use slotmap::{new_key_type, SlotMap};

use crate::object::DependencyObject;

new_key_type! {
    /// Registration handle of an object in a digest list
    pub struct DigestKey;
}

/// Compact set of objects needing digestion
#[derive(Default)]
pub struct DigestList {
    entries: RefCell<SlotMap<DigestKey, Weak<DependencyObject>>>,
}

impl DigestList {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn insert(&self, object: Weak<DependencyObject>) -> DigestKey {
        self.entries.borrow_mut().insert(object)
    }

    pub(crate) fn remove(&self, key: DigestKey) {
        self.entries.borrow_mut().remove(key);
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Run one frame: digest every registered object at `time`
    ///
    /// The entry list is snapshotted first, so change callbacks may register
    /// or unregister objects; those changes take effect next frame.
    pub fn digest(&self, time: Duration) {
        let live: Vec<Rc<DependencyObject>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|_, object| object.strong_count() > 0);
            entries.values().filter_map(Weak::upgrade).collect()
        };
        tracing::trace!(objects = live.len(), ?time, "digest frame");
        for object in live {
            object.digest(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::TypeInfo;
    use crate::object::dependency_object_type;
    use crate::registry::{register, PropertyMetadata};
    use std::sync::LazyLock;

    struct Gauge;

    static GAUGE_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
        TypeInfo::class::<Gauge>("Gauge")
            .base(dependency_object_type())
            .build()
    });

    #[test]
    fn test_registration_follows_digest_need() {
        let level = register::<f32>(
            "DigestListLevel",
            &GAUGE_TYPE,
            PropertyMetadata::new().inherits(true),
        )
        .unwrap();
        let list = DigestList::new();
        let gauge = DependencyObject::new(&GAUGE_TYPE).unwrap();
        gauge.attach_digest_list(&list);
        assert!(list.is_empty());

        // Reading an inherited property with nothing set makes it digest-bound
        let _ = gauge.get_value(&level);
        assert_eq!(list.len(), 1);

        gauge.set_value(&level, 0.5);
        assert!(list.is_empty());

        gauge.clear_value(&level);
        assert_eq!(list.len(), 1);

        drop(gauge);
        assert!(list.is_empty());
    }

    #[test]
    fn test_digest_skips_dropped_objects() {
        let list = DigestList::new();
        let key = list.insert(Weak::new());
        assert_eq!(list.len(), 1);
        list.digest(Duration::ZERO);
        assert!(list.is_empty());
        list.remove(key);
    }
}
