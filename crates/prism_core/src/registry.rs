//! Property registration and lookup
//!
//! Properties are declared once per owner type and looked up by name with a
//! walk up the owner's base chain, so a derived type sees every property its
//! ancestors declare. Registration normally happens during startup, before any
//! lookups; the registry still guards its map with one coarse reader/writer
//! lock so late registration (plugins, tests) stays sound.
//!
//! # Example
//!
//! ```ignore
//! use prism_core::registry::{register, PropertyMetadata};
//!
//! static OPACITY: LazyLock<DependencyProperty<f32>> = LazyLock::new(|| {
//!     register("Opacity", widget_type(), PropertyMetadata::new().default_value(1.0f32))
//!         .expect("Opacity registered twice")
//! });
//! ```

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, OnceLock, RwLock};

use rustc_hash::FxHashMap;

use crate::error::{PropertyError, Result};
use crate::meta::TypeInfo;
use crate::object::{dependency_object_type, DependencyObject};
use crate::value::{convert_value, PropertyType, TypeHandle, Value};

/// Monotonic id source shared by every registry; ids are never recycled
static NEXT_PROPERTY_ID: AtomicU32 = AtomicU32::new(1);

/// Globally unique property identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(u32);

impl PropertyId {
    fn next() -> Self {
        PropertyId(NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Invoked with the owning object whenever the resolved value changes
pub type PropertyChangedCallback = Arc<dyn Fn(&DependencyObject) + Send + Sync>;

/// Produces the fallback value of a property
pub type PropertyDefaultCallback = Arc<dyn Fn() -> Value + Send + Sync>;

/// Optional behavior attached to a property at registration
#[derive(Clone, Default)]
pub struct PropertyMetadata {
    default: Option<PropertyDefaultCallback>,
    changed: Option<PropertyChangedCallback>,
    inherits: bool,
}

impl PropertyMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a constant default value
    pub fn default_value<T: PropertyType>(self, value: T) -> Self {
        self.default_with(move || value.clone().into_value())
    }

    /// Compute the default value on demand
    pub fn default_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(provider));
        self
    }

    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DependencyObject) + Send + Sync + 'static,
    {
        self.changed = Some(Arc::new(callback));
        self
    }

    /// Fall back to the nearest ancestor's value when nothing is set locally
    pub fn inherits(mut self, inherits: bool) -> Self {
        self.inherits = inherits;
        self
    }

    pub fn is_inherited(&self) -> bool {
        self.inherits
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn notify_changed(&self, owner: &DependencyObject) {
        if let Some(callback) = &self.changed {
            callback(owner);
        }
    }
}

impl fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("has_default", &self.default.is_some())
            .field("has_changed_callback", &self.changed.is_some())
            .field("inherits", &self.inherits)
            .finish()
    }
}

/// Immutable identity and metadata of one registered property
pub struct PropertyDescriptor {
    id: PropertyId,
    name: String,
    owner: &'static TypeInfo,
    value_type: TypeHandle,
    /// Rust type behind the handle; untyped registrations pin it on first typed access
    rust_type: OnceLock<(TypeId, &'static str)>,
    metadata: PropertyMetadata,
}

impl PropertyDescriptor {
    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &'static TypeInfo {
        self.owner
    }

    pub fn value_type(&self) -> TypeHandle {
        self.value_type
    }

    pub fn metadata(&self) -> &PropertyMetadata {
        &self.metadata
    }

    pub fn is_inherited(&self) -> bool {
        self.metadata.inherits
    }

    /// Evaluate the default provider, falling back to the type's zero value
    pub fn default_value<T: PropertyType>(&self) -> T {
        self.metadata
            .default
            .as_ref()
            .and_then(|provider| convert_value::<T>(provider()))
            .unwrap_or_else(T::zero)
    }

    /// Runtime type check for untyped access
    ///
    /// Several Rust types can share a handle (`Option<Option<f32>>` and
    /// `Option<f32>`), so the exact Rust type is compared as well.
    pub fn check_type<T: PropertyType>(&self) -> Result<()> {
        let actual = T::type_handle();
        if actual != self.value_type {
            return Err(PropertyError::TypeMismatch {
                property: self.name.clone(),
                expected: self.value_type.to_string(),
                actual: actual.to_string(),
            });
        }
        let (pinned, pinned_name) = *self
            .rust_type
            .get_or_init(|| (TypeId::of::<T>(), type_name::<T>()));
        if pinned == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(self.rust_type_mismatch::<T>(pinned_name))
        }
    }

    pub(crate) fn rust_type_mismatch<T: PropertyType>(&self, expected: &str) -> PropertyError {
        PropertyError::TypeMismatch {
            property: self.name.clone(),
            expected: expected.to_string(),
            actual: type_name::<T>().to_string(),
        }
    }

    /// Name of the Rust type the property is pinned to, if any
    pub fn rust_type_name(&self) -> Option<&'static str> {
        self.rust_type.get().map(|(_, name)| *name)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("owner", &self.owner.name())
            .field("value_type", &self.value_type)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Typed handle to a registered property (cheap to clone)
pub struct DependencyProperty<T> {
    descriptor: Arc<PropertyDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DependencyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            _marker: PhantomData,
        }
    }
}

impl<T: PropertyType> DependencyProperty<T> {
    /// Wrap an untyped descriptor after checking its value type
    pub fn from_descriptor(descriptor: Arc<PropertyDescriptor>) -> Result<Self> {
        descriptor.check_type::<T>()?;
        Ok(Self {
            descriptor,
            _marker: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &Arc<PropertyDescriptor> {
        &self.descriptor
    }
}

impl<T> Deref for DependencyProperty<T> {
    type Target = PropertyDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.descriptor
    }
}

impl<T> fmt::Debug for DependencyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DependencyProperty")
            .field(&self.descriptor)
            .finish()
    }
}

type PropertyTable = FxHashMap<String, Arc<PropertyDescriptor>>;

/// Per-owner-type property tables
pub struct PropertyRegistry {
    types: RwLock<FxHashMap<TypeId, PropertyTable>>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a property on an owner type
    ///
    /// Fails if the name already exists on that exact type. Names declared on
    /// ancestors may be reused; lookups then find the most derived one. The
    /// Rust value type is fixed by the first typed access.
    pub fn register(
        &self,
        name: &str,
        value_type: TypeHandle,
        owner: &'static TypeInfo,
        metadata: PropertyMetadata,
    ) -> Result<Arc<PropertyDescriptor>> {
        self.insert(name, value_type, OnceLock::new(), owner, metadata)
    }

    fn insert(
        &self,
        name: &str,
        value_type: TypeHandle,
        rust_type: OnceLock<(TypeId, &'static str)>,
        owner: &'static TypeInfo,
        metadata: PropertyMetadata,
    ) -> Result<Arc<PropertyDescriptor>> {
        ensure_participant(owner)?;

        let mut types = self.types.write().unwrap();
        let table = types.entry(owner.type_id()).or_default();
        if table.contains_key(name) {
            return Err(PropertyError::DuplicateRegistration {
                owner: owner.name(),
                name: name.to_string(),
            });
        }

        let descriptor = Arc::new(PropertyDescriptor {
            id: PropertyId::next(),
            name: name.to_string(),
            owner,
            value_type,
            rust_type,
            metadata,
        });
        table.insert(name.to_string(), Arc::clone(&descriptor));

        tracing::debug!(
            property = name,
            owner = owner.name(),
            id = %descriptor.id,
            value_type = %value_type,
            "registered property"
        );
        Ok(descriptor)
    }

    /// Typed registration
    pub fn register_typed<T: PropertyType>(
        &self,
        name: &str,
        owner: &'static TypeInfo,
        metadata: PropertyMetadata,
    ) -> Result<DependencyProperty<T>> {
        let rust_type = OnceLock::from((TypeId::of::<T>(), type_name::<T>()));
        let descriptor = self.insert(name, T::type_handle(), rust_type, owner, metadata)?;
        Ok(DependencyProperty {
            descriptor,
            _marker: PhantomData,
        })
    }

    /// Find a property by name on an owner type or its ancestors
    ///
    /// `Ok(None)` means the hierarchy was exhausted without a match.
    pub fn find_by_name(
        &self,
        name: &str,
        owner: &'static TypeInfo,
    ) -> Result<Option<Arc<PropertyDescriptor>>> {
        ensure_participant(owner)?;

        let types = self.types.read().unwrap();
        Ok(owner.ancestry().find_map(|ty| {
            types
                .get(&ty.type_id())
                .and_then(|table| table.get(name))
                .cloned()
        }))
    }

    /// Properties declared directly on an owner type (not its ancestors)
    pub fn declared_on(&self, owner: &'static TypeInfo) -> Vec<Arc<PropertyDescriptor>> {
        let types = self.types.read().unwrap();
        let mut props: Vec<_> = types
            .get(&owner.type_id())
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        props.sort_by_key(|p| p.id);
        props
    }
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_participant(owner: &'static TypeInfo) -> Result<()> {
    if owner.is_a(dependency_object_type()) {
        Ok(())
    } else {
        Err(PropertyError::NotAParticipant(owner.name()))
    }
}

// =============================================================================
// GLOBAL REGISTRY
// =============================================================================

static GLOBAL_REGISTRY: LazyLock<PropertyRegistry> = LazyLock::new(PropertyRegistry::new);

/// The process-wide registry
pub fn global_registry() -> &'static PropertyRegistry {
    &GLOBAL_REGISTRY
}

/// Register a typed property in the global registry
pub fn register<T: PropertyType>(
    name: &str,
    owner: &'static TypeInfo,
    metadata: PropertyMetadata,
) -> Result<DependencyProperty<T>> {
    GLOBAL_REGISTRY.register_typed(name, owner, metadata)
}

/// Look up a property by name in the global registry
pub fn find_by_name(
    name: &str,
    owner: &'static TypeInfo,
) -> Result<Option<Arc<PropertyDescriptor>>> {
    GLOBAL_REGISTRY.find_by_name(name, owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Element;
    struct Button;
    struct ViewModel;

    static ELEMENT_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
        TypeInfo::class::<Element>("Element")
            .base(dependency_object_type())
            .build()
    });

    static BUTTON_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
        TypeInfo::class::<Button>("Button")
            .base(&ELEMENT_TYPE)
            .build()
    });

    static VIEW_MODEL_TYPE: LazyLock<TypeInfo> =
        LazyLock::new(|| TypeInfo::class::<ViewModel>("ViewModel").build());

    #[test]
    fn test_register_rejects_duplicate_on_same_owner() {
        let registry = PropertyRegistry::new();
        let first = registry
            .register_typed::<f32>("Width", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();

        let err = registry
            .register_typed::<f32>("Width", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::DuplicateRegistration {
                owner: "Element",
                name: "Width".into()
            }
        );

        // Same name, different owner: allowed, distinct id
        let shadow = registry
            .register_typed::<f32>("Width", &BUTTON_TYPE, PropertyMetadata::new())
            .unwrap();
        assert_ne!(first.id(), shadow.id());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let registry = PropertyRegistry::new();
        let a = registry
            .register("A", f32::type_handle(), &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();
        let b = registry
            .register("B", f32::type_handle(), &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_find_walks_to_base() {
        let registry = PropertyRegistry::new();
        let foo = registry
            .register_typed::<i32>("Foo", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();

        let found = registry.find_by_name("Foo", &BUTTON_TYPE).unwrap().unwrap();
        assert_eq!(found.id(), foo.id());
        assert!(registry.find_by_name("Bar", &BUTTON_TYPE).unwrap().is_none());
    }

    #[test]
    fn test_find_prefers_most_derived() {
        let registry = PropertyRegistry::new();
        registry
            .register_typed::<i32>("Tag", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();
        let derived = registry
            .register_typed::<String>("Tag", &BUTTON_TYPE, PropertyMetadata::new())
            .unwrap();

        let found = registry.find_by_name("Tag", &BUTTON_TYPE).unwrap().unwrap();
        assert_eq!(found.id(), derived.id());
    }

    #[test]
    fn test_non_participant_rejected() {
        let registry = PropertyRegistry::new();
        assert_eq!(
            registry.find_by_name("Foo", &VIEW_MODEL_TYPE).unwrap_err(),
            PropertyError::NotAParticipant("ViewModel")
        );
        assert!(registry
            .register_typed::<i32>("Foo", &VIEW_MODEL_TYPE, PropertyMetadata::new())
            .is_err());
    }

    #[test]
    fn test_default_value_and_type_check() {
        let registry = PropertyRegistry::new();
        let prop = registry
            .register_typed::<f32>(
                "Opacity",
                &ELEMENT_TYPE,
                PropertyMetadata::new().default_value(1.0f32),
            )
            .unwrap();

        assert_eq!(prop.default_value::<f32>(), 1.0);
        assert!(prop.check_type::<f32>().is_ok());
        assert!(matches!(
            prop.check_type::<i32>(),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert!(DependencyProperty::<f64>::from_descriptor(prop.descriptor().clone()).is_err());
    }

    #[test]
    fn test_type_check_compares_rust_type() {
        let registry = PropertyRegistry::new();
        let level = registry
            .register_typed::<Option<f32>>("Level", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();
        assert!(level.check_type::<Option<f32>>().is_ok());
        assert_eq!(
            level.check_type::<Option<Option<f32>>>().unwrap_err(),
            PropertyError::TypeMismatch {
                property: "Level".into(),
                expected: std::any::type_name::<Option<f32>>().into(),
                actual: std::any::type_name::<Option<Option<f32>>>().into(),
            }
        );
    }

    #[test]
    fn test_default_provider_converts() {
        let registry = PropertyRegistry::new();
        let prop = registry
            .register_typed::<f64>(
                "Scale",
                &ELEMENT_TYPE,
                PropertyMetadata::new().default_with(|| Value::Int32(2)),
            )
            .unwrap();
        assert_eq!(prop.default_value::<f64>(), 2.0);
    }

    #[test]
    fn test_declared_on_excludes_ancestors() {
        let registry = PropertyRegistry::new();
        registry
            .register_typed::<i32>("Base", &ELEMENT_TYPE, PropertyMetadata::new())
            .unwrap();
        registry
            .register_typed::<i32>("Own", &BUTTON_TYPE, PropertyMetadata::new())
            .unwrap();

        let names: Vec<_> = registry
            .declared_on(&BUTTON_TYPE)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Own".to_string()]);
    }
}
