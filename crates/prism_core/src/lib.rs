//! Prism Core
//!
//! Dependency properties, value resolution and compiled data bindings for a
//! retained-mode UI:
//!
//! - **Property Registry**: per-owner-type property declarations with lookup
//!   through the owner's base types
//! - **Value Slots**: per-object storage resolving animated, bound, local,
//!   styled, inherited and default values in a fixed order
//! - **Digest Cycle**: only slots that can change on their own (bound, animated,
//!   inherited) are re-evaluated each frame; everything else notifies eagerly
//! - **Data Binding**: `{{Path.To.Member}}` expressions compiled against
//!   view-model metadata into safe-navigation accessors with type conversion
//! - **Type Metadata**: by-name member and method descriptions standing in for
//!   runtime reflection
//!
//! # Example
//!
//! ```rust
//! use std::sync::LazyLock;
//! use prism_core::{
//!     dependency_object_type, register, DependencyObject, PropertyMetadata, TypeInfo,
//! };
//!
//! struct Slider;
//!
//! static SLIDER: LazyLock<TypeInfo> = LazyLock::new(|| {
//!     TypeInfo::class::<Slider>("Slider")
//!         .base(dependency_object_type())
//!         .build()
//! });
//!
//! let value = register::<f32>("Value", &SLIDER, PropertyMetadata::new().default_value(0.5f32))
//!     .unwrap();
//!
//! let slider = DependencyObject::new(&SLIDER).unwrap();
//! assert_eq!(slider.get_value(&value), 0.5);
//!
//! slider.set_value(&value, 0.8);
//! assert_eq!(slider.get_value(&value), 0.8);
//! ```

pub mod animation;
pub mod binding;
pub mod digest;
pub mod error;
pub mod geometry;
pub mod meta;
pub mod object;
pub mod registry;
pub mod slot;
pub mod value;

pub use animation::{Animation, AnimationRef, Clock, ClockRef};
pub use binding::{
    compile_event_binding, compile_getter, compile_setter, is_binding_expression,
    parse_components, BindingExpression, BoundAccessor, DelegateType, EventHandler, StaticView,
    View, ViewHost, WriteResult,
};
pub use digest::{DigestKey, DigestList};
pub use error::{BindingError, PropertyError, Result};
pub use geometry::{Color, Vec2};
pub use meta::{MemberInfo, MemberType, MethodInfo, TypeBuilder, TypeInfo};
pub use object::{dependency_object_type, DependencyObject};
pub use registry::{
    find_by_name, global_registry, register, DependencyProperty, PropertyDescriptor, PropertyId,
    PropertyMetadata, PropertyRegistry,
};
pub use slot::ValueSource;
pub use value::{
    convert_value, FormatKind, FormatSpec, Object, ObjectRef, PropertyType, TypeHandle, Value,
    ValueType,
};
