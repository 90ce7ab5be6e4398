//! Type metadata for property owners and binding sources
//!
//! Rust has no runtime reflection, so every type that takes part in the
//! property system describes itself with a [`TypeInfo`]: its name, its base
//! type (for property declaration lookup), and the members and methods a
//! binding expression may reach by name. Member accessors are stored as
//! type-erased thunks that downcast the receiver themselves, which lets a
//! compiled binding walk a path without knowing the concrete types.
//!
//! ```ignore
//! static PLAYER: LazyLock<TypeInfo> = LazyLock::new(|| {
//!     TypeInfo::class::<PlayerViewModel>("PlayerViewModel")
//!         .property("Health", |vm| vm.health(), |vm, v| vm.set_health(v))
//!         .readonly("Name", |vm| vm.name())
//!         .object("Weapon", weapon_type, |vm| vm.weapon())
//!         .method("Heal", 1, |vm, args| vm.heal(args))
//!         .build()
//! });
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::value::{Object, ObjectRef, PropertyType, TypeHandle, Value};

/// Reads a member from a receiver; yields `Value::Null` if the receiver has the wrong type
pub type MemberGetter = Arc<dyn Fn(&Object) -> Value + Send + Sync>;

/// Writes a member on a receiver; silently ignores receivers or values of the wrong type
pub type MemberSetter = Arc<dyn Fn(&Object, Value) + Send + Sync>;

/// Invokes a method on a receiver with positional arguments
pub type MethodInvoker = Arc<dyn Fn(&Object, &[Value]) -> Value + Send + Sync>;

/// Lazily resolved type reference (metadata may be mutually recursive)
pub type TypeRef = fn() -> &'static TypeInfo;

/// What a member holds
#[derive(Clone, Copy)]
pub enum MemberType {
    /// A scalar property value
    Value(TypeHandle),
    /// A shared object reference (may be absent)
    Object(TypeRef),
    /// A value-type aggregate, copied out on every read
    Record(TypeRef),
}

impl MemberType {
    /// The type a path continues into, if this member can be navigated
    pub fn navigable(&self) -> Option<&'static TypeInfo> {
        match self {
            MemberType::Value(_) => None,
            MemberType::Object(ty) | MemberType::Record(ty) => Some(ty()),
        }
    }

    /// Handle used when the member is the target of a binding
    pub fn handle(&self) -> TypeHandle {
        match self {
            MemberType::Value(handle) => *handle,
            MemberType::Object(_) | MemberType::Record(_) => {
                TypeHandle::nullable(crate::value::ValueType::Object)
            }
        }
    }
}

impl fmt::Debug for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::Value(handle) => write!(f, "Value({handle})"),
            MemberType::Object(ty) => write!(f, "Object({})", ty().name()),
            MemberType::Record(ty) => write!(f, "Record({})", ty().name()),
        }
    }
}

/// A named member reachable from a binding path
pub struct MemberInfo {
    name: &'static str,
    ty: MemberType,
    getter: MemberGetter,
    setter: Option<MemberSetter>,
}

impl MemberInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn member_type(&self) -> MemberType {
        self.ty
    }

    pub fn getter(&self) -> &MemberGetter {
        &self.getter
    }

    /// `None` for read-only members
    pub fn setter(&self) -> Option<&MemberSetter> {
        self.setter.as_ref()
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// A named method invocable from an event binding
pub struct MethodInfo {
    name: &'static str,
    arity: usize,
    invoke: MethodInvoker,
}

impl MethodInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn invoker(&self) -> &MethodInvoker {
        &self.invoke
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Runtime description of a type
pub struct TypeInfo {
    name: &'static str,
    type_id: TypeId,
    base: Option<&'static TypeInfo>,
    value_type: bool,
    is_instance: fn(&Object) -> bool,
    members: SmallVec<[MemberInfo; 4]>,
    methods: SmallVec<[MethodInfo; 2]>,
}

impl TypeInfo {
    /// Describe a reference type
    pub fn class<O: Any>(name: &'static str) -> TypeBuilder<O> {
        TypeBuilder::new(name, false)
    }

    /// Describe a value type; members reached through it cannot be assigned
    pub fn record<O: Any>(name: &'static str) -> TypeBuilder<O> {
        TypeBuilder::new(name, true)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn base(&self) -> Option<&'static TypeInfo> {
        self.base
    }

    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    /// Whether an object is an instance of the described type
    pub fn is_instance(&self, object: &Object) -> bool {
        (self.is_instance)(object)
    }

    /// This type followed by its ancestors, most derived first
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static TypeInfo> {
        std::iter::successors(Some(self), |ty| ty.base)
    }

    /// Whether `other` is this type or one of its ancestors
    pub fn is_a(&'static self, other: &TypeInfo) -> bool {
        self.ancestry().any(|ty| ty.type_id == other.type_id)
    }

    /// Look up a member declared on this type
    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    /// Methods with the given name, any arity
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("base", &self.base.map(|b| b.name))
            .field("value_type", &self.value_type)
            .field("members", &self.members)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder for [`TypeInfo`]
pub struct TypeBuilder<O> {
    info: TypeInfo,
    _marker: PhantomData<fn(&O)>,
}

impl<O: Any> TypeBuilder<O> {
    fn new(name: &'static str, value_type: bool) -> Self {
        Self {
            info: TypeInfo {
                name,
                type_id: TypeId::of::<O>(),
                base: None,
                value_type,
                is_instance: |object: &Object| object.is::<O>(),
                members: SmallVec::new(),
                methods: SmallVec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Set the base type used for property declaration lookup
    pub fn base(mut self, base: &'static TypeInfo) -> Self {
        self.info.base = Some(base);
        self
    }

    /// Add a read/write scalar member
    pub fn property<T, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        T: PropertyType,
        G: Fn(&O) -> T + Send + Sync + 'static,
        S: Fn(&O, T) + Send + Sync + 'static,
    {
        let setter: MemberSetter = Arc::new(move |object: &Object, value: Value| {
            if let (Some(receiver), Some(value)) = (object.downcast_ref::<O>(), T::from_value(value))
            {
                set(receiver, value);
            }
        });
        self.push_member(
            name,
            MemberType::Value(T::type_handle()),
            scalar_getter(get),
            Some(setter),
        )
    }

    /// Add a read-only scalar member
    pub fn readonly<T, G>(self, name: &'static str, get: G) -> Self
    where
        T: PropertyType,
        G: Fn(&O) -> T + Send + Sync + 'static,
    {
        self.push_member(name, MemberType::Value(T::type_handle()), scalar_getter(get), None)
    }

    /// Add a member holding a shared object reference
    pub fn object<C, G>(self, name: &'static str, ty: TypeRef, get: G) -> Self
    where
        C: Any + Send + Sync,
        G: Fn(&O) -> Option<Arc<C>> + Send + Sync + 'static,
    {
        let getter: MemberGetter = Arc::new(move |object: &Object| {
            object
                .downcast_ref::<O>()
                .and_then(&get)
                .map_or(Value::Null, |child| Value::Object(child as ObjectRef))
        });
        self.push_member(name, MemberType::Object(ty), getter, None)
    }

    /// Add a member holding a value-type aggregate, copied out on read
    pub fn record_member<C, G>(self, name: &'static str, ty: TypeRef, get: G) -> Self
    where
        C: Any + Send + Sync,
        G: Fn(&O) -> C + Send + Sync + 'static,
    {
        let getter: MemberGetter = Arc::new(move |object: &Object| {
            object
                .downcast_ref::<O>()
                .map_or(Value::Null, |receiver| {
                    Value::Object(Arc::new(get(receiver)) as ObjectRef)
                })
        });
        self.push_member(name, MemberType::Record(ty), getter, None)
    }

    /// Add a method callable from an event binding
    pub fn method<F>(mut self, name: &'static str, arity: usize, invoke: F) -> Self
    where
        F: Fn(&O, &[Value]) -> Value + Send + Sync + 'static,
    {
        let invoke: MethodInvoker = Arc::new(move |object: &Object, args: &[Value]| {
            object
                .downcast_ref::<O>()
                .map_or(Value::Null, |receiver| invoke(receiver, args))
        });
        self.info.methods.push(MethodInfo {
            name,
            arity,
            invoke,
        });
        self
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }

    fn push_member(
        mut self,
        name: &'static str,
        ty: MemberType,
        getter: MemberGetter,
        setter: Option<MemberSetter>,
    ) -> Self {
        self.info.members.push(MemberInfo {
            name,
            ty,
            getter,
            setter,
        });
        self
    }
}

fn scalar_getter<O, T, G>(get: G) -> MemberGetter
where
    O: Any,
    T: PropertyType,
    G: Fn(&O) -> T + Send + Sync + 'static,
{
    Arc::new(move |object: &Object| {
        object
            .downcast_ref::<O>()
            .map_or(Value::Null, |receiver| get(receiver).into_value())
    })
}
