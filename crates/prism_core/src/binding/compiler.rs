//! Binding compiler
//!
//! Resolves a [`BindingExpression`] against view-model metadata once and
//! produces closures over the resolved member thunks. The root cast is not
//! performed at compile time: one compiled accessor serves every instance of
//! the view-model type, and a source of the wrong type simply reads as null.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::BindingError;
use crate::meta::{MemberGetter, MemberInfo, TypeInfo};
use crate::value::{convert_value, Object, ObjectRef, PropertyType, TypeHandle, Value};

use super::expression::BindingExpression;
use super::ViewHost;

/// Untyped read of a bound member
pub type RawGetter = Arc<dyn Fn(&Object) -> Value + Send + Sync>;

/// Untyped write of a bound member
pub type RawSetter = Arc<dyn Fn(&Object, Value) + Send + Sync>;

pub type TypedGetter<T> = Arc<dyn Fn(&Object) -> T + Send + Sync>;

pub type TypedSetter<T> = Arc<dyn Fn(&Object, T) + Send + Sync>;

/// Compiled event handler; forwards the delegate's arguments to the bound method
pub type EventHandler = Box<dyn Fn(&[Value]) -> Value>;

/// Shape of an event delegate: a name for diagnostics and its parameter count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegateType {
    pub name: &'static str,
    pub arity: usize,
}

impl DelegateType {
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Path resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Safe-navigation walk from a root object through object-valued members
#[derive(Clone)]
struct Navigator {
    root: &'static TypeInfo,
    links: SmallVec<[MemberGetter; 4]>,
}

impl Navigator {
    /// Run `f` on the final receiver, or return `None` if the root has the
    /// wrong type or any link is null
    fn visit<R>(&self, source: &Object, f: impl FnOnce(&Object) -> R) -> Option<R> {
        if !self.root.is_instance(source) {
            return None;
        }
        let mut holder: Option<ObjectRef> = None;
        for link in &self.links {
            let receiver: &Object = holder.as_deref().unwrap_or(source);
            match link(receiver) {
                Value::Object(next) => holder = Some(next),
                _ => return None,
            }
        }
        Some(f(holder.as_deref().unwrap_or(source)))
    }
}

/// Resolve components that must all be navigable, returning the type reached
fn resolve_navigation(
    root: &'static TypeInfo,
    components: &[String],
) -> Result<(Navigator, &'static TypeInfo), BindingError> {
    let mut current = root;
    let mut links = SmallVec::new();
    for name in components {
        let member = lookup_member(current, name)?;
        current = member
            .member_type()
            .navigable()
            .ok_or_else(|| BindingError::NotAnObject {
                member: name.clone(),
            })?;
        links.push(member.getter().clone());
    }
    Ok((Navigator { root, links }, current))
}

fn lookup_member(
    ty: &'static TypeInfo,
    name: &str,
) -> Result<&'static MemberInfo, BindingError> {
    ty.member(name).ok_or_else(|| BindingError::MemberNotFound {
        owner: ty.name(),
        member: name.to_string(),
    })
}

struct ResolvedMember {
    navigator: Navigator,
    receiver: &'static TypeInfo,
    member: &'static MemberInfo,
}

fn resolve_member(
    root: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<ResolvedMember, BindingError> {
    let (last, prefix) = expression
        .path()
        .split_last()
        .ok_or_else(|| BindingError::InvalidExpression(expression.text().to_string()))?;
    let (navigator, receiver) = resolve_navigation(root, prefix)?;
    let member = lookup_member(receiver, last)?;
    Ok(ResolvedMember {
        navigator,
        receiver,
        member,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Property accessors
// ─────────────────────────────────────────────────────────────────────────────

/// Compile an untyped getter, returning it with the member's type handle
pub(crate) fn compile_raw_getter(
    view_model_type: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<(RawGetter, TypeHandle), BindingError> {
    let ResolvedMember {
        navigator, member, ..
    } = resolve_member(view_model_type, expression)?;

    let handle = member.member_type().handle();
    let read = member.getter().clone();
    let getter: RawGetter = Arc::new(move |source: &Object| {
        navigator
            .visit(source, |receiver| read(receiver))
            .unwrap_or(Value::Null)
    });
    Ok((getter, handle))
}

/// Compile an untyped setter
///
/// A read-only final member compiles to a setter that does nothing.
pub(crate) fn compile_raw_setter(
    view_model_type: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<RawSetter, BindingError> {
    let ResolvedMember {
        navigator,
        receiver,
        member,
    } = resolve_member(view_model_type, expression)?;

    if receiver.is_value_type() {
        return Err(BindingError::AssignmentToValueType {
            member: member.name().to_string(),
        });
    }

    let Some(write) = member.setter().cloned() else {
        return Ok(Arc::new(|_: &Object, _: Value| {}));
    };
    Ok(Arc::new(move |source: &Object, value: Value| {
        navigator.visit(source, |receiver| write(receiver, value));
    }))
}

/// Compile a typed getter; values the member cannot convert to `T` read as `T::zero()`
pub fn compile_getter<T: PropertyType>(
    view_model_type: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<TypedGetter<T>, BindingError> {
    let (read, _) = compile_raw_getter(view_model_type, expression)?;
    Ok(Arc::new(move |source: &Object| {
        convert_value::<T>(read(source)).unwrap_or_else(T::zero)
    }))
}

/// Compile a typed setter; values are converted to the member's type before writing
pub fn compile_setter<T: PropertyType>(
    view_model_type: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<TypedSetter<T>, BindingError> {
    let (_, target) = compile_raw_getter(view_model_type, expression)?;
    let write = compile_raw_setter(view_model_type, expression)?;
    Ok(Arc::new(move |source: &Object, value: T| {
        let value = value.into_value();
        let value = if value.is_null() || value.kind() == Some(target.kind) {
            value
        } else {
            value.convert(target.kind).unwrap_or_else(|| target.zero_value())
        };
        write(source, value);
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Event bindings
// ─────────────────────────────────────────────────────────────────────────────

/// Compile an event handler invoking a view-model method
///
/// The last path component names the method; earlier components navigate from
/// the view-model. The handler holds the root weakly and resolves
/// root → view → view-model on every invocation.
pub fn compile_event_binding<R>(
    root: &Rc<R>,
    delegate: &DelegateType,
    view_model_type: &'static TypeInfo,
    expression: &BindingExpression,
) -> Result<EventHandler, BindingError>
where
    R: ViewHost + 'static,
{
    let (method_name, prefix) = expression
        .path()
        .split_last()
        .ok_or_else(|| BindingError::InvalidExpression(expression.text().to_string()))?;
    let (navigator, receiver) = resolve_navigation(view_model_type, prefix)?;

    let mut candidates = receiver
        .methods_named(method_name)
        .filter(|m| m.arity() == delegate.arity);
    let method = match (candidates.next(), candidates.next()) {
        (Some(method), None) => method,
        (None, _) => {
            return Err(BindingError::MethodNotFound {
                owner: receiver.name(),
                method: method_name.clone(),
                arity: delegate.arity,
            })
        }
        (Some(_), Some(_)) => {
            return Err(BindingError::AmbiguousMethod {
                owner: receiver.name(),
                method: method_name.clone(),
                arity: delegate.arity,
            })
        }
    };

    tracing::debug!(
        delegate = delegate.name,
        method = %method_name,
        owner = receiver.name(),
        "compiled event binding"
    );

    let invoke = method.invoker().clone();
    let arity = delegate.arity;
    let root: Weak<R> = Rc::downgrade(root);
    Ok(Box::new(move |args: &[Value]| {
        if args.len() != arity {
            tracing::trace!(expected = arity, actual = args.len(), "event arity mismatch");
            return Value::Null;
        }
        root.upgrade()
            .and_then(|root| root.view())
            .and_then(|view| view.view_model())
            .and_then(|view_model| navigator.visit(&*view_model, |receiver| invoke(receiver, args)))
            .unwrap_or(Value::Null)
    }))
}
