//! Data binding
//!
//! A binding connects a property on a [`DependencyObject`] to a member path on
//! a view-model. Expressions are parsed once, resolved against the view-model's
//! [`TypeInfo`] and compiled into closures over the member thunks, so a bound
//! slot polls its source without re-parsing or re-resolving anything.
//!
//! The view-model is found at invocation time through the binding root: an
//! element that hosts a [`View`], which in turn exposes the view-model object.
//! Every link in that chain may be absent; absence reads as null and writes are
//! dropped.
//!
//! [`DependencyObject`]: crate::object::DependencyObject
//! [`TypeInfo`]: crate::meta::TypeInfo

mod accessor;
mod compiler;
mod expression;

use std::sync::Arc;

use crate::value::ObjectRef;

pub use accessor::{BoundAccessor, WriteResult};
pub(crate) use accessor::Binding;
pub use compiler::{
    compile_event_binding, compile_getter, compile_setter, DelegateType, EventHandler,
    RawGetter, RawSetter, TypedGetter, TypedSetter,
};
pub use expression::{is_binding_expression, parse_components, BindingExpression};

/// A view exposing the view-model its bindings read from
pub trait View: Send + Sync {
    fn view_model(&self) -> Option<ObjectRef>;
}

/// An element that may host a view
pub trait ViewHost {
    fn view(&self) -> Option<Arc<dyn View>>;
}

/// A view with a fixed view-model
pub struct StaticView {
    view_model: Option<ObjectRef>,
}

impl StaticView {
    pub fn new(view_model: ObjectRef) -> Self {
        Self {
            view_model: Some(view_model),
        }
    }

    pub fn empty() -> Self {
        Self { view_model: None }
    }
}

impl View for StaticView {
    fn view_model(&self) -> Option<ObjectRef> {
        self.view_model.clone()
    }
}
