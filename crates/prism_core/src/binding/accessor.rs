//! Bound accessors and per-slot binding state
//!
//! A [`BoundAccessor`] pairs the compiled getter/setter of a member path with
//! the conversion between the member's type and the property type. The
//! conversion mode is picked once when the accessor is compiled:
//!
//! - **direct**: the member type is the property type or its nullable form,
//!   and the expression carries no format specifier
//! - **converting**: strings are formatted or parsed, everything else goes
//!   through generic value conversion
//!
//! Conversion never fails. Text that does not parse degrades to the zero value
//! of the receiving side, and the text itself is kept as a *sticky* string so
//! the property can still display what was typed or supplied.

use std::fmt;
use std::marker::PhantomData;

use crate::error::BindingError;
use crate::meta::TypeInfo;
use crate::value::{convert_value, FormatSpec, Object, PropertyType, TypeHandle, Value, ValueType};

use super::compiler::{compile_raw_getter, compile_raw_setter, RawGetter, RawSetter};
use super::expression::BindingExpression;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Direct,
    Converting,
}

/// Outcome of writing through a bound accessor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteResult {
    /// The binding has no setter; nothing was written
    ReadOnly,
    /// The value reached the setter; `sticky` holds text that failed to parse
    Written { sticky: Option<String> },
}

/// Compiled, immutable accessor for one binding
pub struct BoundAccessor<T> {
    getter: RawGetter,
    setter: Option<RawSetter>,
    source: TypeHandle,
    format: Option<FormatSpec>,
    mode: Mode,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PropertyType> BoundAccessor<T> {
    /// Compile an accessor for `expression` on `view_model_type`
    ///
    /// A member reached through a value type cannot be assigned; the accessor
    /// is then read-only rather than failing the whole binding.
    pub fn compile(
        view_model_type: &'static TypeInfo,
        expression: &BindingExpression,
    ) -> Result<Self, BindingError> {
        let (getter, source) = compile_raw_getter(view_model_type, expression)?;
        let setter = match compile_raw_setter(view_model_type, expression) {
            Ok(setter) => Some(setter),
            Err(BindingError::AssignmentToValueType { member }) => {
                tracing::warn!(
                    expression = %expression,
                    member = %member,
                    "binding target is reached through a value type, binding is read-only"
                );
                None
            }
            Err(err) => return Err(err),
        };

        let mode = if source.is_compatible_with(&T::type_handle()) && expression.format().is_none()
        {
            Mode::Direct
        } else {
            Mode::Converting
        };

        Ok(Self {
            getter,
            setter,
            source,
            format: expression.format().copied(),
            mode,
            _marker: PhantomData,
        })
    }

    /// Type handle of the bound member
    pub fn source_type(&self) -> TypeHandle {
        self.source
    }

    pub fn is_converting(&self) -> bool {
        self.mode == Mode::Converting
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    /// Read the member without conversion
    pub fn read_raw(&self, source: &Object) -> Value {
        (self.getter)(source)
    }

    /// Convert a raw member value to the property type
    ///
    /// The second element is the sticky text when a string failed to parse.
    pub fn convert_in(&self, raw: Value) -> (T, Option<String>) {
        let target = T::type_handle();
        match self.mode {
            Mode::Direct => (convert_value::<T>(raw).unwrap_or_else(T::zero), None),
            Mode::Converting if target.kind == ValueType::String => {
                let text = if raw.is_null() && target.nullable {
                    Value::Null
                } else {
                    Value::String(raw.format(self.format.as_ref()))
                };
                (T::from_value(text).unwrap_or_else(T::zero), None)
            }
            Mode::Converting => match raw {
                Value::String(text) => {
                    match Value::parse(&text, target.kind).and_then(T::from_value) {
                        Some(value) => (value, None),
                        None => {
                            tracing::trace!(text = %text, target = %target, "unparsable source text kept as sticky");
                            (T::zero(), Some(text))
                        }
                    }
                }
                raw => match convert_value::<T>(raw.clone()) {
                    Some(value) => (value, None),
                    None => {
                        tracing::trace!(source = raw.type_name(), target = %target, "no conversion, using zero value");
                        (T::zero(), None)
                    }
                },
            },
        }
    }

    /// Convert a property value to the member type
    fn convert_out(&self, value: Value) -> (Value, Option<String>) {
        if self.mode == Mode::Direct {
            return (value, None);
        }
        if value.is_null() {
            return (self.source.zero_value(), None);
        }
        match (&value, self.source.kind) {
            (_, ValueType::String) => (Value::String(value.format(self.format.as_ref())), None),
            (Value::String(text), kind) => match Value::parse(text, kind) {
                Some(parsed) => (parsed, None),
                None => {
                    tracing::trace!(text = %text, target = %self.source, "unparsable text written as zero value");
                    (self.source.zero_value(), Some(text.clone()))
                }
            },
            (_, kind) => (
                value.convert(kind).unwrap_or_else(|| self.source.zero_value()),
                None,
            ),
        }
    }

    /// Write a property value through the setter
    pub fn write(&self, source: &Object, value: &T) -> WriteResult {
        let Some(setter) = &self.setter else {
            return WriteResult::ReadOnly;
        };
        let (raw, sticky) = self.convert_out(value.clone().into_value());
        setter(source, raw);
        WriteResult::Written { sticky }
    }
}

impl<T> fmt::Debug for BoundAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAccessor")
            .field("source", &self.source)
            .field("format", &self.format)
            .field("mode", &self.mode)
            .field("read_only", &self.setter.is_none())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Binding state
// ─────────────────────────────────────────────────────────────────────────────

/// Binding attached to a value slot
///
/// `cached` is the value observed at the last poll (or write); it stays `None`
/// until the first digest so an unpolled binding does not mask lower sources.
/// A sticky string lives until the next successful write or the next observed
/// change of the source.
pub(crate) struct Binding<T> {
    accessor: BoundAccessor<T>,
    view_model_type: &'static TypeInfo,
    expression: BindingExpression,
    last_seen: Option<Value>,
    cached: Option<T>,
    sticky: Option<String>,
}

impl<T: PropertyType> Binding<T> {
    pub(crate) fn new(
        view_model_type: &'static TypeInfo,
        expression: BindingExpression,
    ) -> Result<Self, BindingError> {
        let accessor = BoundAccessor::compile(view_model_type, &expression)?;
        Ok(Self {
            accessor,
            view_model_type,
            expression,
            last_seen: None,
            cached: None,
            sticky: None,
        })
    }

    pub(crate) fn is_same(&self, view_model_type: &TypeInfo, expression: &BindingExpression) -> bool {
        std::ptr::eq(self.view_model_type, view_model_type)
            && self.expression.text() == expression.text()
    }

    pub(crate) fn expression(&self) -> &BindingExpression {
        &self.expression
    }

    pub(crate) fn cached(&self) -> Option<&T> {
        self.cached.as_ref()
    }

    pub(crate) fn sticky(&self) -> Option<&str> {
        self.sticky.as_deref()
    }

    /// Re-read the source; true when it changed since it was last seen
    pub(crate) fn poll(&mut self, source: Option<&Object>) -> bool {
        let raw = source.map_or(Value::Null, |source| self.accessor.read_raw(source));
        if self.last_seen.as_ref().is_some_and(|seen| seen.same_as(&raw)) {
            return false;
        }
        let (value, sticky) = self.accessor.convert_in(raw.clone());
        self.last_seen = Some(raw);
        self.cached = Some(value);
        self.sticky = sticky;
        true
    }

    /// Read the source live without touching the cached state
    ///
    /// An unchanged source yields the cached value, so a sticky write survives.
    /// A missing source reads as null, the same as a poll.
    pub(crate) fn read_fresh(&self, source: Option<&Object>) -> (T, Option<String>) {
        let raw = source.map_or(Value::Null, |source| self.accessor.read_raw(source));
        if let (Some(seen), Some(cached)) = (&self.last_seen, &self.cached) {
            if seen.same_as(&raw) {
                return (cached.clone(), self.sticky.clone());
            }
        }
        self.accessor.convert_in(raw)
    }

    /// Write through the accessor; false when nothing was written
    pub(crate) fn write(&mut self, source: Option<&Object>, value: &T) -> bool {
        let Some(source) = source else {
            return false;
        };
        match self.accessor.write(source, value) {
            WriteResult::ReadOnly => false,
            WriteResult::Written { sticky } => {
                let raw = self.accessor.read_raw(source);
                self.cached = Some(match sticky {
                    Some(_) => value.clone(),
                    None => self.accessor.convert_in(raw.clone()).0,
                });
                self.last_seen = Some(raw);
                self.sticky = sticky;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, LazyLock, Mutex};

    struct Model {
        level: Mutex<f32>,
        label: Mutex<String>,
    }

    #[derive(Clone)]
    struct Extent {
        width: f32,
    }

    static EXTENT_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
        TypeInfo::record::<Extent>("Extent")
            .property("Width", |e: &Extent| e.width, |_: &Extent, _: f32| {})
            .build()
    });

    static MODEL_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
        TypeInfo::class::<Model>("Model")
            .property(
                "Level",
                |m: &Model| *m.level.lock().unwrap(),
                |m: &Model, v| *m.level.lock().unwrap() = v,
            )
            .property(
                "Label",
                |m: &Model| m.label.lock().unwrap().clone(),
                |m: &Model, v| *m.label.lock().unwrap() = v,
            )
            .record_member("Extent", || &*EXTENT_TYPE, |_: &Model| Extent { width: 3.0 })
            .build()
    });

    fn model(level: f32, label: &str) -> Arc<Model> {
        Arc::new(Model {
            level: Mutex::new(level),
            label: Mutex::new(label.to_string()),
        })
    }

    fn obj(model: &Arc<Model>) -> &Object {
        &**model
    }

    fn accessor<T: PropertyType>(text: &str) -> BoundAccessor<T> {
        BoundAccessor::compile(&MODEL_TYPE, &BindingExpression::parse(text, true).unwrap()).unwrap()
    }

    #[test]
    fn test_mode_selection() {
        assert!(!accessor::<f32>("{{Level}}").is_converting());
        assert!(!accessor::<Option<f32>>("{{Level}}").is_converting());
        assert!(accessor::<f64>("{{Level}}").is_converting());
        assert!(accessor::<String>("{{Level}}").is_converting());
        assert!(accessor::<f32>("{{Level:.2}}").is_converting());
    }

    #[test]
    fn test_string_target_formats() {
        let source = model(0.5, "");
        let plain = accessor::<String>("{{Level}}");
        assert_eq!(plain.convert_in(plain.read_raw(obj(&source))).0, "0.5");

        let fixed = accessor::<String>("{{Level:.2}}");
        assert_eq!(fixed.convert_in(fixed.read_raw(obj(&source))).0, "0.50");
    }

    #[test]
    fn test_string_source_parse_failure_is_sticky() {
        let source = model(0.0, "abc");
        let acc = accessor::<f32>("{{Label}}");
        let (value, sticky) = acc.convert_in(acc.read_raw(obj(&source)));
        assert_eq!(value, 0.0);
        assert_eq!(sticky.as_deref(), Some("abc"));

        *source.label.lock().unwrap() = "2.5".into();
        assert_eq!(acc.convert_in(acc.read_raw(obj(&source))), (2.5, None));
    }

    #[test]
    fn test_write_unparsable_text_stores_zero() {
        let source = model(0.8, "");
        let acc = accessor::<String>("{{Level}}");

        let result = acc.write(obj(&source), &"abc".to_string());
        assert_eq!(
            result,
            WriteResult::Written {
                sticky: Some("abc".into())
            }
        );
        assert_eq!(*source.level.lock().unwrap(), 0.0);

        assert_eq!(
            acc.write(obj(&source), &"0.25".to_string()),
            WriteResult::Written { sticky: None }
        );
        assert_eq!(*source.level.lock().unwrap(), 0.25);
    }

    #[test]
    fn test_value_type_receiver_degrades_to_read_only() {
        let acc = accessor::<f32>("{{Extent.Width}}");
        assert!(acc.is_read_only());
        let source = model(0.0, "");
        assert_eq!(acc.write(obj(&source), &1.0), WriteResult::ReadOnly);
        assert_eq!(acc.convert_in(acc.read_raw(obj(&source))).0, 3.0);
    }

    #[test]
    fn test_binding_poll_detects_changes() {
        let source = model(0.1, "");
        let expr = BindingExpression::parse("{{Level}}", true).unwrap();
        let mut binding = Binding::<f32>::new(&MODEL_TYPE, expr).unwrap();

        assert!(binding.cached().is_none());
        assert!(binding.poll(Some(obj(&source))));
        assert_eq!(binding.cached(), Some(&0.1));
        assert!(!binding.poll(Some(obj(&source))));

        *source.level.lock().unwrap() = 0.2;
        assert_eq!(binding.read_fresh(Some(obj(&source))).0, 0.2);
        assert_eq!(binding.cached(), Some(&0.1));
        assert!(binding.poll(Some(obj(&source))));

        // Source gone: reads as the zero value
        assert_eq!(binding.read_fresh(None).0, 0.0);
        assert!(binding.poll(None));
        assert_eq!(binding.cached(), Some(&0.0));
    }

    #[test]
    fn test_binding_sticky_write_survives_poll() {
        let source = model(0.5, "");
        let expr = BindingExpression::parse("{{Level}}", true).unwrap();
        let mut binding = Binding::<String>::new(&MODEL_TYPE, expr).unwrap();

        assert!(binding.write(Some(obj(&source)), &"abc".to_string()));
        assert_eq!(binding.cached().map(String::as_str), Some("abc"));
        assert_eq!(binding.sticky(), Some("abc"));
        assert_eq!(*source.level.lock().unwrap(), 0.0);

        // Unchanged source keeps the sticky text
        assert!(!binding.poll(Some(obj(&source))));
        assert_eq!(binding.sticky(), Some("abc"));

        // External change clears it
        *source.level.lock().unwrap() = 1.5;
        assert!(binding.poll(Some(obj(&source))));
        assert_eq!(binding.cached().map(String::as_str), Some("1.5"));
        assert_eq!(binding.sticky(), None);
    }
}
