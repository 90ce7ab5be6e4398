//! Dynamic values and type handles
//!
//! Property storage is typed (`ValueSlot<T>`), but everything that crosses a
//! dynamic boundary (default providers, view-model members, binding
//! conversion) travels as a [`Value`]. A [`TypeHandle`] identifies a value type
//! at runtime so slot access, registration and binding can compare types
//! without generics.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::BindingError;
use crate::geometry::{Color, Vec2};

/// Any object that can act as a binding source or member receiver
pub type Object = dyn Any + Send + Sync;

/// Shared reference to a binding source object
pub type ObjectRef = Arc<Object>;

// ─────────────────────────────────────────────────────────────────────────────
// Type identity
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of value kinds the property system stores
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Vec2,
    Color,
    Object,
}

impl ValueType {
    /// Name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int32 => "i32",
            ValueType::Int64 => "i64",
            ValueType::Float32 => "f32",
            ValueType::Float64 => "f64",
            ValueType::String => "String",
            ValueType::Vec2 => "Vec2",
            ValueType::Color => "Color",
            ValueType::Object => "Object",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Int32 | ValueType::Int64 | ValueType::Float32 | ValueType::Float64
        )
    }
}

/// Runtime type handle: a value kind plus nullability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeHandle {
    pub kind: ValueType,
    pub nullable: bool,
}

impl TypeHandle {
    pub const fn new(kind: ValueType) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(kind: ValueType) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub const fn into_nullable(self) -> Self {
        Self::nullable(self.kind)
    }

    /// Identity, or one side is the nullable form of the other
    pub fn is_compatible_with(&self, other: &TypeHandle) -> bool {
        self.kind == other.kind
    }

    /// The value a failed conversion degrades to: null for nullable types
    pub fn zero_value(&self) -> Value {
        if self.nullable {
            Value::Null
        } else {
            Value::zero(self.kind)
        }
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A dynamically typed property value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Vec2(Vec2),
    Color(Color),
    Object(ObjectRef),
}

impl Value {
    /// The kind of this value, `None` for null
    pub fn kind(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int32(_) => Some(ValueType::Int32),
            Value::Int64(_) => Some(ValueType::Int64),
            Value::Float32(_) => Some(ValueType::Float32),
            Value::Float64(_) => Some(ValueType::Float64),
            Value::String(_) => Some(ValueType::String),
            Value::Vec2(_) => Some(ValueType::Vec2),
            Value::Color(_) => Some(ValueType::Color),
            Value::Object(_) => Some(ValueType::Object),
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("null", ValueType::name)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The non-null zero value of a kind (objects have no zero and yield null)
    pub fn zero(kind: ValueType) -> Value {
        match kind {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int32 => Value::Int32(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::Float32 => Value::Float32(0.0),
            ValueType::Float64 => Value::Float64(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Vec2 => Value::Vec2(Vec2::ZERO),
            ValueType::Color => Value::Color(Color::default()),
            ValueType::Object => Value::Null,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Float32(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view used by generic conversion (booleans count as 0/1)
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Identity comparison used for change detection
    ///
    /// Floats compare bitwise so a NaN source does not report a change on
    /// every poll; objects compare by reference.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Parse text into a value of the given kind
    pub fn parse(text: &str, kind: ValueType) -> Option<Value> {
        let trimmed = text.trim();
        match kind {
            ValueType::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ValueType::Int32 => trimmed.parse().ok().map(Value::Int32),
            ValueType::Int64 => trimmed.parse().ok().map(Value::Int64),
            ValueType::Float32 => trimmed.parse().ok().map(Value::Float32),
            ValueType::Float64 => trimmed.parse().ok().map(Value::Float64),
            ValueType::String => Some(Value::String(text.to_string())),
            ValueType::Vec2 => Vec2::parse(trimmed).map(Value::Vec2),
            ValueType::Color => Color::parse(trimmed).map(Value::Color),
            ValueType::Object => None,
        }
    }

    /// Generic best-effort conversion to another kind
    ///
    /// Returns `None` when no conversion exists or text fails to parse.
    pub fn convert(&self, kind: ValueType) -> Option<Value> {
        if self.kind() == Some(kind) {
            return Some(self.clone());
        }
        match (self, kind) {
            (Value::Null, _) => None,
            (_, ValueType::String) => Some(Value::String(self.to_string())),
            (Value::String(text), kind) => Value::parse(text, kind),
            (value, kind) => {
                let n = value.as_number()?;
                match kind {
                    ValueType::Bool => Some(Value::Bool(n != 0.0)),
                    ValueType::Int32 => Some(Value::Int32(n.round() as i32)),
                    ValueType::Int64 => Some(Value::Int64(n.round() as i64)),
                    ValueType::Float32 => Some(Value::Float32(n as f32)),
                    ValueType::Float64 => Some(Value::Float64(n)),
                    _ => None,
                }
            }
        }
    }

    /// Format for display, optionally through a format specifier
    pub fn format(&self, spec: Option<&FormatSpec>) -> String {
        match spec {
            Some(spec) => spec.apply(self),
            None => self.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vec2(a), Value::Vec2(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Vec2(v) => write!(f, "Vec2({v})"),
            Value::Color(v) => write!(f, "Color({v})"),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Vec2(v) => write!(f, "{v}"),
            Value::Color(v) => write!(f, "{v}"),
            Value::Object(_) => f.write_str("[object]"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Format specifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Presentation of a formatted number
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FormatKind {
    #[default]
    Default,
    LowerHex,
    UpperHex,
    Exponent,
}

/// Format specifier embedded in a binding expression after `:`
///
/// Grammar: `[0][width][.precision][x|X|e]`, e.g. `.2`, `X`, `08.3`, `.1e`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FormatSpec {
    pub zero_pad: bool,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub kind: FormatKind,
}

impl FormatSpec {
    /// Format a value; kinds that do not apply fall back to plain display
    pub fn apply(&self, value: &Value) -> String {
        let body = match (self.kind, value) {
            (FormatKind::LowerHex, Value::Int32(v)) => format!("{v:x}"),
            (FormatKind::LowerHex, Value::Int64(v)) => format!("{v:x}"),
            (FormatKind::UpperHex, Value::Int32(v)) => format!("{v:X}"),
            (FormatKind::UpperHex, Value::Int64(v)) => format!("{v:X}"),
            (FormatKind::Exponent, Value::Float32(v)) => match self.precision {
                Some(p) => format!("{v:.p$e}"),
                None => format!("{v:e}"),
            },
            (FormatKind::Exponent, Value::Float64(v)) => match self.precision {
                Some(p) => format!("{v:.p$e}"),
                None => format!("{v:e}"),
            },
            (_, Value::Float32(v)) if self.precision.is_some() => {
                format!("{v:.p$}", p = self.precision.unwrap_or_default())
            }
            (_, Value::Float64(v)) if self.precision.is_some() => {
                format!("{v:.p$}", p = self.precision.unwrap_or_default())
            }
            _ => value.to_string(),
        };
        self.pad(body)
    }

    fn pad(&self, body: String) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        if self.zero_pad {
            // Zeros go between the sign and the digits
            let (sign, digits) = match body.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", body.as_str()),
            };
            format!("{sign}{}{digits}", "0".repeat(width - len))
        } else {
            format!("{body:>width$}")
        }
    }
}

/// Largest width or precision a format specifier may request
pub const MAX_FORMAT_FIELD: usize = 64;

impl FromStr for FormatSpec {
    type Err = BindingError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || BindingError::InvalidExpression(spec.to_string());
        let mut rest = spec.trim();
        if rest.is_empty() {
            return Err(invalid());
        }

        let kind = match rest.chars().last() {
            Some('x') => FormatKind::LowerHex,
            Some('X') => FormatKind::UpperHex,
            Some('e') => FormatKind::Exponent,
            _ => FormatKind::Default,
        };
        if kind != FormatKind::Default {
            rest = &rest[..rest.len() - 1];
        }

        let (width_part, precision_part) = match rest.split_once('.') {
            Some((width, precision)) => (width, Some(precision)),
            None => (rest, None),
        };

        let field = |part: &str| {
            part.parse::<usize>()
                .ok()
                .filter(|n| *n <= MAX_FORMAT_FIELD)
                .ok_or_else(invalid)
        };
        let width = if width_part.is_empty() {
            None
        } else {
            Some(field(width_part)?)
        };
        let precision = precision_part.map(field).transpose()?;

        Ok(Self {
            zero_pad: width_part.len() > 1 && width_part.starts_with('0'),
            width,
            precision,
            kind,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property value types
// ─────────────────────────────────────────────────────────────────────────────

/// A Rust type that can be stored in a dependency property
///
/// Each implementation ties the static type to a [`TypeHandle`] so untyped
/// access can be checked at runtime, and supplies the equality comparer the
/// slot uses for change detection.
pub trait PropertyType: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Runtime handle for this type
    fn type_handle() -> TypeHandle;

    /// Zero value a failed conversion degrades to
    fn zero() -> Self;

    fn into_value(self) -> Value;

    /// Exact extraction; no conversion between kinds
    fn from_value(value: Value) -> Option<Self>;

    /// Equality comparer used by digest change detection
    fn same(a: &Self, b: &Self) -> bool {
        a == b
    }
}

macro_rules! impl_property_type {
    ($ty:ty, $variant:ident, $zero:expr) => {
        impl PropertyType for $ty {
            fn type_handle() -> TypeHandle {
                TypeHandle::new(ValueType::$variant)
            }

            fn zero() -> Self {
                $zero
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
    ($ty:ty, $variant:ident, $zero:expr, float) => {
        impl PropertyType for $ty {
            fn type_handle() -> TypeHandle {
                TypeHandle::new(ValueType::$variant)
            }

            fn zero() -> Self {
                $zero
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn same(a: &Self, b: &Self) -> bool {
                a == b || (a.is_nan() && b.is_nan())
            }
        }
    };
}

impl_property_type!(bool, Bool, false);
impl_property_type!(i32, Int32, 0);
impl_property_type!(i64, Int64, 0);
impl_property_type!(f32, Float32, 0.0, float);
impl_property_type!(f64, Float64, 0.0, float);
impl_property_type!(String, String, String::new());
impl_property_type!(Vec2, Vec2, Vec2::ZERO);
impl_property_type!(Color, Color, Color::default());

impl<T: PropertyType> PropertyType for Option<T> {
    fn type_handle() -> TypeHandle {
        T::type_handle().into_nullable()
    }

    fn zero() -> Self {
        None
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, T::into_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            value => T::from_value(value).map(Some),
        }
    }

    fn same(a: &Self, b: &Self) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => T::same(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Extract a typed value, converting between kinds when needed
pub fn convert_value<T: PropertyType>(value: Value) -> Option<T> {
    if let Some(exact) = T::from_value(value.clone()) {
        return Some(exact);
    }
    value
        .convert(T::type_handle().kind)
        .and_then(T::from_value)
}
