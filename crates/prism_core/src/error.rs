//! Error types for the property system and binding compiler

use thiserror::Error;

/// Result type for property system operations
pub type Result<T, E = PropertyError> = std::result::Result<T, E>;

/// Errors raised by registration and untyped property access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The name is already registered for this exact owner type
    #[error("Property '{name}' is already registered on '{owner}'")]
    DuplicateRegistration { owner: &'static str, name: String },

    /// The owner type does not derive from the dependency object root
    #[error("Type '{0}' does not participate in the property system")]
    NotAParticipant(&'static str),

    /// The generic value type does not match the registered value type
    #[error("Type mismatch on property '{property}': expected {expected}, got {actual}")]
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    /// Binding compilation failed
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Errors raised while parsing or compiling a binding expression
///
/// These are structural problems with the expression itself. Problems with the
/// bound data (null links, failed root casts, unparsable text) are never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Missing delimiters, empty components, or a malformed format specifier
    #[error("Invalid binding expression: '{0}'")]
    InvalidExpression(String),

    /// A path component does not name a member of the type it is applied to
    #[error("Type '{owner}' has no member '{member}'")]
    MemberNotFound { owner: &'static str, member: String },

    /// A path continues past a member that does not hold an object
    #[error("Member '{member}' does not hold an object and cannot be navigated")]
    NotAnObject { member: String },

    /// The final member is reached through a value-type receiver
    #[error("Cannot assign to '{member}' through a value-type receiver")]
    AssignmentToValueType { member: String },

    /// No method with the requested name and arity
    #[error("Type '{owner}' has no method '{method}' taking {arity} argument(s)")]
    MethodNotFound {
        owner: &'static str,
        method: String,
        arity: usize,
    },

    /// More than one method with the requested name and arity
    #[error("Method '{method}' on '{owner}' taking {arity} argument(s) is ambiguous")]
    AmbiguousMethod {
        owner: &'static str,
        method: String,
        arity: usize,
    },
}
