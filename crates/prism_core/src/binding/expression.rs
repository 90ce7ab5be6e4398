//! Binding expression grammar
//!
//! `{{Component(.Component)*[:format]}}` where each component is a plain
//! identifier. Whether the `{{ }}` delimiters are required depends on the call
//! site; when they are optional they are still stripped if present.

use std::fmt;

use smallvec::SmallVec;

use crate::error::BindingError;
use crate::value::FormatSpec;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Whether `text` looks like a binding expression
pub fn is_binding_expression(text: &str, require_delimiters: bool) -> bool {
    if text.is_empty() {
        return false;
    }
    !require_delimiters || (text.len() >= 4 && text.starts_with(OPEN) && text.ends_with(CLOSE))
}

/// Strip delimiters and split the path on `.`
///
/// Components are returned as written; identifier validation happens in
/// [`BindingExpression::parse`].
pub fn parse_components(text: &str, require_delimiters: bool) -> Result<Vec<&str>, BindingError> {
    if !is_binding_expression(text, require_delimiters) {
        return Err(BindingError::InvalidExpression(text.to_string()));
    }
    Ok(strip_delimiters(text).split('.').collect())
}

fn strip_delimiters(text: &str) -> &str {
    text.strip_prefix(OPEN)
        .and_then(|inner| inner.strip_suffix(CLOSE))
        .unwrap_or(text)
        .trim()
}

fn is_identifier(component: &str) -> bool {
    let mut chars = component.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// A parsed binding expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingExpression {
    text: String,
    path: SmallVec<[String; 4]>,
    format: Option<FormatSpec>,
}

impl BindingExpression {
    pub fn parse(text: &str, require_delimiters: bool) -> Result<Self, BindingError> {
        let invalid = || BindingError::InvalidExpression(text.to_string());
        if !is_binding_expression(text, require_delimiters) {
            return Err(invalid());
        }

        let inner = strip_delimiters(text);
        let (path, format) = match inner.split_once(':') {
            Some((path, spec)) => (path.trim(), Some(spec.parse::<FormatSpec>().map_err(|_| invalid())?)),
            None => (inner, None),
        };

        let path: SmallVec<[String; 4]> = path.split('.').map(|c| c.trim().to_string()).collect();
        if !path.iter().all(|c| is_identifier(c)) {
            return Err(invalid());
        }

        Ok(Self {
            text: text.to_string(),
            path,
            format,
        })
    }

    /// The expression as written
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Member names, root first
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn format(&self) -> Option<&FormatSpec> {
        self.format.as_ref()
    }
}

impl fmt::Display for BindingExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
