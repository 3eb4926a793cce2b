//! Payload validation for reducers
//!
//! A reducer may carry a [`Schema`]. The dispatcher validates the action
//! payload before invoking the reducer; a non-empty error set drops the
//! action and is reported on the `error` channel.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use viewflux_core::schema::{FieldRule, ObjectSchema, Schema};
//!
//! let schema = ObjectSchema::new()
//!     .field("id", FieldRule::integer().required())
//!     .field("email", FieldRule::string().min_length(3));
//!
//! assert!(schema.validate(&json!({ "id": 1, "email": "a@b" })).is_none());
//!
//! let errors = schema.validate(&json!({ "email": "x" })).unwrap();
//! assert_eq!(errors.len(), 2);
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A validator for action payloads.
///
/// Returns `None` when the payload is acceptable.
pub trait Schema {
    fn validate(&self, data: &Value) -> Option<ValidationErrors>;
}

impl<F> Schema for F
where
    F: Fn(&Value) -> Option<ValidationErrors>,
{
    fn validate(&self, data: &Value) -> Option<ValidationErrors> {
        self(data)
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name; empty when the payload as a whole was rejected.
    pub field: String,
    pub message: String,
}

/// Structured error set produced by a failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Errors for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> {
        self.0.iter().filter(move |e| e.field == field)
    }

    /// `None` when empty, matching the [`Schema`] contract.
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            if error.field.is_empty() {
                write!(f, "{}", error.message)?;
            } else {
                write!(f, "{}: {}", error.field, error.message)?;
            }
        }
        Ok(())
    }
}

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

/// Constraints for a single field of an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    ty: FieldType,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
    one_of: Vec<Value>,
}

impl FieldRule {
    pub fn of(ty: FieldType) -> Self {
        Self {
            ty,
            required: false,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            one_of: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn array() -> Self {
        Self::of(FieldType::Array)
    }

    pub fn object() -> Self {
        Self::of(FieldType::Object)
    }

    pub fn any() -> Self {
        Self::of(FieldType::Any)
    }

    /// Missing or `null` values are rejected.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum length in characters (strings) or items (arrays).
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.one_of = values.into_iter().collect();
        self
    }

    fn check(&self, field: &str, value: Option<&Value>, errors: &mut ValidationErrors) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(field, "is required");
                }
                return;
            }
            Some(value) => value,
        };

        if !self.ty.accepts(value) {
            errors.push(field, format!("must be of type {}", self.ty.label()));
            return;
        }

        let length = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };
        if let Some(length) = length {
            if let Some(min) = self.min_length {
                if length < min {
                    errors.push(field, format!("must have a length of at least {min}"));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    errors.push(field, format!("must have a length of at most {max}"));
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    errors.push(field, format!("must be at least {min}"));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    errors.push(field, format!("must be at most {max}"));
                }
            }
        }

        if !self.one_of.is_empty() && !self.one_of.contains(value) {
            errors.push(field, "is not an allowed value");
        }
    }
}

/// Declarative validator for object payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: Vec<(String, FieldRule)>,
    deny_unknown: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    /// Reject fields that have no rule.
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown = true;
        self
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, data: &Value) -> Option<ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let Some(object) = data.as_object() else {
            errors.push("", "payload must be an object");
            return Some(errors);
        };

        for (name, rule) in &self.fields {
            rule.check(name, object.get(name), &mut errors);
        }

        if self.deny_unknown {
            for key in object.keys() {
                if !self.fields.iter().any(|(name, _)| name == key) {
                    errors.push(key.as_str(), "is not allowed");
                }
            }
        }

        errors.into_option()
    }
}
