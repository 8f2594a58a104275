//! Validated, filtered request parameters.
//!
//! ```rust
//! use minihttpd::params::{NotEmpty, Param, Trim};
//! use minihttpd::{Data, Error, Request};
//!
//! async fn add(req: Request) -> Result<Data<String>, Error> {
//!     let task = Param::new("task").filter(Trim).validator(NotEmpty).from_both(&req)?;
//!     Ok(Data(task.as_str().unwrap_or_default().to_owned()))
//! }
//! ```
//!
//! A failed validation is a [`ValidationError`], which `?` turns into a `400`
//! answered with `Invalid parameter <name>: <messages>`.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::request::Request;

/// Checks a parameter value, reporting every problem found.
pub trait Validator {
    fn validate(&self, value: &Value) -> Result<(), Vec<String>>;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> Result<(), String>,
{
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        self(value).map_err(|message| vec![message])
    }
}

/// Normalizes a parameter value before validation.
pub trait Filter {
    fn filter(&self, value: Value) -> Value;
}

impl<F> Filter for F
where
    F: Fn(Value) -> Value,
{
    fn filter(&self, value: Value) -> Value {
        self(value)
    }
}

/// Rejects null, empty strings, empty arrays and empty objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotEmpty;

impl Validator for NotEmpty {
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        };
        if empty {
            Err(vec!["Value is required and can't be empty".to_owned()])
        } else {
            Ok(())
        }
    }
}

/// Strips surrounding whitespace from strings; other values pass unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trim;

impl Filter for Trim {
    fn filter(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_owned()),
            other => other,
        }
    }
}

/// Description of one named parameter.
pub struct Param {
    name: String,
    default: Value,
    filter: Option<Box<dyn Filter>>,
    validator: Option<Box<dyn Validator>>,
}

impl Param {
    /// A parameter defaulting to `null` with neither filter nor validator.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), default: Value::Null, filter: None, validator: None }
    }

    /// Value used when the parameter is absent.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks the parameter up in `data`, then filters and validates it.
    pub fn from_map(&self, data: &Map<String, Value>) -> Result<Value, ValidationError> {
        self.check(data.get(&self.name).cloned())
    }

    /// From the query string. Query values are always strings.
    pub fn from_query(&self, req: &Request) -> Result<Value, ValidationError> {
        self.check(req.query_params().remove(&self.name).map(Value::String))
    }

    /// From a form-encoded or JSON object body.
    pub fn from_body(&self, req: &Request) -> Result<Value, ValidationError> {
        self.check(req.parsed_body().and_then(|mut body| body.remove(&self.name)))
    }

    /// From the query string, else from the body.
    pub fn from_both(&self, req: &Request) -> Result<Value, ValidationError> {
        let value = req
            .query_params()
            .remove(&self.name)
            .map(Value::String)
            .or_else(|| req.parsed_body().and_then(|mut body| body.remove(&self.name)));
        self.check(value)
    }

    fn check(&self, value: Option<Value>) -> Result<Value, ValidationError> {
        let mut value = value.unwrap_or_else(|| self.default.clone());
        if let Some(filter) = &self.filter {
            value = filter.filter(value);
        }
        if let Some(validator) = &self.validator {
            validator
                .validate(&value)
                .map_err(|messages| ValidationError::new(self.name.clone(), messages))?;
        }
        Ok(value)
    }
}
