//! Positional-to-named parameter translation.
//!
//! The query language only knows named bind parameters (`@name`, and
//! `@@name` for collection names). Positional binding is layered on top: the
//! distinct names, in order of first appearance, are numbered from 1.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::core::{DriverError, Result, TypeTag, Value};
use crate::store::BindVars;

lazy_static! {
    static ref NAMED_PARAMETER: Regex = Regex::new(r"(@?)@([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    name: String,
    /// Seen as `@name`
    value: bool,
    /// Seen as `@@name`
    collection: bool,
}

/// Binding table of one prepared query.
#[derive(Debug, Clone)]
pub struct ParameterBindings {
    order: Vec<Placeholder>,
    bindings: HashMap<String, Value>,
}

impl ParameterBindings {
    /// Scan `template` for placeholders. Names repeat freely; each distinct
    /// name gets one ordinal.
    pub fn parse(template: &str) -> Self {
        let mut order: Vec<Placeholder> = Vec::new();

        for caps in NAMED_PARAMETER.captures_iter(template) {
            let is_collection = !caps[1].is_empty();
            let name = &caps[2];
            match order.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    existing.value |= !is_collection;
                    existing.collection |= is_collection;
                }
                None => order.push(Placeholder {
                    name: name.to_string(),
                    value: !is_collection,
                    collection: is_collection,
                }),
            }
        }

        Self {
            order,
            bindings: HashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Parameter names in ordinal order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|p| p.name.as_str()).collect()
    }

    /// Name behind a 1-based ordinal.
    pub fn name_at(&self, ordinal: usize) -> Result<&str> {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.order.get(i))
            .map(|p| p.name.as_str())
            .ok_or_else(|| {
                DriverError::ParameterBindingError(format!(
                    "Parameter index out of range: {}. Query has {} parameters.",
                    ordinal,
                    self.order.len()
                ))
            })
    }

    pub fn bind(&mut self, ordinal: usize, value: impl Into<Value>) -> Result<()> {
        let name = self.name_at(ordinal)?.to_string();
        self.bindings.insert(name, value.into());
        Ok(())
    }

    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.order.iter().any(|p| p.name == name) {
            return Err(DriverError::ParameterBindingError(format!(
                "Parameter '{}' not found in query",
                name
            )));
        }
        self.bindings.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Drop every binding; the ordinal index stays.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Every parameter must be bound, null counts as bound.
    pub fn validate(&self) -> Result<()> {
        match self.order.iter().find(|p| !self.bindings.contains_key(&p.name)) {
            Some(missing) => Err(DriverError::ParameterBindingError(format!(
                "Parameter '{}' is not set",
                missing.name
            ))),
            None => Ok(()),
        }
    }

    /// Validate, then produce the wire bind variables. Collection parameters
    /// go out under their `@`-prefixed key.
    pub fn to_bind_vars(&self) -> Result<BindVars> {
        self.validate()?;

        let mut vars = BindVars::new();
        for placeholder in &self.order {
            let value = self
                .bindings
                .get(&placeholder.name)
                .map(Value::to_json)
                .unwrap_or(JsonValue::Null);
            if placeholder.collection {
                vars.insert(format!("@{}", placeholder.name), value.clone());
            }
            if placeholder.value {
                vars.insert(placeholder.name.clone(), value);
            }
        }
        Ok(vars)
    }

    pub fn metadata(&self) -> ParameterMetadata {
        let parameters = self
            .order
            .iter()
            .map(|p| {
                let type_tag = match self.bindings.get(&p.name) {
                    Some(value) if !value.is_null() => value.type_tag(),
                    _ => TypeTag::String,
                };
                (p.name.clone(), type_tag)
            })
            .collect();
        ParameterMetadata { parameters }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMode {
    In,
}

/// Snapshot of a binding table's shape.
///
/// A parameter's type is that of its bound value, or `STRING` while unbound.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMetadata {
    parameters: Vec<(String, TypeTag)>,
}

impl ParameterMetadata {
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn parameter(&self, ordinal: usize) -> Result<&(String, TypeTag)> {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.parameters.get(i))
            .ok_or_else(|| {
                DriverError::ParameterBindingError(format!(
                    "Parameter index out of range: {}",
                    ordinal
                ))
            })
    }

    pub fn parameter_name(&self, ordinal: usize) -> Result<&str> {
        self.parameter(ordinal).map(|(name, _)| name.as_str())
    }

    pub fn parameter_type(&self, ordinal: usize) -> Result<TypeTag> {
        self.parameter(ordinal).map(|(_, tag)| *tag)
    }

    pub fn parameter_sql_type(&self, ordinal: usize) -> Result<i32> {
        self.parameter_type(ordinal).map(|tag| tag.sql_code())
    }

    pub fn parameter_type_name(&self, ordinal: usize) -> Result<&'static str> {
        self.parameter_type(ordinal).map(|tag| tag.sql_name())
    }

    pub fn parameter_mode(&self, ordinal: usize) -> Result<ParameterMode> {
        self.parameter(ordinal).map(|_| ParameterMode::In)
    }
}
