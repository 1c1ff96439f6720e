//! Instance validation: the validator seam plus a rule-driven implementation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Returns `None` when the instance is valid, otherwise a descriptor of every violation.
pub trait Validator: Send + Sync {
    fn validate(&self, instance: &Value) -> Option<ValidationErrors>;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> Option<ValidationErrors> + Send + Sync,
{
    fn validate(&self, instance: &Value) -> Option<ValidationErrors> {
        self(instance)
    }
}

/// Default validator: accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _instance: &Value) -> Option<ValidationErrors> {
        None
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationErrors {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    fn push(&mut self, field: &str, message: String) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldRule {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub format: Option<Format>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    Uuid,
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field must be present and non-zero.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, re: Regex) -> Self {
        self.pattern = Some(re);
        self
    }

    pub fn allowed(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }
}

/// Per-field rules, checked in field-name order. Collects all violations.
#[derive(Clone, Debug, Default)]
pub struct RuleValidator {
    rules: BTreeMap<String, FieldRule>,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }
}

impl Validator for RuleValidator {
    fn validate(&self, instance: &Value) -> Option<ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (field, rule) in &self.rules {
            let val = instance.get(field);
            if rule.required && val.map_or(true, crate::entity::is_zero_value) {
                errors.push(field, format!("{} is required", field));
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, rule, &mut errors);
            }
        }
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }
}

fn validate_field(field: &str, v: &Value, rule: &FieldRule, errors: &mut ValidationErrors) {
    if v.is_null() {
        return;
    }
    if let Some(format) = rule.format {
        if let Some(message) = check_format(field, v, format) {
            errors.push(field, message);
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max {
                errors.push(field, format!("{} must be at most {} characters", field, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min {
                errors.push(field, format!("{} must be at least {} characters", field, min));
            }
        }
        if let Some(re) = &rule.pattern {
            if !re.is_match(s) {
                errors.push(field, format!("{} does not match required pattern", field));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(
                field,
                format!(
                    "{} must be one of: {:?}",
                    field,
                    allowed.iter().take(5).collect::<Vec<_>>()
                ),
            );
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.push(field, format!("{} must be at least {}", field, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.push(field, format!("{} must be at most {}", field, max));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(field: &str, v: &Value, format: Format) -> Option<String> {
    let s = v.as_str()?;
    match format {
        Format::Email if !s.contains('@') || s.len() < 3 => {
            Some(format!("{} must be a valid email", field))
        }
        Format::Uuid if uuid::Uuid::parse_str(s).is_err() => {
            Some(format!("{} must be a valid UUID", field))
        }
        _ => None,
    }
}
