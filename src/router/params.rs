//! Parameter rules: per-name validation and conversion of extracted path segments.
//!
//! A rule is registered once per parameter name (for example `:id`) and is
//! consulted by the matcher for every pattern segment carrying that name.
//! Checking produces an explicit three-state [`ParamCheck`] so that legitimate
//! `0`, `false` and empty values are never confused with a failed validation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ConfigError;

/// Typed value extracted from a path segment.
///
/// Without a converter every value stays a [`ParamValue::Str`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
}

impl ParamValue {
    /// Borrow the value as a string when it was not converted
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Outcome of checking one raw value against the rule for its name.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamCheck {
    /// Rule exists and the value passed; carries the (possibly converted) value
    Valid(ParamValue),
    /// Rule exists and the value failed validation or conversion
    Invalid,
    /// No rule registered for this name; the raw value is used unchanged
    NotApplicable,
}

/// How a raw segment value is validated.
#[derive(Clone)]
pub enum Validation {
    /// Always accepts, useful together with a converter
    Any,
    /// Signed 64-bit integer without leading zeros
    Int,
    /// Finite decimal number with optional exponent
    Float,
    /// One of `1, true, on, yes, 0, false, off, no` (case-insensitive)
    Bool,
    /// Regular expression tested against the raw value
    Regex(Regex),
    /// Custom predicate
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Any => write!(f, "Any"),
            Validation::Int => write!(f, "Int"),
            Validation::Float => write!(f, "Float"),
            Validation::Bool => write!(f, "Bool"),
            Validation::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Validation::Predicate(_) => write!(f, "Predicate(<function>)"),
        }
    }
}

impl Validation {
    /// Build a validation from a keyword (`any`, `int`, `float`, `bool`) or a
    /// regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValidation`] when the text is neither a
    /// keyword nor a valid regular expression.
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "any" => Ok(Validation::Any),
            "int" => Ok(Validation::Int),
            "float" => Ok(Validation::Float),
            "bool" => Ok(Validation::Bool),
            "" => Err(ConfigError::InvalidValidation {
                name: name.to_string(),
                value: value.to_string(),
            }),
            pattern => Regex::new(pattern)
                .map(Validation::Regex)
                .map_err(|_| ConfigError::InvalidValidation {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// Custom predicate validation
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Validation::Predicate(Arc::new(f))
    }

    /// Test a raw (already percent-decoded) value
    #[must_use]
    pub fn is_valid(&self, value: &str) -> bool {
        match self {
            Validation::Any => true,
            Validation::Int => parse_int(value).is_some(),
            Validation::Float => parse_float(value).is_some(),
            Validation::Bool => parse_bool(value).is_some(),
            Validation::Regex(re) => re.is_match(value),
            Validation::Predicate(f) => f(value),
        }
    }
}

/// How a validated value is converted.
#[derive(Clone)]
pub enum Converter {
    Int,
    Float,
    /// `1, true, on, yes` become `true`, everything else `false`
    Bool,
    /// Custom transform; `None` rejects the value
    Custom(Arc<dyn Fn(&str) -> Option<ParamValue> + Send + Sync>),
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Int => write!(f, "Int"),
            Converter::Float => write!(f, "Float"),
            Converter::Bool => write!(f, "Bool"),
            Converter::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl Converter {
    /// Build a converter from a keyword (`int`, `float`, `bool`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConverter`] for any other keyword.
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "int" => Ok(Converter::Int),
            "float" => Ok(Converter::Float),
            "bool" => Ok(Converter::Bool),
            other => Err(ConfigError::InvalidConverter {
                name: name.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Custom transform
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<ParamValue> + Send + Sync + 'static,
    {
        Converter::Custom(Arc::new(f))
    }

    /// Convert a value that already passed validation
    #[must_use]
    pub fn convert(&self, value: &str) -> Option<ParamValue> {
        match self {
            Converter::Int => parse_int(value)
                .or_else(|| parse_float(value).and_then(float_to_int))
                .map(ParamValue::Int),
            Converter::Float => parse_float(value).map(ParamValue::Float),
            Converter::Bool => Some(ParamValue::Bool(matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            ))),
            Converter::Custom(f) => f(value),
        }
    }
}

/// Rule for one parameter name.
#[derive(Debug, Clone)]
pub struct ParamRule {
    pub name: String,
    pub validation: Validation,
    pub converter: Option<Converter>,
}

impl ParamRule {
    /// Validate then convert a raw value
    #[must_use]
    pub fn check(&self, value: &str) -> ParamCheck {
        if !self.validation.is_valid(value) {
            return ParamCheck::Invalid;
        }
        match &self.converter {
            None => ParamCheck::Valid(ParamValue::Str(value.to_string())),
            Some(conv) => match conv.convert(value) {
                Some(v) => ParamCheck::Valid(v),
                None => ParamCheck::Invalid,
            },
        }
    }
}

/// Registry of parameter rules keyed by name (including the `:` sigil).
#[derive(Debug, Clone, Default)]
pub struct ParamRules {
    rules: HashMap<String, ParamRule>,
}

impl ParamRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidParamName`] when `name` does not start with `:`
    /// - [`ConfigError::DuplicateParam`] when a rule for `name` already exists
    pub fn define(
        &mut self,
        name: &str,
        validation: Validation,
        converter: Option<Converter>,
    ) -> Result<(), ConfigError> {
        if !name.starts_with(':') || name.len() < 2 {
            return Err(ConfigError::InvalidParamName {
                name: name.to_string(),
            });
        }
        if self.rules.contains_key(name) {
            return Err(ConfigError::DuplicateParam {
                name: name.to_string(),
            });
        }
        info!(
            param = %name,
            validation = ?validation,
            converter = ?converter,
            "Parameter rule registered"
        );
        self.rules.insert(
            name.to_string(),
            ParamRule {
                name: name.to_string(),
                validation,
                converter,
            },
        );
        Ok(())
    }

    /// Check a raw value for the parameter `name`
    #[must_use]
    pub fn check(&self, name: &str, value: &str) -> ParamCheck {
        match self.rules.get(name) {
            None => ParamCheck::NotApplicable,
            Some(rule) => {
                let result = rule.check(value);
                if result == ParamCheck::Invalid {
                    debug!(param = %name, value = %value, "Parameter rejected by rule");
                }
                result
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamRule> {
        self.rules.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    value.parse::<i64>().ok()
}

/// Truncate toward zero, rejecting values outside the `i64` range.
fn float_to_int(f: f64) -> Option<i64> {
    let t = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if t >= -(2f64.powi(63)) && t < 2f64.powi(63) {
        Some(t as i64)
    } else {
        None
    }
}

fn parse_float(value: &str) -> Option<f64> {
    // f64::from_str also accepts "inf" and "NaN"; only plain decimals are valid here.
    if value.is_empty()
        || !value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        || !value.bytes().any(|b| b.is_ascii_digit())
    {
        return None;
    }
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
