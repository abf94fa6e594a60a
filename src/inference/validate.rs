//! Request validation - raw JSON or form input into a `PredictionRequest`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{FeatureVector, FEATURE_NAMES};

/// Four iris measurements, all finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl PredictionRequest {
    /// Feature vector in model column order.
    pub fn features(&self) -> FeatureVector {
        [self.sepal_length, self.sepal_width, self.petal_length, self.petal_width]
    }

    fn from_features(f: FeatureVector) -> Self {
        Self {
            sepal_length: f[0],
            sepal_width: f[1],
            petal_length: f[2],
            petal_width: f[3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    NotANumber,
    NotFinite,
    NotAnObject,
    /// Rule reported by a derive-based validator.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(skip)]
    pub kind: IssueKind,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, kind: IssueKind) -> Self {
        let message = match kind {
            IssueKind::Missing => "field required",
            IssueKind::NotANumber => "value is not a valid number",
            IssueKind::NotFinite => "value must be a finite number",
            IssueKind::NotAnObject => "expected an object with the four measurements",
            IssueKind::Invalid => "value is invalid",
        };
        Self {
            field: field.into(),
            kind,
            message: message.to_string(),
        }
    }

    pub fn with_message(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IssueKind::Invalid,
            message: message.into(),
        }
    }
}

/// Every field that failed, in declaration order.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid input ({})", summary(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.issues
            .iter()
            .find(|i| i.field == field)
            .map(|i| i.message.as_str())
    }
}

fn summary(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut issues: Vec<FieldIssue> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => FieldIssue::with_message(field.clone(), msg.to_string()),
                    None => FieldIssue::with_message(field.clone(), format!("failed rule '{}'", e.code)),
                })
            })
            .collect();
        issues.sort_by(|a, b| a.field.cmp(&b.field));
        Self { issues }
    }
}

enum Raw<'a> {
    Absent,
    Text(&'a str),
    Other,
}

/// Parse a JSON body. Numeric strings are coerced.
///
/// Numbers are read from their source text, so a literal too large for
/// `f64` reports as not finite on its own field.
pub fn parse_json(body: &Value) -> Result<PredictionRequest, ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError {
            issues: vec![FieldIssue::new("body", IssueKind::NotAnObject)],
        });
    };

    let numbers: HashMap<&str, String> = FEATURE_NAMES
        .iter()
        .filter_map(|&name| match object.get(name) {
            Some(Value::Number(n)) => Some((name, n.to_string())),
            _ => None,
        })
        .collect();

    parse_with(|name| match object.get(name) {
        None | Some(Value::Null) => Raw::Absent,
        Some(Value::Number(_)) => numbers.get(name).map_or(Raw::Other, |n| Raw::Text(n.as_str())),
        Some(Value::String(s)) => Raw::Text(s),
        Some(_) => Raw::Other,
    })
}

/// Parse url-encoded form fields.
pub fn parse_form(fields: &HashMap<String, String>) -> Result<PredictionRequest, ValidationError> {
    parse_with(|name| match fields.get(name) {
        None => Raw::Absent,
        Some(s) => Raw::Text(s),
    })
}

fn parse_with<'a, F>(get: F) -> Result<PredictionRequest, ValidationError>
where
    F: Fn(&str) -> Raw<'a>,
{
    let mut values = [0.0; 4];
    let mut issues = Vec::new();

    for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
        let parsed = match get(name) {
            Raw::Absent => Err(IssueKind::Missing),
            Raw::Text(s) if s.trim().is_empty() => Err(IssueKind::Missing),
            Raw::Text(s) => s.trim().parse::<f64>().map_err(|_| IssueKind::NotANumber),
            Raw::Other => Err(IssueKind::NotANumber),
        }
        .and_then(|v| if v.is_finite() { Ok(v) } else { Err(IssueKind::NotFinite) });

        match parsed {
            Ok(v) => *slot = v,
            Err(kind) => issues.push(FieldIssue::new(name, kind)),
        }
    }

    if issues.is_empty() {
        Ok(PredictionRequest::from_features(values))
    } else {
        Err(ValidationError { issues })
    }
}
