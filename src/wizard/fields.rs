//! Step field schemas and validation.
//!
//! Raw submissions arrive as loose JSON objects; validation coerces them into
//! typed `Fields` maps or rejects them with per-field message keys. Money
//! fields accept grouped input ("1,250,000") and must parse to non-negative
//! finite numbers. Email format is checked only when the step's opt-in flag
//! is set.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Upper bound on monetary inputs (matches the form-level range cap).
pub const MAX_AMOUNT: f64 = 10_000_000_000.0;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}


// ─── Values ───────────────────────────────────────────────────────────────────

/// One validated field value. Serialized untagged so draft JSON reads as a
/// plain object of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Count(i64),
    Number(f64),
    Text(String),
}

/// Validated field values for one or more steps of a wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(pub BTreeMap<String, FieldValue>);

impl Fields {
    pub fn number(&self, name: &str) -> f64 {
        match self.0.get(name) {
            Some(FieldValue::Number(n)) => *n,
            Some(FieldValue::Count(n)) => *n as f64,
            _ => 0.0,
        }
    }

    pub fn count(&self, name: &str) -> i64 {
        match self.0.get(name) {
            Some(FieldValue::Count(n)) => *n,
            Some(FieldValue::Number(n)) => *n as i64,
            _ => 0,
        }
    }

    pub fn text(&self, name: &str) -> &str {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(FieldValue::Flag(true)))
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.0.insert(name.to_string(), value);
    }

    /// Union with `other`; values from `other` win on key collisions.
    pub fn merge(&mut self, other: &Fields) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

// ─── Schemas ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    Email,
    /// Non-negative monetary amount; grouping separators stripped.
    Money,
    /// Non-negative percentage/rate.
    Rate,
    Count {
        min: i64,
    },
    Flag,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub number: u32,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    /// `(flag_field, email_field)` — email format is validated only when the
    /// flag field is set on this submission.
    pub email_opt_in: Option<(&'static str, &'static str)>,
}

// ─── Validation ───────────────────────────────────────────────────────────────

type FieldErrors = BTreeMap<String, String>;

/// Validate one step's raw submission against its schema. Returns the typed
/// field map, or per-field message keys with nothing written anywhere.
pub fn validate_step(
    spec: &StepSpec,
    raw: &serde_json::Map<String, Value>,
) -> Result<Fields, FieldErrors> {
    let mut out = Fields::default();
    let mut errors = FieldErrors::new();

    for field in spec.fields {
        let value = raw.get(field.name);
        match field.kind {
            FieldKind::Text => match text_of(value) {
                Some(s) if !s.is_empty() => out.insert(field.name, FieldValue::Text(s)),
                _ if field.required => {
                    errors.insert(field.name.to_string(), format!("{}_required", field.name));
                }
                _ => out.insert(field.name, FieldValue::Text(String::new())),
            },
            FieldKind::Email => {
                let s = text_of(value).unwrap_or_default();
                if s.is_empty() && field.required {
                    errors.insert(field.name.to_string(), format!("{}_required", field.name));
                } else {
                    out.insert(field.name, FieldValue::Text(s));
                }
            }
            FieldKind::Money | FieldKind::Rate => match numeric_of(value) {
                Ok(Some(n)) => {
                    if n < 0.0 || !n.is_finite() {
                        errors.insert(field.name.to_string(), format!("{}_invalid", field.name));
                    } else if matches!(field.kind, FieldKind::Money) && n > MAX_AMOUNT {
                        errors.insert(field.name.to_string(), format!("{}_max", field.name));
                    } else {
                        out.insert(field.name, FieldValue::Number(n));
                    }
                }
                Ok(None) if field.required => {
                    errors.insert(field.name.to_string(), format!("{}_required", field.name));
                }
                Ok(None) => out.insert(field.name, FieldValue::Number(0.0)),
                Err(()) => {
                    errors.insert(field.name.to_string(), format!("{}_invalid", field.name));
                }
            },
            FieldKind::Count { min } => match numeric_of(value) {
                Ok(Some(n)) => {
                    let i = n as i64;
                    if !n.is_finite() || n.fract() != 0.0 || i < min {
                        errors.insert(field.name.to_string(), format!("{}_invalid", field.name));
                    } else {
                        out.insert(field.name, FieldValue::Count(i));
                    }
                }
                Ok(None) if field.required => {
                    errors.insert(field.name.to_string(), format!("{}_required", field.name));
                }
                Ok(None) => out.insert(field.name, FieldValue::Count(min.max(0))),
                Err(()) => {
                    errors.insert(field.name.to_string(), format!("{}_invalid", field.name));
                }
            },
            FieldKind::Flag => out.insert(field.name, FieldValue::Flag(flag_of(value))),
            FieldKind::Choice(options) => match text_of(value) {
                Some(s) if options.contains(&s.as_str()) => {
                    out.insert(field.name, FieldValue::Text(s))
                }
                Some(_) => {
                    errors.insert(field.name.to_string(), format!("{}_invalid", field.name));
                }
                None if field.required => {
                    errors.insert(field.name.to_string(), format!("{}_required", field.name));
                }
                // optional choice falls back to the first option
                None => out.insert(field.name, FieldValue::Text(options[0].to_string())),
            },
        }
    }

    // Email format gate: checked only when the opt-in flag is set.
    if let Some((flag_field, email_field)) = spec.email_opt_in {
        if out.flag(flag_field) {
            let email = out.text(email_field);
            if email.is_empty() {
                errors.insert(email_field.to_string(), format!("{email_field}_required"));
            } else if !is_valid_email(email) {
                errors.insert(email_field.to_string(), format!("{email_field}_invalid"));
            }
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let t = s.trim().to_string();
            if t.is_empty() {
                None
            } else {
                Some(t)
            }
        }
        _ => None,
    }
}

/// Coerce a raw value to a number. Strings get grouping separators stripped
/// ("1,250,000" parses as 1250000). `Ok(None)` means absent/empty.
fn numeric_of(value: Option<&Value>) -> Result<Option<f64>, ()> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.as_f64().ok_or(())?)),
        Some(Value::String(s)) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned.parse::<f64>().map(Some).map_err(|_| ())
        }
        Some(_) => Err(()),
    }
}

fn flag_of(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "on" | "1"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}
