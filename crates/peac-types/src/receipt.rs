//! The discriminated-union receipt claim model (spec §3, §4.3).
//!
//! A receipt's claim tree is one of two closed variants — [`CommerceClaims`]
//! or [`AttestationClaims`] — selected by [`discriminate`] on raw JSON
//! before any field-level validation runs. Downstream code (`peac-receipt`,
//! `peac-bundle`, `peac-report`) dispatches on [`ReceiptVariant`], never on
//! ad hoc field presence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReceiptSchemaError, ReceiptSchemaResult, SchemaIssue, MAX_SCHEMA_ISSUES};

/// A commerce payment rail reference, required on every [`CommerceClaims`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub rail: String,
    pub reference: String,
    pub amount: f64,
    pub currency: String,
}

/// The subject a receipt is about, carried as a single URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub uri: String,
}

/// Caller-defined control metadata. Opaque to this crate — passed through
/// unexamined on issue, verify, and normalize.
pub type Control = Value;

/// Claims of a receipt carrying a commerce payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommerceClaims {
    pub iss: String,
    pub aud: String,
    pub rid: String,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub amt: f64,
    pub cur: String,
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<Control>,
}

/// Claims of a receipt attesting that an event occurred, with no payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationClaims {
    pub iss: String,
    pub aud: String,
    pub rid: String,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<Control>,
}

/// The closed tagged union a claim tree parses into.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptVariant {
    Commerce(CommerceClaims),
    Attestation(AttestationClaims),
}

impl ReceiptVariant {
    #[must_use]
    pub fn rid(&self) -> &str {
        match self {
            Self::Commerce(c) => &c.rid,
            Self::Attestation(a) => &a.rid,
        }
    }

    #[must_use]
    pub fn iat(&self) -> i64 {
        match self {
            Self::Commerce(c) => c.iat,
            Self::Attestation(a) => a.iat,
        }
    }

    #[must_use]
    pub fn exp(&self) -> Option<i64> {
        match self {
            Self::Commerce(c) => c.exp,
            Self::Attestation(a) => a.exp,
        }
    }

    #[must_use]
    pub fn iss(&self) -> &str {
        match self {
            Self::Commerce(c) => &c.iss,
            Self::Attestation(a) => &a.iss,
        }
    }

    #[must_use]
    pub fn aud(&self) -> &str {
        match self {
            Self::Commerce(c) => &c.aud,
            Self::Attestation(a) => &a.aud,
        }
    }

    #[must_use]
    pub fn subject_uri(&self) -> Option<&str> {
        match self {
            Self::Commerce(c) => c.subject.as_ref().map(|s| s.uri.as_str()),
            Self::Attestation(a) => a.subject.as_ref().map(|s| s.uri.as_str()),
        }
    }

    /// Normalize to the flat shape required by spec §4.3. Idempotent and
    /// total on any value this module produced.
    #[must_use]
    pub fn to_core_claims(&self) -> CoreClaims {
        match self {
            Self::Commerce(c) => CoreClaims {
                iss: c.iss.clone(),
                aud: c.aud.clone(),
                rid: c.rid.clone(),
                iat: c.iat,
                exp: c.exp,
                amt: Some(c.amt),
                cur: Some(c.cur.clone()),
                payment: Some(c.payment.clone()),
                subject: c.subject.clone(),
                control: c.control.clone(),
            },
            Self::Attestation(a) => CoreClaims {
                iss: a.iss.clone(),
                aud: a.aud.clone(),
                rid: a.rid.clone(),
                iat: a.iat,
                exp: a.exp,
                amt: None,
                cur: None,
                payment: None,
                subject: a.subject.clone(),
                control: a.control.clone(),
            },
        }
    }
}

/// The flat `{iss, aud, rid, iat, exp, amt, cur, payment, subject, control}`
/// shape produced by [`ReceiptVariant::to_core_claims`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreClaims {
    pub iss: String,
    pub aud: String,
    pub rid: String,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<Control>,
}

/// Apply the spec §3 discrimination rule to a raw claim object: presence of
/// any of `amt`, `cur`, `payment` selects the commerce branch.
#[must_use]
pub fn is_commerce(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("amt") || obj.contains_key("cur") || obj.contains_key("payment"))
}

/// Parse and validate a raw claim object into its discriminated variant.
///
/// Accepts either `rid` or `jti` as the receipt identifier field (`rid`
/// preferred when both are present); [`ReceiptVariant::to_core_claims`] and
/// every serialized form this crate produces always emit `rid`.
///
/// # Errors
/// Returns [`ReceiptSchemaError::CommerceInvalid`] or
/// [`ReceiptSchemaError::AttestationInvalid`] with up to
/// [`MAX_SCHEMA_ISSUES`] structural issues.
pub fn parse_claims(value: &Value) -> ReceiptSchemaResult<ReceiptVariant> {
    if is_commerce(value) {
        parse_commerce(value).map(ReceiptVariant::Commerce)
    } else {
        parse_attestation(value).map(ReceiptVariant::Attestation)
    }
}

fn receipt_id(obj: &serde_json::Map<String, Value>, issues: &mut Vec<SchemaIssue>) -> Option<String> {
    match obj.get("rid").or_else(|| obj.get("jti")) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => {
            push_issue(issues, "$.rid", "rid (or jti) must be a non-empty string");
            None
        }
        None => {
            push_issue(issues, "$.rid", "rid (or jti) is required");
            None
        }
    }
}

fn push_issue(issues: &mut Vec<SchemaIssue>, path: &str, message: &str) {
    if issues.len() < MAX_SCHEMA_ISSUES {
        issues.push(SchemaIssue::new(path, message));
    }
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    key: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => {
            push_issue(issues, &format!("$.{key}"), &format!("{key} must be a non-empty string"));
            None
        }
        None => {
            push_issue(issues, &format!("$.{key}"), &format!("{key} is required"));
            None
        }
    }
}

fn required_i64(obj: &serde_json::Map<String, Value>, key: &str, issues: &mut Vec<SchemaIssue>) -> Option<i64> {
    match obj.get(key) {
        Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
        Some(_) => {
            push_issue(issues, &format!("$.{key}"), &format!("{key} must be an integer"));
            None
        }
        None => {
            push_issue(issues, &format!("$.{key}"), &format!("{key} is required"));
            None
        }
    }
}

fn optional_i64(obj: &serde_json::Map<String, Value>, key: &str, issues: &mut Vec<SchemaIssue>) -> Option<i64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
        Some(_) => {
            push_issue(issues, &format!("$.{key}"), &format!("{key} must be an integer when present"));
            None
        }
    }
}

fn optional_subject(obj: &serde_json::Map<String, Value>, issues: &mut Vec<SchemaIssue>) -> Option<Subject> {
    if let Some(subject_val) = obj.get("subject") {
        if let Some(uri) = subject_val.get("uri").and_then(Value::as_str) {
            return Some(Subject { uri: uri.to_string() });
        }
        push_issue(issues, "$.subject.uri", "subject.uri must be a string when subject is present");
        return None;
    }
    match obj.get("sub") {
        Some(Value::String(uri)) => Some(Subject { uri: uri.clone() }),
        Some(_) => {
            push_issue(issues, "$.sub", "sub must be a string when present");
            None
        }
        None => None,
    }
}

fn parse_commerce(value: &Value) -> ReceiptSchemaResult<CommerceClaims> {
    let mut issues = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(ReceiptSchemaError::CommerceInvalid {
            issues: vec![SchemaIssue::new("$", "claims must be a JSON object")],
        });
    };

    let iss = required_string(obj, "iss", &mut issues);
    let aud = required_string(obj, "aud", &mut issues);
    let rid = receipt_id(obj, &mut issues);
    let iat = required_i64(obj, "iat", &mut issues);
    let exp = optional_i64(obj, "exp", &mut issues);
    let amt = match obj.get("amt") {
        Some(Value::Number(n)) => n.as_f64(),
        _ => {
            push_issue(&mut issues, "$.amt", "amt is required and must be a number");
            None
        }
    };
    let cur = required_string(obj, "cur", &mut issues);
    let payment = parse_payment(obj, &mut issues);
    let subject = optional_subject(obj, &mut issues);
    let control = obj.get("control").cloned();

    match (iss, aud, rid, iat, amt, cur, payment) {
        (Some(iss), Some(aud), Some(rid), Some(iat), Some(amt), Some(cur), Some(payment)) if issues.is_empty() => {
            Ok(CommerceClaims {
                iss,
                aud,
                rid,
                iat,
                exp,
                amt,
                cur,
                payment,
                subject,
                control,
            })
        }
        _ => Err(ReceiptSchemaError::CommerceInvalid { issues }),
    }
}

fn parse_payment(obj: &serde_json::Map<String, Value>, issues: &mut Vec<SchemaIssue>) -> Option<Payment> {
    let Some(payment_val) = obj.get("payment") else {
        push_issue(issues, "$.payment", "payment is required");
        return None;
    };
    let Some(payment_obj) = payment_val.as_object() else {
        push_issue(issues, "$.payment", "payment must be an object");
        return None;
    };
    let rail = required_string(payment_obj, "rail", issues);
    let reference = required_string(payment_obj, "reference", issues);
    let amount = match payment_obj.get("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        _ => {
            push_issue(issues, "$.payment.amount", "payment.amount is required and must be a number");
            None
        }
    };
    let currency = required_string(payment_obj, "currency", issues);
    match (rail, reference, amount, currency) {
        (Some(rail), Some(reference), Some(amount), Some(currency)) => Some(Payment {
            rail,
            reference,
            amount,
            currency,
        }),
        _ => None,
    }
}

fn parse_attestation(value: &Value) -> ReceiptSchemaResult<AttestationClaims> {
    let mut issues = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(ReceiptSchemaError::AttestationInvalid {
            issues: vec![SchemaIssue::new("$", "claims must be a JSON object")],
        });
    };

    let iss = required_string(obj, "iss", &mut issues);
    let aud = required_string(obj, "aud", &mut issues);
    let rid = receipt_id(obj, &mut issues);
    let iat = required_i64(obj, "iat", &mut issues);
    let exp = optional_i64(obj, "exp", &mut issues);
    let subject = optional_subject(obj, &mut issues);
    let control = obj.get("control").cloned();

    match (iss, aud, rid, iat) {
        (Some(iss), Some(aud), Some(rid), Some(iat)) if issues.is_empty() => Ok(AttestationClaims {
            iss,
            aud,
            rid,
            iat,
            exp,
            subject,
            control,
        }),
        _ => Err(ReceiptSchemaError::AttestationInvalid { issues }),
    }
}
