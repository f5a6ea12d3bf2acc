//! Shared validation and sanitization for the demo-request contact form.
//!
//! Both the browser-facing submission client and the Lambda handler validate
//! with this crate, so the two sides of the wire can never drift apart.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Free-text fields are cut off at this many characters before being embedded
/// anywhere.
pub const MAX_FIELD_LENGTH: usize = 1000;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

/// The six submission fields, in the order they are validated and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    GivenName,
    FamilyName,
    Email,
    Organization,
    Category,
    Message,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::GivenName,
        Field::FamilyName,
        Field::Email,
        Field::Organization,
        Field::Category,
        Field::Message,
    ];

    /// The field's name on the wire, which is also the name shown in
    /// validation messages.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Field::GivenName => "nombre",
            Field::FamilyName => "apellido",
            Field::Email => "email",
            Field::Organization => "empresa",
            Field::Category => "rubro",
            Field::Message => "mensaje",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// The raw submission record as it arrives over the wire. Non-string values
/// coerce to the empty string rather than failing deserialization, so a
/// malformed field reads as missing instead of aborting the whole request.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SubmissionPayload {
    #[serde(rename = "nombre", default, deserialize_with = "lenient_string")]
    pub given_name: String,
    #[serde(rename = "apellido", default, deserialize_with = "lenient_string")]
    pub family_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(rename = "empresa", default, deserialize_with = "lenient_string")]
    pub organization: String,
    #[serde(rename = "rubro", default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(rename = "mensaje", default, deserialize_with = "lenient_string")]
    pub message: String,
}

impl SubmissionPayload {
    fn field(&self, field: Field) -> &str {
        match field {
            Field::GivenName => &self.given_name,
            Field::FamilyName => &self.family_name,
            Field::Email => &self.email,
            Field::Organization => &self.organization,
            Field::Category => &self.category,
            Field::Message => &self.message,
        }
    }

    /// Sanitizes every field and checks the record invariants. Reports the
    /// first empty field in wire order, then the email shape.
    pub fn validate(&self) -> Result<Submission, ValidationError> {
        let sanitized = Field::ALL.map(|field| sanitize(self.field(field)));
        for (field, value) in Field::ALL.iter().zip(&sanitized) {
            if value.is_empty() {
                return Err(ValidationError::MissingField(*field));
            }
        }
        if !is_valid_email(&sanitized[2]) {
            return Err(ValidationError::InvalidEmail);
        }
        let [given_name, family_name, email, organization, category, message] = sanitized;
        Ok(Submission {
            given_name,
            family_name,
            email,
            organization,
            category,
            message,
        })
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

/// A validated submission: every field sanitized and non-empty, the email
/// shape-checked. Serializes back to the wire names, so the client posts
/// exactly what it validated.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    #[serde(rename = "nombre")]
    pub given_name: String,
    #[serde(rename = "apellido")]
    pub family_name: String,
    pub email: String,
    #[serde(rename = "empresa")]
    pub organization: String,
    #[serde(rename = "rubro")]
    pub category: String,
    #[serde(rename = "mensaje")]
    pub message: String,
}

/// Strips markup-significant angle brackets, trims surrounding whitespace and
/// cuts the result off at [`MAX_FIELD_LENGTH`] characters.
///
/// Idempotent: the truncation point is trimmed again so a second application
/// is a no-op.
pub fn sanitize(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let trimmed = stripped.trim();
    match trimmed.char_indices().nth(MAX_FIELD_LENGTH) {
        Some((boundary, _)) => trimmed[..boundary].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Shape check in the sense of `local@domain.tld`, not RFC 5322 compliance.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(EMAIL_PATTERN).unwrap())
        .is_match(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(Field),
    InvalidEmail,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => {
                write!(f, "El campo {field} es requerido")
            }
            ValidationError::InvalidEmail => write!(f, "Email inválido"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The JSON body every handler response carries, and what the client reads
/// back after posting.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(
        rename = "messageId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
