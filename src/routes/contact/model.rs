use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_SUBJECT_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

/// A validated submission, ready to be forwarded to the shop owner.
#[derive(Debug, Clone, Serialize)]
pub struct ContactSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: String,
    pub received_at: i64,
}

impl ContactRequest {
    pub fn into_submission(self) -> Result<ContactSubmission, AppError> {
        let name = required("name", &self.name, MAX_NAME_LEN)?;
        let email = required("email", &self.email, MAX_EMAIL_LEN)?;
        if !looks_like_email(&email) {
            return Err(AppError::Validation("email is not a valid address".into()));
        }
        let message = required("message", &self.message, MAX_MESSAGE_LEN)?;
        let phone = optional("phone", self.phone, MAX_PHONE_LEN)?;
        let subject = optional("subject", self.subject, MAX_SUBJECT_LEN)?;

        Ok(ContactSubmission {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            phone,
            subject,
            message,
            received_at: Utc::now(),
        })
    }
}

fn required(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<String>, max: usize) -> Result<Option<String>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.into(),
            email: email.into(),
            phone: None,
            subject: None,
            message: message.into(),
        }
    }

    #[test]
    fn valid_submission_is_trimmed_and_stamped() {
        let mut req = request("  Ada  ", "ada@example.com", " Is the mower in stock? ");
        req.phone = Some("   ".into());
        req.subject = Some("Stock".into());
        let s = req.into_submission().unwrap();
        assert_eq!(s.name, "Ada");
        assert_eq!(s.message, "Is the mower in stock?");
        assert_eq!(s.phone, None);
        assert_eq!(s.subject.as_deref(), Some("Stock"));
        assert_eq!(s.id.len(), 36);
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert!(request("", "a@b.co", "hi").into_submission().is_err());
        assert!(request("Ada", "a@b.co", "   ").into_submission().is_err());
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["ada", "ada@", "@example.com", "ada@example", "a da@example.com"] {
            assert!(
                request("Ada", email, "hi").into_submission().is_err(),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn overlong_message_is_rejected() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(request("Ada", "ada@example.com", &long).into_submission().is_err());
    }
}
