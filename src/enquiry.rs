// Enquiry form validation and submission

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::dealer_api::DealerApi;
use crate::error::ApiError;
use crate::models::ListingId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryForm {
    #[serde(default)]
    #[validate(length(min = 2, message = "Name is too short"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[validate(required(message = "Select a car to enquire about"))]
    pub car_id: Option<ListingId>,
}

/// Field name -> message, shown next to the offending input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: &str) {
        self.0.entry(field).or_insert_with(|| message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnquiryOutcome {
    Submitted,
    /// The backend answered 409: this user already enquired about this car.
    AlreadyInquired,
}

#[derive(Debug, Error)]
pub enum EnquiryError {
    #[error("enquiry form is invalid")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl EnquiryForm {
    fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            message: self.message.trim().to_string(),
            car_id: self.car_id.clone(),
        }
    }

    /// Runs the form rules on trimmed input and keeps one message per field.
    pub fn validate_fields(&self) -> Result<(), ValidationErrors> {
        let form = self.trimmed();
        let mut errors = ValidationErrors::default();

        // Blank beats malformed
        for (field, value, message) in [
            ("name", &form.name, "Name is required"),
            ("email", &form.email, "Email is required"),
            ("phone", &form.phone, "Phone number is required"),
        ] {
            if value.is_empty() {
                errors.add(field, message);
            }
        }

        if let Err(report) = form.validate() {
            for (field, failures) in report.field_errors() {
                let key = match &*field {
                    "name" => "name",
                    "email" => "email",
                    "phone" => "phone",
                    "message" => "message",
                    "car_id" | "carId" => "carId",
                    other => {
                        tracing::debug!(field = other, "Ignoring unknown enquiry field error");
                        continue;
                    }
                };
                if let Some(message) = failures.iter().find_map(|f| f.message.as_ref()) {
                    errors.add(key, message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if allowed && (7..=15).contains(&digits) {
        return Ok(());
    }
    let mut error = ValidationError::new("phone");
    error.message = Some("Enter a valid phone number".into());
    Err(error)
}

/// Validates then submits. A 409 from the backend is an outcome, not an error.
pub async fn submit_enquiry(api: &DealerApi, form: &EnquiryForm) -> Result<EnquiryOutcome, EnquiryError> {
    form.validate_fields().map_err(EnquiryError::Invalid)?;

    let payload = json!({
        "name": form.name.trim(),
        "email": form.email.trim(),
        "phone": form.phone.trim(),
        "message": form.message.trim(),
        "carId": form.car_id,
    });

    match api.submit_enquiry(&payload).await {
        Ok(_) => {
            tracing::info!(car_id = ?form.car_id, "Enquiry submitted");
            Ok(EnquiryOutcome::Submitted)
        }
        Err(ApiError::Conflict(message)) => {
            tracing::info!(car_id = ?form.car_id, %message, "Enquiry already submitted for this car");
            Ok(EnquiryOutcome::AlreadyInquired)
        }
        Err(e) => Err(e.into()),
    }
}
