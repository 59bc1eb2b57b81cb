// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration form validation.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::AuthError;
use crate::models::UserType;
use crate::services::session::SignUpRequest;

/// Fields checked in this order; the first failure is reported.
const FIELD_ORDER: &[&str] = &["name", "email", "confirm_password", "password", "__all__"];

/// Registration form as submitted by the user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_agent_phone"))]
pub struct RegistrationForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub phone: Option<String>,
}

fn validate_agent_phone(form: &RegistrationForm) -> Result<(), ValidationError> {
    let has_phone = form.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
    if form.user_type == UserType::Agent && !has_phone {
        return Err(ValidationError::new("phone_required")
            .with_message("Phone number is required for agents".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    /// The form failed validation; nothing was sent.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl RegistrationForm {
    /// Validate and split into credentials and sign-up details.
    pub fn into_sign_up(self) -> Result<(String, String, SignUpRequest), RegistrationError> {
        self.check()?;

        let phone = match self.user_type {
            UserType::Agent => self.phone.map(|p| p.trim().to_string()),
            UserType::Buyer => None,
        };
        let request = SignUpRequest {
            name: self.name.trim().to_string(),
            user_type: self.user_type,
            phone,
        };
        Ok((self.email.trim().to_string(), self.password, request))
    }

    /// Run all rules and report the first failure.
    pub fn check(&self) -> Result<(), RegistrationError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };

        let fields = errors.field_errors();
        let message = FIELD_ORDER
            .iter()
            .filter_map(|field| fields.get(*field))
            .chain(fields.values())
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid registration details".to_string());

        Err(RegistrationError::Invalid(message))
    }
}
