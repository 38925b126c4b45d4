use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

pub const MIN_PASSWORD_LENGTH: usize = 12;

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),
    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct RegistrationForm {
    pub email: String,
    #[validate(min_length = 12)]
    pub password: String,
    #[serde(skip_serializing)]
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Client-side checks, run before any request is made.
    pub fn check(&self) -> Result<(), RegistrationError> {
        if !EMAIL_SHAPE.is_match(self.email.trim()) {
            return Err(RegistrationError::InvalidEmail);
        }

        if self.validate().is_err() {
            return Err(RegistrationError::PasswordTooShort(MIN_PASSWORD_LENGTH));
        }

        if self.password != self.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }

        Ok(())
    }
}
