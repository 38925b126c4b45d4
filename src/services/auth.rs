//! Sign-up and authentication error handling.

use std::time::Duration;

use tracing::Instrument;

use crate::connectors::{ConnectorError, DataGateway, SignUpResponse};
use crate::forms::{RegistrationError, RegistrationForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    PopupBlocked,
    Cancelled,
    Network,
    RateLimited,
    Unknown,
}

impl AuthErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthErrorKind::PopupBlocked => {
                "The sign-in popup was blocked. Please allow popups for this site and try again."
            }
            AuthErrorKind::Cancelled => "Sign-in was cancelled.",
            AuthErrorKind::Network => {
                "Network error. Please check your connection and try again."
            }
            AuthErrorKind::RateLimited => "Too many attempts. Please wait a moment and try again.",
            AuthErrorKind::Unknown => "Something went wrong. Please try again.",
        }
    }
}

/// Sort a provider error message into a kind by what it mentions.
///
/// Providers only hand back free text here, so this is a substring match and
/// the only place that knows the wording.
pub fn classify_auth_error(message: &str) -> AuthErrorKind {
    let message = message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    if mentions(&["popup"]) && mentions(&["block"]) {
        AuthErrorKind::PopupBlocked
    } else if mentions(&["cancel", "closed"]) {
        AuthErrorKind::Cancelled
    } else if mentions(&["network", "fetch"]) {
        AuthErrorKind::Network
    } else if mentions(&["rate limit", "too many"]) {
        AuthErrorKind::RateLimited
    } else {
        AuthErrorKind::Unknown
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] RegistrationError),
    #[error("Registration timed out after {0:?}. Please try again.")]
    Timeout(Duration),
    #[error("{}", .kind.user_message())]
    Provider { kind: AuthErrorKind, message: String },
    #[error("Registration failed: {0}")]
    Connector(ConnectorError),
}

impl AuthError {
    pub fn kind(&self) -> Option<AuthErrorKind> {
        match self {
            AuthError::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<ConnectorError> for AuthError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::RateLimited(message) => AuthError::Provider {
                kind: AuthErrorKind::RateLimited,
                message,
            },
            ConnectorError::ServiceUnavailable(message) => AuthError::Provider {
                kind: AuthErrorKind::Network,
                message,
            },
            ConnectorError::HttpError(message) | ConnectorError::Unauthorized(message) => {
                AuthError::Provider {
                    kind: classify_auth_error(&message),
                    message,
                }
            }
            other => AuthError::Connector(other),
        }
    }
}

/// Validate the form, then create the account. The call is abandoned after
/// `timeout` and never retried.
pub async fn register(
    gateway: &dyn DataGateway,
    form: &RegistrationForm,
    timeout: Duration,
) -> Result<SignUpResponse, AuthError> {
    form.check()?;

    let email = form.email.trim();
    let span = tracing::info_span!("sign_up", email = %email);
    match tokio::time::timeout(timeout, gateway.sign_up(email, &form.password))
        .instrument(span)
        .await
    {
        Ok(Ok(response)) => {
            tracing::info!(email = %email, "account registered");
            Ok(response)
        }
        Ok(Err(err)) => {
            tracing::warn!(email = %email, error = %err, "registration failed");
            Err(err.into())
        }
        Err(_) => {
            tracing::warn!(email = %email, ?timeout, "registration timed out");
            Err(AuthError::Timeout(timeout))
        }
    }
}
