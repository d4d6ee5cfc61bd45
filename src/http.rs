//! Axum responses for guard outcomes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::guard::{GuardError, LoginRedirect};

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        match self.reason {
            Some(reason) => {
                let encoded = urlencoding::encode(reason);
                Redirect::to(&format!("{}?error={encoded}", self.path)).into_response()
            }
            None => Redirect::to(&self.path).into_response(),
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::LockoutStarted { .. } | Self::LockedOut { .. } | Self::CooldownActive { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidCredentials { .. } | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MissingCredentials => StatusCode::BAD_REQUEST,
            Self::InvalidEmail | Self::InvalidName | Self::SpamDetected => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::SubmitFailed | Self::RefreshFailed | Self::SignOutFailed => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) | Self::Config(_) => {
                tracing::error!(error = ?self, "Guard internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
