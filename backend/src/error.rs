use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use santa_core::{Rejection, SantaError};

use crate::admin::AdminError;
use crate::reveal::RevealError;
use crate::store::StoreError;
use crate::views;

/// Failures that end a request instead of sending the visitor back with a hint.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("could not draw an assignment: {0}")]
    Generation(#[from] SantaError),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("inconsistent state: {0}")]
    Inconsistent(Rejection),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Unauthorized => Self::Unauthorized,
            AdminError::Generation(e) => Self::Generation(e),
            AdminError::Store(e) => Self::Store(e),
        }
    }
}

impl From<RevealError> for AppError {
    fn from(err: RevealError) -> Self {
        match err {
            RevealError::Rejected(r) => Self::Inconsistent(r),
            RevealError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Unauthorized = self {
            tracing::warn!("rejected admin request");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }

        tracing::error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            views::error_page("Something went wrong. Please tell the organiser."),
        )
            .into_response()
    }
}
