//! Error types shared by the pool adapter and the HTTP handlers.
//!
//! `DatabaseError` describes what went wrong talking to PostgreSQL and is only
//! ever logged. `ApiError` is what a handler returns; its `IntoResponse`
//! implementation logs the detail and answers with a fixed message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned for any failure that escapes a route.
pub const UNHANDLED_MESSAGE: &str = "Something broke!";

/// Connectivity or SQL failure reported by the pool adapter.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to check out a pooled connection: {0}")]
    Checkout(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("failed to decode column `{column}`: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("query returned no rows")]
    EmptyResult,
}

/// Error returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A database call failed; `message` is the only text the caller sees.
    #[error("{message}: {source}")]
    Database {
        message: &'static str,
        #[source]
        source: DatabaseError,
    },

    /// Anything else escaping a route, panics included.
    #[error("unhandled handler error: {0}")]
    Unhandled(String),
}

impl ApiError {
    /// Adapter for `map_err` that tags a database failure with its public message.
    pub fn database(message: &'static str) -> impl FnOnce(DatabaseError) -> Self {
        move |source| ApiError::Database { message, source }
    }

    /// The fixed message sent to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::Database { message, .. } => message,
            ApiError::Unhandled(_) => UNHANDLED_MESSAGE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database { message, source } => {
                error!(error = %source, "{}", message);
            }
            ApiError::Unhandled(detail) => {
                error!(detail = %detail, "Unhandled error while serving request");
            }
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_hides_detail() {
        let err = ApiError::database("Failed to get tables")(DatabaseError::Query(
            sqlx::Error::Protocol("relation \"secret\" does not exist".into()),
        ));
        assert_eq!(err.public_message(), "Failed to get tables");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unhandled_uses_generic_message() {
        let err = ApiError::Unhandled("index out of bounds".into());
        assert_eq!(err.public_message(), "Something broke!");
    }
}
