use std::io::Cursor;

use rocket::{
    http::{ContentType, Status},
    response::Responder,
    serde::json::serde_json::json,
    Request, Response,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error taxonomy. Every variant maps to a stable error
/// kind plus a human-readable message in the response body; internal causes
/// (database, JWT) are logged and never leaked to the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("Duplicate vote: {0}")]
    DuplicateVote(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Integrity failure: {0}")]
    Integrity(String),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(format!("{} not found", what.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// The stable, machine-readable kind for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) | Self::Jwt(_) => "Internal",
            Self::Validation { .. } => "Validation",
            Self::DuplicateVote(_) => "DuplicateVote",
            Self::NotFound(_) => "NotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Integrity(_) => "IntegrityFailure",
        }
    }

    fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Jwt(_) => Status::InternalServerError,
            Self::Validation { .. } => Status::BadRequest,
            Self::DuplicateVote(_) => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Integrity(_) => Status::Conflict,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();

        // Internal causes are logged server-side; the client gets a generic message.
        let message = match &self {
            Self::Db(err) => {
                error!("Database error: {err}");
                "Internal server error".to_string()
            }
            Self::Jwt(err) => {
                error!("JWT error: {err}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": self.kind(),
            "message": message,
        })
        .to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_kinds_and_statuses() {
        let err = Error::DuplicateVote("already voted for this post".to_string());
        assert_eq!(err.kind(), "DuplicateVote");
        assert_eq!(err.status(), Status::Conflict);

        let err = Error::validation("candidate_id", "candidate does not belong to post");
        assert_eq!(err.kind(), "Validation");
        assert_eq!(err.status(), Status::BadRequest);

        let err = Error::not_found("Post 42");
        assert_eq!(err.kind(), "NotFound");
        assert_eq!(err.status(), Status::NotFound);

        let err = Error::Integrity("checksum mismatch".to_string());
        assert_eq!(err.status(), Status::Conflict);
    }
}
