use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Request-level error taxonomy. Handlers return `Result<HttpResponse,
/// ApiError>` and the `ResponseError` impl picks the status code, so the
/// mapping from failure class to HTTP status lives in exactly one place.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("datastore unavailable")]
    Unavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation<I>(errors: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        ApiError::Validation(errors.into_iter().map(|e| e.to_string()).collect())
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ApiError::NotFound(msg.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(errors) => ErrorBody {
                message: "validation failed".to_string(),
                errors: Some(errors.clone()),
                detail: None,
            },
            ApiError::Internal(err) => {
                log::error!("internal error: {:#}", err);
                ErrorBody {
                    message: "internal server error".to_string(),
                    errors: None,
                    // Raw detail is only exposed in debug builds.
                    detail: if cfg!(debug_assertions) {
                        Some(format!("{:#}", err))
                    } else {
                        None
                    },
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: None,
                detail: None,
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => ApiError::not_found("resource not found"),
            other => ApiError::Internal(anyhow::Error::new(other).context("database error")),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(err: r2d2::Error) -> Self {
        log::error!("connection pool error: {}", err);
        ApiError::Unavailable
    }
}

impl<E> From<BlockingError<E>> for ApiError
where
    E: Into<ApiError> + fmt::Debug,
{
    fn from(err: BlockingError<E>) -> Self {
        match err {
            BlockingError::Error(e) => e.into(),
            BlockingError::Canceled => {
                ApiError::Internal(anyhow::anyhow!("blocking task canceled"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation(vec!["x"]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("denied").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::not_found("missing").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err: ApiError = diesel::result::Error::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
