use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// JSON error returned by the administrative API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    field: Option<&'static str>,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            field: None,
            hint,
        }
    }

    pub fn with_field(mut self, field: Option<&'static str>) -> Self {
        self.field = field;
        self
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn invalid_input(field: Option<&'static str>, hint: String) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(hint),
        )
        .with_field(field)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Author identity required",
            Some("send the author UUID in the x-author-id header".to_string()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                field: self.field.map(str::to_string),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::admin", self.status, detail).attach(&mut response);
        response
    }
}

#[derive(Debug, Serialize)]
struct PublicErrorBody {
    enabled: bool,
    error: PublicErrorMessage,
}

#[derive(Debug, Serialize)]
struct PublicErrorMessage {
    code: &'static str,
    message: &'static str,
}

/// Failure on the public surface. The body still reports the toggle as off so
/// naive clients fail closed.
#[derive(Debug)]
pub struct PublicError {
    source: &'static str,
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    detail: String,
}

impl PublicError {
    pub fn unavailable(source: &'static str, error: &dyn std::error::Error) -> Self {
        Self {
            source,
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: codes::SOURCE_UNAVAILABLE,
            message: "Toggle source unavailable",
            detail: error.to_string(),
        }
    }

    pub fn bad_request(source: &'static str, message: &'static str) -> Self {
        Self {
            source,
            status: StatusCode::BAD_REQUEST,
            code: codes::BAD_REQUEST,
            message,
            detail: message.to_string(),
        }
    }

    pub fn not_found(source: &'static str, message: &'static str) -> Self {
        Self {
            source,
            status: StatusCode::NOT_FOUND,
            code: codes::NOT_FOUND,
            message,
            detail: message.to_string(),
        }
    }
}

impl IntoResponse for PublicError {
    fn into_response(self) -> Response {
        let body = PublicErrorBody {
            enabled: false,
            error: PublicErrorMessage {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(self.source, self.status, self.detail).attach(&mut response);
        response
    }
}
