use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Rpc error: {0}")] Rpc(String),

    #[error("External service error: {0}")] External(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Amount below minimum: {0}")] BelowMinimum(String),

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("Invalid state: {0}")] InvalidState(String),

    #[error("Not found: {0}")] NotFound(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message, field) = match self {
            AppError::Database(e) => ("DATABASE_ERROR", e.to_string(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone(), None),
            AppError::Rpc(msg) => ("RPC_ERROR", msg.clone(), None),
            AppError::External(msg) => ("EXTERNAL_ERROR", msg.clone(), None),
            AppError::InsufficientBalance =>
                ("INSUFFICIENT_BALANCE", "Insufficient available balance".to_string(), None),
            AppError::BelowMinimum(msg) =>
                ("BELOW_MINIMUM", msg.clone(), Some("amount".to_string())),
            AppError::InvalidAddress =>
                (
                    "INVALID_ADDRESS",
                    "Invalid address format".to_string(),
                    Some("address".to_string()),
                ),
            AppError::InvalidCode =>
                (
                    "INVALID_CODE",
                    "Invalid or expired verification code".to_string(),
                    Some("code".to_string()),
                ),
            AppError::InvalidState(msg) => ("INVALID_STATE", msg.clone(), None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone(), None),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            | AppError::InvalidInput(_)
            | AppError::InvalidAddress
            | AppError::BelowMinimum(_)
            | AppError::InvalidCode => {
                axum::http::StatusCode::BAD_REQUEST
            }
            AppError::InsufficientBalance => axum::http::StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) => axum::http::StatusCode::CONFLICT,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
