use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use farm_order_engine::LifecycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Lifecycle(e) => lifecycle_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn lifecycle_status_code(e: &LifecycleError) -> StatusCode {
    use LifecycleError::*;
    match e {
        InsufficientInventory { .. } => StatusCode::CONFLICT,
        InvalidStateTransition(_) => StatusCode::CONFLICT,
        ConcurrentModification(_) => StatusCode::CONFLICT,
        PaymentAlreadyExists(_) => StatusCode::CONFLICT,
        DataIntegrityViolation(_) => StatusCode::CONFLICT,
        OrderLocked(_) => StatusCode::LOCKED,
        OrderNotFound(_) => StatusCode::NOT_FOUND,
        InventoryUnitNotFound(_) => StatusCode::NOT_FOUND,
        PaymentNotFound(_) => StatusCode::NOT_FOUND,
        ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ProviderError(_) => StatusCode::BAD_GATEWAY,
        NotificationFailed(_) => StatusCode::BAD_GATEWAY,
        DecreaseNotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MixedDeliveryWeeks(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InvalidDiscountCode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EmptyOrder => StatusCode::BAD_REQUEST,
        InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Pricing(_) => StatusCode::BAD_REQUEST,
        OrderNumberCollision(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
