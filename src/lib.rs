pub mod broadcast;
pub mod config;
pub mod error;
pub mod facade;
pub mod service;

pub use broadcast::{AccessKeyStatus, StatusBroadcaster, StatusSubscription};
pub use config::{access_key_api_config_from_env, AccessKeyApiConfig};
pub use error::{
    handle_service_error, ConfigError, ErrorNormalizer, RequestFailure, ServiceError,
    ServiceResult,
};
pub use facade::{
    AccessKeyRequests, AccessKeyResponse, HttpAccessKeyFacade, KeyUpload, NOT_PRIMARY_UPLOAD,
};
pub use service::UserAccessKeyService;
