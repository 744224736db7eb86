use std::sync::Arc;

use crate::broadcast::{AccessKeyStatus, StatusBroadcaster, StatusSubscription};
use crate::error::{
    handle_service_error, ConfigError, ErrorNormalizer, RequestFailure, ServiceResult,
};
use crate::facade::{
    AccessKeyRequests, AccessKeyResponse, HttpAccessKeyFacade, KeyUpload, NOT_PRIMARY_UPLOAD,
};

/// Issues the user access-key requests and republishes the outcome of the
/// initial check to any number of subscribers.
pub struct UserAccessKeyService {
    requests: Arc<dyn AccessKeyRequests>,
    normalizer: Arc<dyn ErrorNormalizer>,
    status: StatusBroadcaster,
}

impl UserAccessKeyService {
    pub fn new(
        requests: Arc<dyn AccessKeyRequests>,
        normalizer: Arc<dyn ErrorNormalizer>,
    ) -> Self {
        Self {
            requests,
            normalizer,
            status: StatusBroadcaster::new(),
        }
    }

    pub fn with_default_errors(requests: Arc<dyn AccessKeyRequests>) -> Self {
        Self::new(requests, Arc::new(handle_service_error))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let facade = HttpAccessKeyFacade::from_env()?;
        Ok(Self::with_default_errors(Arc::new(facade)))
    }

    pub fn status_stream(&self) -> StatusSubscription {
        self.status.subscribe()
    }

    pub fn latest_status(&self) -> AccessKeyStatus {
        self.status.latest()
    }

    pub async fn check_access_key(&self) -> ServiceResult<AccessKeyResponse> {
        let outcome = self.requests.check().await;
        self.finish("check", outcome)
    }

    /// Runs a check and publishes its outcome, success or failure.
    pub async fn run_initial_access_key_check(&self) {
        let outcome = self.check_access_key().await;
        match &outcome {
            Ok(response) => {
                tracing::info!(status = response.status, "initial access key check completed")
            }
            Err(error) => {
                tracing::info!(code = %error.code, "initial access key check failed")
            }
        }
        self.status.publish(outcome.into());
    }

    pub async fn generate_access_key(&self) -> ServiceResult<AccessKeyResponse> {
        let outcome = self.requests.generate().await;
        self.finish("generate", outcome)
    }

    pub async fn regenerate_access_key(&self) -> ServiceResult<AccessKeyResponse> {
        let outcome = self.requests.regenerate(&[NOT_PRIMARY_UPLOAD]).await;
        self.finish("regenerate", outcome)
    }

    pub async fn upload_access_key(&self, key: KeyUpload) -> ServiceResult<AccessKeyResponse> {
        let outcome = self.requests.upload(key).await;
        self.finish("upload", outcome)
    }

    pub async fn reupload_access_key(&self, key: KeyUpload) -> ServiceResult<AccessKeyResponse> {
        let outcome = self.requests.reupload(key, &[NOT_PRIMARY_UPLOAD]).await;
        self.finish("reupload", outcome)
    }

    /// Marks the end of a key upload flow. Leaves the broadcast untouched.
    pub fn notify_upload_complete(&self) {
        tracing::info!("access key upload complete");
    }

    fn finish(
        &self,
        operation: &'static str,
        outcome: Result<AccessKeyResponse, RequestFailure>,
    ) -> ServiceResult<AccessKeyResponse> {
        outcome.map_err(|failure| {
            let error = self.normalizer.normalize(failure);
            tracing::warn!(
                operation,
                code = %error.code,
                message = %error.message,
                "access key request failed"
            );
            error
        })
    }
}
