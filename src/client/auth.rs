use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;

use super::laptop::CALL_TIMEOUT;
use crate::proto::LoginRequest;
use crate::proto::auth_service_client::AuthServiceClient;

/// Source of fresh access tokens.
#[tonic::async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Logs in and returns a new access token.
    async fn login(&self) -> Result<String, Status>;
}

/// Logs in with fixed credentials over a channel without interceptors.
#[derive(Clone)]
pub struct AuthClient {
    service: AuthServiceClient<Channel>,
    username: String,
    password: String,
}

impl AuthClient {
    /// Creates a client logging in as `username`.
    pub fn new(channel: Channel, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            service: AuthServiceClient::new(channel),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[tonic::async_trait]
impl Authenticator for AuthClient {
    async fn login(&self) -> Result<String, Status> {
        let mut request = Request::new(LoginRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        });
        request.set_timeout(CALL_TIMEOUT);

        let response = self.service.clone().login(request).await?;
        debug!(username = %self.username, "logged in");
        Ok(response.into_inner().access_token)
    }
}
