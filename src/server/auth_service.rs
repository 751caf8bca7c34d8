use tonic::{Request, Response, Status};
use tracing::info;

use super::interceptor::InterceptorChain;
use super::log_error;
use crate::auth::{InMemoryUserStore, JwtManager};
use crate::proto::auth_service_server::AuthService;
use crate::proto::{LoginRequest, LoginResponse, methods};

/// gRPC login service exchanging credentials for an access token.
#[derive(Clone)]
pub struct AuthServiceImpl {
    users: InMemoryUserStore,
    jwt_manager: JwtManager,
    interceptors: InterceptorChain,
}

impl AuthServiceImpl {
    /// Creates the service over `users`, issuing tokens with `jwt_manager`.
    pub fn new(users: InMemoryUserStore, jwt_manager: JwtManager) -> Self {
        Self {
            users,
            jwt_manager,
            interceptors: InterceptorChain::new(),
        }
    }

    /// Routes every call through `interceptors` first.
    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Verifies the credentials and issues a token.
    pub async fn login_user(&self, request: LoginRequest) -> Result<LoginResponse, Status> {
        let user = self
            .users
            .find(&request.username)
            .await
            .map_err(|e| log_error(e.into()))?;

        let user = match user {
            Some(user) if user.is_correct_password(&request.password) => user,
            _ => {
                return Err(log_error(Status::not_found(
                    "incorrect username or password",
                )))
            }
        };

        let access_token = self
            .jwt_manager
            .generate(&user)
            .map_err(|e| log_error(e.into()))?;

        info!(username = %user.username, role = %user.role, "user logged in");
        Ok(LoginResponse { access_token })
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        self.interceptors
            .handle_unary(methods::LOGIN, request, |request| async move {
                self.login_user(request.into_inner())
                    .await
                    .map(Response::new)
            })
            .await
    }
}
