use std::future::Future;
use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::auth::{AUTHORIZATION_KEY, AccessRules, Claims, JwtManager};

/// A check run on every inbound call before its handler.
pub trait ServerInterceptor: Send + Sync {
    /// Inspects the call; an error rejects it with that status.
    #[allow(clippy::result_large_err)]
    fn intercept(&self, method: &str, metadata: &MetadataMap) -> Result<(), Status>;
}

/// Ordered list of [`ServerInterceptor`]s wrapped around RPC handlers.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn ServerInterceptor>>,
}

impl InterceptorChain {
    /// Creates an empty chain; every call is forwarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `interceptor` to the chain.
    pub fn with(mut self, interceptor: impl ServerInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    #[allow(clippy::result_large_err)]
    fn intercept(&self, method: &str, metadata: &MetadataMap) -> Result<(), Status> {
        self.interceptors
            .iter()
            .try_for_each(|interceptor| interceptor.intercept(method, metadata))
    }

    /// Runs the chain for a unary call, then `handler` if every check passed.
    pub async fn handle_unary<Req, Resp, H, Fut>(
        &self,
        method: &str,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        debug!(method, "unary interceptor");
        self.run(method, request, handler).await
    }

    /// Runs the chain once at stream start, then hands the untouched stream
    /// to `handler`.
    pub async fn handle_stream<Req, Resp, H, Fut>(
        &self,
        method: &str,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        debug!(method, "stream interceptor");
        self.run(method, request, handler).await
    }

    /// Checks the call metadata once; individual stream messages are never
    /// inspected.
    async fn run<Req, Resp, H, Fut>(
        &self,
        method: &str,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        self.intercept(method, request.metadata())?;
        handler(request).await
    }
}

/// Authenticates and authorizes calls against [`AccessRules`].
///
/// Public methods pass untouched. Protected methods need an `authorization`
/// entry holding a token that verifies and whose role is allowed for the
/// method. Roles are trusted from the token without consulting the user store.
#[derive(Clone)]
pub struct ServerAuthInterceptor {
    jwt_manager: JwtManager,
    rules: AccessRules,
}

impl ServerAuthInterceptor {
    /// Creates an interceptor verifying tokens with `jwt_manager`.
    pub fn new(jwt_manager: JwtManager, rules: AccessRules) -> Self {
        Self { jwt_manager, rules }
    }

    /// Checks a call to `method`.
    ///
    /// Returns the verified claims for protected methods and `None` for public
    /// ones.
    #[allow(clippy::result_large_err)]
    pub fn authorize(
        &self,
        method: &str,
        metadata: &MetadataMap,
    ) -> Result<Option<Claims>, Status> {
        let Some(roles) = self.rules.required_roles(method) else {
            return Ok(None);
        };

        let access_token = metadata
            .get(AUTHORIZATION_KEY)
            .ok_or_else(|| Status::unauthenticated("authorization token is not provided"))?
            .to_str()
            .map_err(|_| Status::unauthenticated("authorization token is not valid ASCII"))?;

        let claims = self
            .jwt_manager
            .verify(access_token)
            .map_err(|e| Status::unauthenticated(format!("access token is invalid: {e}")))?;

        if !roles.contains(&claims.role) {
            return Err(Status::permission_denied(
                "no permission to access this RPC",
            ));
        }

        Ok(Some(claims))
    }
}

impl ServerInterceptor for ServerAuthInterceptor {
    fn intercept(&self, method: &str, metadata: &MetadataMap) -> Result<(), Status> {
        match self.authorize(method, metadata) {
            Ok(Some(claims)) => {
                debug!(method, user = %claims.sub, role = %claims.role, "call authorized");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(status) => {
                warn!(method, code = ?status.code(), message = status.message(), "call rejected");
                Err(status)
            }
        }
    }
}
