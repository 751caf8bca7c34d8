use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::metadata::{MetadataMap, MetadataValue};
use tracing::{debug, info, warn};

use super::auth::Authenticator;
use crate::auth::AUTHORIZATION_KEY;

/// Delay before retrying a failed token refresh.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A hook run on every outgoing call before it is sent.
pub trait ClientInterceptor: Send + Sync {
    /// Adjusts the call's metadata; an error aborts the call.
    #[allow(clippy::result_large_err)]
    fn intercept(&self, method: &str, metadata: &mut MetadataMap) -> Result<(), Status>;
}

/// Attaches a periodically refreshed access token to protected calls.
///
/// Construction logs in once and fails if that login fails. A background task
/// then logs in again every `refresh` interval, retrying after
/// [`RETRY_DELAY`] when a login fails. Calls read the latest token without
/// waiting on the task. The task stops on [`ClientAuthInterceptor::shutdown`]
/// or when the interceptor is dropped.
pub struct ClientAuthInterceptor {
    auth_methods: HashSet<String>,
    token: watch::Receiver<String>,
    shutdown: CancellationToken,
}

impl ClientAuthInterceptor {
    /// Logs in with `authenticator` and starts the refresh task.
    pub async fn new<A, I, M>(
        authenticator: A,
        auth_methods: I,
        refresh: Duration,
    ) -> Result<Self, Status>
    where
        A: Authenticator,
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        let token = authenticator.login().await?;
        info!("obtained initial access token");

        let (sender, receiver) = watch::channel(token);
        let shutdown = CancellationToken::new();
        tokio::spawn(refresh_token(authenticator, sender, refresh, shutdown.clone()));

        Ok(Self {
            auth_methods: auth_methods.into_iter().map(Into::into).collect(),
            token: receiver,
            shutdown,
        })
    }

    /// The most recently obtained token.
    pub fn access_token(&self) -> String {
        self.token.borrow().clone()
    }

    /// Stops the refresh task; the last token stays attached to calls.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ClientAuthInterceptor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl ClientInterceptor for ClientAuthInterceptor {
    fn intercept(&self, method: &str, metadata: &mut MetadataMap) -> Result<(), Status> {
        if !self.auth_methods.contains(method) {
            return Ok(());
        }

        let value = MetadataValue::try_from(self.token.borrow().as_str())
            .map_err(|_| Status::internal("access token is not valid metadata"))?;
        metadata.insert(AUTHORIZATION_KEY, value);
        debug!(method, "attached access token");
        Ok(())
    }
}

async fn refresh_token<A: Authenticator>(
    authenticator: A,
    sender: watch::Sender<String>,
    refresh: Duration,
    shutdown: CancellationToken,
) {
    let mut wait = refresh;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        let login = tokio::select! {
            () = shutdown.cancelled() => break,
            login = authenticator.login() => login,
        };

        match login {
            Ok(token) => {
                sender.send_replace(token);
                wait = refresh;
                debug!("access token refreshed");
            }
            Err(status) => {
                wait = RETRY_DELAY.min(refresh);
                warn!(
                    code = ?status.code(),
                    message = status.message(),
                    "cannot refresh access token"
                );
            }
        }
    }

    debug!("token refresh stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::proto::methods;

    #[derive(Clone, Default)]
    struct ScriptedAuthenticator {
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    #[tonic::async_trait]
    impl Authenticator for ScriptedAuthenticator {
        async fn login(&self) -> Result<String, Status> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(Status::unavailable("auth server is down"));
            }
            Ok(format!("token-{call}"))
        }
    }

    const REFRESH: Duration = Duration::from_secs(30);

    async fn interceptor(auth: &ScriptedAuthenticator) -> ClientAuthInterceptor {
        ClientAuthInterceptor::new(auth.clone(), [methods::CREATE_LAPTOP], REFRESH)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initial_login_fails_construction() {
        let auth = ScriptedAuthenticator::default();
        auth.failing.store(true, Ordering::SeqCst);

        let result =
            ClientAuthInterceptor::new(auth.clone(), [methods::CREATE_LAPTOP], REFRESH).await;

        assert_eq!(result.err().unwrap().code(), tonic::Code::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_refreshed_every_interval() {
        let auth = ScriptedAuthenticator::default();
        let interceptor = interceptor(&auth).await;
        assert_eq!(interceptor.access_token(), "token-1");

        tokio::time::sleep(REFRESH + Duration::from_millis(10)).await;
        assert_eq!(interceptor.access_token(), "token-2");

        tokio::time::sleep(REFRESH).await;
        assert_eq!(interceptor.access_token(), "token-3");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_retries_after_short_delay() {
        let auth = ScriptedAuthenticator::default();
        let interceptor = interceptor(&auth).await;
        auth.failing.store(true, Ordering::SeqCst);

        tokio::time::sleep(REFRESH + Duration::from_millis(500)).await;
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
        assert_eq!(interceptor.access_token(), "token-1");

        auth.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(RETRY_DELAY).await;
        assert_eq!(auth.calls.load(Ordering::SeqCst), 3);
        assert_eq!(interceptor.access_token(), "token-3");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_and_drop_stop_refreshing() {
        let auth = ScriptedAuthenticator::default();
        let stopped = interceptor(&auth).await;
        stopped.shutdown();

        tokio::time::sleep(REFRESH * 4).await;
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.access_token(), "token-1");

        let dropped = ScriptedAuthenticator::default();
        drop(interceptor(&dropped).await);
        tokio::time::sleep(REFRESH * 4).await;
        assert_eq!(dropped.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_attached_only_to_protected_methods() {
        let auth = ScriptedAuthenticator::default();
        let interceptor = interceptor(&auth).await;

        let mut metadata = MetadataMap::new();
        interceptor
            .intercept(methods::SEARCH_LAPTOP, &mut metadata)
            .unwrap();
        assert!(metadata.get(AUTHORIZATION_KEY).is_none());

        interceptor
            .intercept(methods::CREATE_LAPTOP, &mut metadata)
            .unwrap();
        assert_eq!(metadata.get(AUTHORIZATION_KEY).unwrap(), "token-1");
    }
}
