use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

use super::stream::MessageSource;

const GRPC_TIMEOUT_KEY: &str = "grpc-timeout";

/// Liveness of one inbound call: a cancellation signal plus an optional
/// deadline.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derives the context from the `grpc-timeout` entry of request metadata.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        metadata
            .get(GRPC_TIMEOUT_KEY)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map_or_else(Self::new, Self::with_timeout)
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Deadline of the call, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with `Cancelled` or `DeadlineExceeded` once the call is over.
    #[allow(clippy::result_large_err)]
    pub fn check(&self) -> Result<(), Status> {
        if self.cancel.is_cancelled() {
            return Err(canceled());
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(deadline_exceeded()),
            _ => Ok(()),
        }
    }

    /// Resolves with the terminal status once the call is canceled or its
    /// deadline passes.
    pub async fn done(&self) -> Status {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.cancel.cancelled() => canceled(),
                () = tokio::time::sleep_until(deadline) => deadline_exceeded(),
            },
            None => {
                self.cancel.cancelled().await;
                canceled()
            }
        }
    }

    /// Receives the next message from `source` unless the call ends first.
    ///
    /// Liveness is checked before waiting and the wait itself is raced
    /// against [`CallContext::done`]. Transport failures other than
    /// cancellation surface as `Unknown`.
    pub async fn receive<T, S>(&self, source: &mut S) -> Result<Option<T>, Status>
    where
        S: MessageSource<T> + ?Sized,
    {
        self.check()?;

        tokio::select! {
            biased;
            status = self.done() => Err(status),
            message = source.receive() => message.map_err(|status| match status.code() {
                Code::Cancelled | Code::DeadlineExceeded => status,
                _ => Status::unknown(format!(
                    "cannot receive stream request: {}",
                    status.message()
                )),
            }),
        }
    }
}

fn canceled() -> Status {
    Status::cancelled("request is canceled")
}

fn deadline_exceeded() -> Status {
    Status::deadline_exceeded("deadline is exceeded")
}

/// Parses a `grpc-timeout` value: at most eight digits followed by a unit.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };

    Some(duration)
}
