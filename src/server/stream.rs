use tokio::sync::mpsc;
use tonic::{Status, Streaming};

/// Inbound half of a streaming call.
#[tonic::async_trait]
pub trait MessageSource<T>: Send {
    /// Waits for the next message; `Ok(None)` means the peer closed its side.
    async fn receive(&mut self) -> Result<Option<T>, Status>;
}

/// Outbound half of a streaming call.
#[tonic::async_trait]
pub trait MessageSink<T>: Send {
    /// Sends one message to the peer.
    async fn deliver(&mut self, message: T) -> Result<(), Status>;
}

#[tonic::async_trait]
impl<T: Send + 'static> MessageSource<T> for Streaming<T> {
    async fn receive(&mut self) -> Result<Option<T>, Status> {
        self.message().await
    }
}

#[tonic::async_trait]
impl<T: Send + 'static> MessageSource<T> for mpsc::Receiver<Result<T, Status>> {
    async fn receive(&mut self) -> Result<Option<T>, Status> {
        self.recv().await.transpose()
    }
}

#[tonic::async_trait]
impl<T: Send + 'static> MessageSink<T> for mpsc::Sender<Result<T, Status>> {
    async fn deliver(&mut self, message: T) -> Result<(), Status> {
        self.send(Ok(message))
            .await
            .map_err(|_| Status::unknown("cannot send response: stream is closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_maps_end_of_stream_and_errors() {
        let (tx, mut rx) = mpsc::channel::<Result<u8, Status>>(4);
        tx.send(Ok(7)).await.unwrap();
        tx.send(Err(Status::data_loss("gone"))).await.unwrap();
        drop(tx);

        assert_eq!(rx.receive().await.unwrap(), Some(7));
        assert_eq!(rx.receive().await.unwrap_err().code(), tonic::Code::DataLoss);
        assert_eq!(rx.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_channel_sink_reports_unknown() {
        let (mut tx, rx) = mpsc::channel::<Result<u8, Status>>(1);
        drop(rx);

        let status = tx.deliver(1).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unknown);
    }
}
