use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info};

use super::context::CallContext;
use super::interceptor::InterceptorChain;
use super::log_error;
use super::stream::{MessageSink, MessageSource};
use crate::proto::laptop_service_server::LaptopService;
use crate::proto::upload_image_request::Data;
use crate::proto::{
    CreateLaptopRequest, CreateLaptopResponse, Filter, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, SearchLaptopResponse, UploadImageRequest, UploadImageResponse, methods,
};
use crate::store::{ImageStore, InMemoryLaptopStore, InMemoryRatingStore, ensure_laptop_id};

/// Largest accepted image payload (1 MiB).
pub const MAX_IMAGE_SIZE: usize = 1 << 20;

const STREAM_BUFFER: usize = 16;

/// gRPC laptop service: create, search, image upload and rating.
///
/// The `create`, `search`, `upload` and `rate` methods hold the handler logic
/// and are independent of the transport; the [`LaptopService`] impl binds them
/// to tonic.
#[derive(Clone)]
pub struct LaptopServiceImpl {
    laptops: InMemoryLaptopStore,
    images: Arc<dyn ImageStore>,
    ratings: InMemoryRatingStore,
    interceptors: InterceptorChain,
}

impl LaptopServiceImpl {
    /// Creates the service over the given stores.
    pub fn new(
        laptops: InMemoryLaptopStore,
        images: Arc<dyn ImageStore>,
        ratings: InMemoryRatingStore,
    ) -> Self {
        Self {
            laptops,
            images,
            ratings,
            interceptors: InterceptorChain::new(),
        }
    }

    /// Routes every call through `interceptors` first.
    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Stores a new laptop and returns its identifier.
    pub async fn create(
        &self,
        ctx: &CallContext,
        request: CreateLaptopRequest,
    ) -> Result<CreateLaptopResponse, Status> {
        counter!("laptop.create.requests").increment(1);

        let mut laptop = request
            .laptop
            .ok_or_else(|| log_error(Status::invalid_argument("laptop is required")))?;
        info!(laptop_id = %laptop.id, "receive a create-laptop request");

        ensure_laptop_id(&mut laptop).map_err(|e| log_error(e.into()))?;

        ctx.check().map_err(log_error)?;

        let id = self
            .laptops
            .save(&laptop)
            .await
            .map_err(|e| log_error(e.into()))?;

        info!(laptop_id = %id, "saved laptop");
        Ok(CreateLaptopResponse { id })
    }

    /// Streams every stored laptop matching `filter` into `sink`.
    ///
    /// Stops at the first failed send or once the call is over.
    pub async fn search<K>(
        &self,
        ctx: &CallContext,
        filter: Filter,
        sink: &K,
    ) -> Result<(), Status>
    where
        K: MessageSink<SearchLaptopResponse> + Clone,
    {
        counter!("laptop.search.requests").increment(1);
        info!(?filter, "receive a search-laptop request");

        self.laptops
            .search(&filter, |laptop| {
                let mut sink = sink.clone();
                let live = ctx.check();
                async move {
                    live?;
                    let laptop_id = laptop.id.clone();
                    sink.deliver(SearchLaptopResponse {
                        laptop: Some(laptop),
                    })
                    .await?;
                    debug!(laptop_id = %laptop_id, "sent laptop");
                    Ok(())
                }
            })
            .await
            .map_err(log_error)
    }

    /// Receives an image upload: one info message, then chunks until the
    /// client closes its side.
    ///
    /// The payload is saved only after a complete, live stream within
    /// [`MAX_IMAGE_SIZE`].
    pub async fn upload<S>(
        &self,
        ctx: &CallContext,
        source: &mut S,
    ) -> Result<UploadImageResponse, Status>
    where
        S: MessageSource<UploadImageRequest> + ?Sized,
    {
        counter!("laptop.upload.requests").increment(1);

        let info = match ctx.receive(source).await.map_err(log_error)? {
            Some(UploadImageRequest {
                data: Some(Data::Info(info)),
            }) => info,
            Some(_) => {
                return Err(log_error(Status::invalid_argument(
                    "first upload message must carry image info",
                )))
            }
            None => return Err(log_error(Status::invalid_argument("image info is missing"))),
        };

        info!(
            laptop_id = %info.laptop_id,
            image_type = %info.image_type,
            "receive an upload-image request"
        );

        if self.laptops.find(&info.laptop_id).await.is_none() {
            return Err(log_error(Status::not_found(format!(
                "laptop {} does not exist",
                info.laptop_id
            ))));
        }

        let mut image_data = Vec::new();

        while let Some(request) = ctx.receive(source).await.map_err(log_error)? {
            let chunk = match request.data {
                Some(Data::ChunkData(chunk)) => chunk,
                Some(Data::Info(_)) => {
                    return Err(log_error(Status::invalid_argument(
                        "image info may only be sent once",
                    )))
                }
                None => Vec::new(),
            };

            let size = image_data.len() + chunk.len();
            if size > MAX_IMAGE_SIZE {
                return Err(log_error(Status::invalid_argument(format!(
                    "image is too large: {size} > {MAX_IMAGE_SIZE}"
                ))));
            }

            debug!(chunk_size = chunk.len(), total = size, "received a chunk");
            image_data.extend_from_slice(&chunk);
        }

        ctx.check().map_err(log_error)?;

        let image_size = image_data.len();
        let image_id = self
            .images
            .save(&info.laptop_id, &info.image_type, image_data)
            .await
            .map_err(|e| log_error(e.into()))?;

        counter!("laptop.upload.bytes").increment(image_size as u64);
        info!(image_id = %image_id, size = image_size, "saved image");

        Ok(UploadImageResponse {
            id: image_id,
            size: u32::try_from(image_size).unwrap_or(u32::MAX),
        })
    }

    /// Rates laptops: each inbound score is answered with the updated tally
    /// before the next one is read.
    pub async fn rate<S, K>(
        &self,
        ctx: &CallContext,
        source: &mut S,
        sink: &mut K,
    ) -> Result<(), Status>
    where
        S: MessageSource<RateLaptopRequest> + ?Sized,
        K: MessageSink<RateLaptopResponse> + ?Sized,
    {
        while let Some(request) = ctx.receive(source).await.map_err(log_error)? {
            counter!("laptop.rate.requests").increment(1);

            let RateLaptopRequest { laptop_id, score } = request;
            debug!(laptop_id = %laptop_id, score, "receive a rate-laptop request");

            if self.laptops.find(&laptop_id).await.is_none() {
                return Err(log_error(Status::not_found(format!(
                    "laptop {laptop_id} is not found"
                ))));
            }

            let rating = self.ratings.add(&laptop_id, score).await;

            sink.deliver(RateLaptopResponse {
                laptop_id,
                rated_count: rating.count,
                average_score: rating.average(),
            })
            .await
            .map_err(log_error)?;
        }

        debug!("no more rating requests");
        Ok(())
    }
}

#[tonic::async_trait]
impl LaptopService for LaptopServiceImpl {
    type SearchLaptopStream = ReceiverStream<Result<SearchLaptopResponse, Status>>;
    type RateLaptopStream = ReceiverStream<Result<RateLaptopResponse, Status>>;

    async fn create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> Result<Response<CreateLaptopResponse>, Status> {
        self.interceptors
            .handle_unary(methods::CREATE_LAPTOP, request, |request| async move {
                let ctx = CallContext::from_metadata(request.metadata());
                self.create(&ctx, request.into_inner())
                    .await
                    .map(Response::new)
            })
            .await
    }

    async fn search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> Result<Response<Self::SearchLaptopStream>, Status> {
        self.interceptors
            .handle_stream(methods::SEARCH_LAPTOP, request, |request| async move {
                let ctx = CallContext::from_metadata(request.metadata());
                let filter = request.into_inner().filter.unwrap_or_default();
                let service = self.clone();
                let stream = spawn_stream(ctx, move |ctx, tx| async move {
                    service.search(&ctx, filter, &tx).await
                });

                Ok(Response::new(stream))
            })
            .await
    }

    async fn upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> Result<Response<UploadImageResponse>, Status> {
        self.interceptors
            .handle_stream(methods::UPLOAD_IMAGE, request, |request| async move {
                let ctx = CallContext::from_metadata(request.metadata());
                let mut inbound = request.into_inner();
                self.upload(&ctx, &mut inbound).await.map(Response::new)
            })
            .await
    }

    async fn rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> Result<Response<Self::RateLaptopStream>, Status> {
        self.interceptors
            .handle_stream(methods::RATE_LAPTOP, request, |request| async move {
                let ctx = CallContext::from_metadata(request.metadata());
                let mut inbound = request.into_inner();
                let service = self.clone();
                let stream = spawn_stream(ctx, move |ctx, mut tx| async move {
                    service.rate(&ctx, &mut inbound, &mut tx).await
                });

                Ok(Response::new(stream))
            })
            .await
    }
}

/// Runs `handler` on its own task and returns the stream it feeds.
///
/// A handler error becomes the last item. Dropping the stream cancels `ctx`
/// and stops the handler.
fn spawn_stream<T, F, Fut>(ctx: CallContext, handler: F) -> ReceiverStream<Result<T, Status>>
where
    T: Send + 'static,
    F: FnOnce(CallContext, mpsc::Sender<Result<T, Status>>) -> Fut,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let task = handler(ctx.clone(), tx.clone());

    tokio::spawn(async move {
        tokio::select! {
            result = task => {
                if let Err(status) = result {
                    let _ = tx.send(Err(status)).await;
                }
            }
            () = tx.closed() => {
                ctx.cancel();
                debug!("client dropped the response stream");
            }
        }
    });

    ReceiverStream::new(rx)
}
