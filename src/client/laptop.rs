use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Channel;
use tonic::{Code, Request, Status};
use tracing::{debug, info};

use super::interceptor::ClientInterceptor;
use crate::proto::laptop_service_client::LaptopServiceClient;
use crate::proto::{
    CreateLaptopRequest, Filter, Laptop, RateLaptopRequest, RateLaptopResponse, SearchLaptopRequest,
    UploadImageRequest, UploadImageResponse, methods,
};

/// Deadline attached to every outgoing call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of each image chunk sent during upload.
pub const CHUNK_SIZE: usize = 1024;

/// Laptop service client running its interceptors on every call.
#[derive(Clone)]
pub struct LaptopClient {
    service: LaptopServiceClient<Channel>,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

impl LaptopClient {
    /// Creates a client without interceptors.
    pub fn new(channel: Channel) -> Self {
        Self {
            service: LaptopServiceClient::new(channel),
            interceptors: Vec::new(),
        }
    }

    /// Appends `interceptor`; interceptors run in the order they were added.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ClientInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    #[allow(clippy::result_large_err)]
    fn request<T>(&self, method: &str, message: T) -> Result<Request<T>, Status> {
        let mut request = Request::new(message);
        request.set_timeout(CALL_TIMEOUT);

        for interceptor in &self.interceptors {
            interceptor.intercept(method, request.metadata_mut())?;
        }

        debug!(method, "outgoing call");
        Ok(request)
    }

    /// Creates `laptop` and returns its id.
    ///
    /// A laptop that already exists is not an error; its id is returned.
    pub async fn create_laptop(&self, laptop: Laptop) -> Result<String, Status> {
        let laptop_id = laptop.id.clone();
        let request = self.request(
            methods::CREATE_LAPTOP,
            CreateLaptopRequest {
                laptop: Some(laptop),
            },
        )?;

        match self.service.clone().create_laptop(request).await {
            Ok(response) => {
                let id = response.into_inner().id;
                info!(laptop_id = %id, "created laptop");
                Ok(id)
            }
            Err(status) if status.code() == Code::AlreadyExists => {
                info!(laptop_id = %laptop_id, "laptop already exists");
                Ok(laptop_id)
            }
            Err(status) => Err(status),
        }
    }

    /// Collects every laptop matching `filter`.
    pub async fn search_laptop(&self, filter: Filter) -> Result<Vec<Laptop>, Status> {
        info!(?filter, "searching laptops");
        let request = self.request(
            methods::SEARCH_LAPTOP,
            SearchLaptopRequest {
                filter: Some(filter),
            },
        )?;

        let mut stream = self.service.clone().search_laptop(request).await?.into_inner();
        let mut laptops = Vec::new();

        while let Some(response) = stream.message().await? {
            if let Some(laptop) = response.laptop {
                debug!(laptop_id = %laptop.id, brand = %laptop.brand, name = %laptop.name, "found laptop");
                laptops.push(laptop);
            }
        }

        info!(found = laptops.len(), "search finished");
        Ok(laptops)
    }

    /// Uploads `data` as an image of `laptop_id`, one info message followed
    /// by [`CHUNK_SIZE`] chunks.
    pub async fn upload_image_bytes(
        &self,
        laptop_id: &str,
        image_type: &str,
        data: &[u8],
    ) -> Result<UploadImageResponse, Status> {
        let messages: Vec<_> = std::iter::once(UploadImageRequest::info(laptop_id, image_type))
            .chain(data.chunks(CHUNK_SIZE).map(UploadImageRequest::chunk))
            .collect();

        let request = self.request(methods::UPLOAD_IMAGE, tokio_stream::iter(messages))?;
        let response = self.service.clone().upload_image(request).await?.into_inner();

        info!(image_id = %response.id, size = response.size, "uploaded image");
        Ok(response)
    }

    /// Uploads the file at `path`; its extension becomes the image type.
    pub async fn upload_image(
        &self,
        laptop_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<UploadImageResponse, Status> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            Status::invalid_argument(format!("cannot read image file {}: {e}", path.display()))
        })?;
        let image_type = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        self.upload_image_bytes(laptop_id, &image_type, &data).await
    }

    /// Sends one rating per `(laptop_id, score)` pair and collects the
    /// replies, which arrive in request order.
    pub async fn rate_laptop(
        &self,
        ratings: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<Vec<RateLaptopResponse>, Status> {
        let requests: Vec<_> = ratings
            .into_iter()
            .map(|(laptop_id, score)| RateLaptopRequest { laptop_id, score })
            .collect();
        let sent = requests.len();

        let request = self.request(methods::RATE_LAPTOP, tokio_stream::iter(requests))?;
        let mut stream = self.service.clone().rate_laptop(request).await?.into_inner();
        let mut replies = Vec::with_capacity(sent);

        while let Some(reply) = stream.message().await? {
            debug!(
                laptop_id = %reply.laptop_id,
                rated_count = reply.rated_count,
                average_score = reply.average_score,
                "received rating"
            );
            replies.push(reply);
        }

        Ok(replies)
    }
}
