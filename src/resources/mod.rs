//! Loading of models and images from external files.
//!
//! Bytes come from an [`AssetSource`]; the [`AssetLoader`] turns placement
//! records into independent futures that each resolve to a [`LoadOutcome`].
//! Nothing here touches the scene: the outcome is handed to a single
//! insertion routine on the event loop which either inserts the model or logs
//! the failure.

use std::sync::Arc;

use crate::{config::PlacementRecord, data_structures::model::ModelData};

pub mod animation;
pub mod gltf_model;
pub mod texture;

pub use texture::FetchSource;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Futures run on tokio natively and must be `Send` there; the browser runs
/// them on the local executor.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<T> = futures::future::BoxFuture<'static, T>;
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<T> = futures::future::LocalBoxFuture<'static, T>;

#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}
#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not fetch {url}: {source}")]
    Fetch { url: String, source: BoxError },
    #[error("could not decode model {url}: {source}")]
    Decode { url: String, source: BoxError },
    #[error("could not decode image {url}: {source}")]
    Image {
        url: String,
        source: image::ImageError,
    },
}

impl LoadError {
    pub fn url(&self) -> &str {
        match self {
            LoadError::Fetch { url, .. }
            | LoadError::Decode { url, .. }
            | LoadError::Image { url, .. } => url,
        }
    }

    pub(crate) fn decode(url: &str, source: impl Into<BoxError>) -> Self {
        LoadError::Decode {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

/// Where asset bytes come from.
pub trait AssetSource: MaybeSendSync {
    fn fetch(&self, url: &str) -> BoxFuture<Result<Vec<u8>, BoxError>>;
}

/// A resolved placement request.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Position of the record in the placement list.
    pub index: usize,
    pub record: PlacementRecord,
    pub result: Result<ModelData, LoadError>,
}

/// A resolved texture request for a primitive.
#[derive(Debug)]
pub struct TextureOutcome {
    pub primitive: String,
    pub result: Result<Arc<image::RgbaImage>, LoadError>,
}

pub type LoadFuture = BoxFuture<LoadOutcome>;
pub type TextureFuture = BoxFuture<TextureOutcome>;

#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self { source }
    }

    /// One future per record. None of them waits on another, so they may
    /// complete in any order.
    pub fn placements(&self, records: &[PlacementRecord]) -> Vec<LoadFuture> {
        records
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, record)| {
                let source = self.source.clone();
                let fut: LoadFuture = Box::pin(async move {
                    let result = load_model(source, &record.asset).await;
                    LoadOutcome {
                        index,
                        record,
                        result,
                    }
                });
                fut
            })
            .collect()
    }

    /// One future per `(primitive name, image url)` pair.
    pub fn textures(&self, requests: Vec<(String, String)>) -> Vec<TextureFuture> {
        requests
            .into_iter()
            .map(|(primitive, url)| {
                let source = self.source.clone();
                let fut: TextureFuture = Box::pin(async move {
                    let result = texture::load_image(source.as_ref(), &url)
                        .await
                        .map(Arc::new);
                    TextureOutcome { primitive, result }
                });
                fut
            })
            .collect()
    }
}

pub async fn load_model(source: Arc<dyn AssetSource>, url: &str) -> Result<ModelData, LoadError> {
    let bytes = source
        .fetch(url)
        .await
        .map_err(|source| LoadError::Fetch {
            url: url.to_string(),
            source,
        })?;
    gltf_model::decode_model(source.as_ref(), url, &bytes).await
}
