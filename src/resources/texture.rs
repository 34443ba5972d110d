use crate::resources::{AssetSource, BoxError, BoxFuture, LoadError};

/// Reads from `./assets` natively and from the page origin in the browser.
#[derive(Clone, Debug, Default)]
pub struct FetchSource;

impl FetchSource {
    pub fn new() -> Self {
        Self
    }
}

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url, BoxError> {
    if is_remote(file_name) {
        return Ok(reqwest::Url::parse(file_name)?);
    }
    let window = web_sys::window().ok_or("no window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| "page origin is not readable")?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name.trim_start_matches('/'))?)
}

impl AssetSource for FetchSource {
    #[cfg(target_arch = "wasm32")]
    fn fetch(&self, url: &str) -> BoxFuture<Result<Vec<u8>, BoxError>> {
        let url = format_url(url);
        Box::pin(async move {
            let response = reqwest::get(url?).await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn fetch(&self, url: &str) -> BoxFuture<Result<Vec<u8>, BoxError>> {
        let url = url.to_string();
        Box::pin(async move {
            if is_remote(&url) {
                return Err(format!("remote assets are only fetched by the web build: {}", url).into());
            }
            let path = std::path::Path::new("./")
                .join("assets")
                .join(url.trim_start_matches('/'));
            Ok(tokio::fs::read(path).await?)
        })
    }
}

/// Decodes an encoded image, guessing the format from its magic bytes.
pub fn decode_image(url: &str, bytes: &[u8]) -> Result<image::RgbaImage, LoadError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| LoadError::Image {
            url: url.to_string(),
            source,
        })
}

pub async fn load_image(source: &dyn AssetSource, url: &str) -> Result<image::RgbaImage, LoadError> {
    let bytes = source.fetch(url).await.map_err(|source| LoadError::Fetch {
        url: url.to_string(),
        source,
    })?;
    decode_image(url, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_urls_are_detected() {
        assert!(is_remote("https://jr-three.vercel.app/textures/video.mp4"));
        assert!(!is_remote("/textures/wall.jpeg"));
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let err = decode_image("jj.jpeg", b"not an image").unwrap_err();
        assert!(matches!(err, LoadError::Image { .. }));
        assert_eq!(err.url(), "jj.jpeg");
    }

    #[test]
    fn png_round_trip_decodes() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        let decoded = decode_image("window.png", bytes.get_ref()).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &image::Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(load_image(&FetchSource::new(), "does/not/exist.png"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }
}
