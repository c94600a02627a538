//! Image decoding for resolved inputs.

use crate::error::{Error, Result};
use crate::input::remote::RemoteImages;
use crate::input::resolver::{ImageSource, ResolvedInputs};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageReader};
use tracing::debug;

/// Decode every image of a request, in order.
///
/// Images are fetched and decoded one at a time.
pub async fn load_images(inputs: &ResolvedInputs, remote: &RemoteImages) -> Result<Vec<DynamicImage>> {
    let mut images = Vec::with_capacity(inputs.len());
    for source in inputs.sources() {
        let image = match source {
            ImageSource::Remote(url) => {
                let bytes = remote.fetch(url).await?;
                decode_bytes(&bytes, url)?
            }
            ImageSource::Inline(url) => decode_data_url(url, remote.max_bytes())?,
            ImageSource::Local { path, filename } => ImageReader::open(path)?
                .with_guessed_format()?
                .decode()
                .map_err(|e| invalid(filename, e))?,
        };
        debug!(
            "Decoded {} ({}x{})",
            source.display_name(),
            image.width(),
            image.height()
        );
        images.push(image);
    }
    Ok(images)
}

/// Decode a `data:image/...;base64,` URL.
pub fn decode_data_url(url: &str, max_bytes: u64) -> Result<DynamicImage> {
    const NAME: &str = "inline image";

    let (_, encoded) = url
        .split_once(',')
        .ok_or_else(|| invalid(NAME, "missing ',' separator"))?;

    // base64 expands by 4/3
    if encoded.len() as u64 > max_bytes.saturating_mul(4) / 3 + 4 {
        return Err(Error::ImageTooLarge {
            source_name: NAME.to_string(),
            limit: max_bytes,
        });
    }

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(NAME, e))?;
    decode_bytes(&bytes, NAME)
}

fn decode_bytes(bytes: &[u8], name: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| invalid(name, e))
}

fn invalid(name: &str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
    Error::InvalidImage {
        source_name: name.to_string(),
        source: source.into(),
    }
}
