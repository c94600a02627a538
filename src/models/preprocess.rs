//! Image to tensor conversion.

use crate::config::FlatConfig;
use crate::error::{Error, Result};
use image::DynamicImage;
use image::imageops::FilterType;

/// Resize and standardization parameters taken from the model configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocess {
    /// Side of the square network input.
    pub image_size: u32,
    /// Per-channel mean.
    pub mean: [f32; 3],
    /// Per-channel standard deviation.
    pub std: [f32; 3],
}

impl Preprocess {
    /// Read `model.image_size`, `dataset.mean_RGB` and `dataset.std_RGB`.
    pub fn from_config(config: &FlatConfig) -> Result<Self> {
        let image_size = u32::try_from(config.int("model", "image_size")?).map_err(|_| {
            Error::Internal {
                message: "model.image_size does not fit the input tensor".to_string(),
            }
        })?;

        Ok(Self {
            image_size,
            mean: channels(&config.floats("dataset", "mean_RGB")?, "mean_RGB")?,
            std: channels(&config.floats("dataset", "std_RGB")?, "std_RGB")?,
        })
    }

    /// Tensor shape for a batch of `n` images, NHWC.
    pub fn shape(&self, n: usize) -> [usize; 4] {
        let side = self.image_size as usize;
        [n, side, side, 3]
    }

    /// Convert a batch into a flat NHWC `f32` buffer.
    pub fn batch(&self, images: &[DynamicImage]) -> Vec<f32> {
        let side = self.image_size as usize;
        let mut data = Vec::with_capacity(images.len() * side * side * 3);

        for image in images {
            let resized = image
                .resize_exact(self.image_size, self.image_size, FilterType::Triangle)
                .to_rgb8();
            for pixel in resized.pixels() {
                for (c, &value) in pixel.0.iter().enumerate() {
                    data.push((f32::from(value) - self.mean[c]) / self.std[c]);
                }
            }
        }
        data
    }
}

#[allow(clippy::cast_possible_truncation)]
fn channels(values: &[f64], key: &str) -> Result<[f32; 3]> {
    match values {
        [r, g, b] => Ok([*r as f32, *g as f32, *b as f32]),
        _ => Err(Error::Internal {
            message: format!("dataset.{key} needs exactly three channels"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use image::{Rgb, RgbImage};

    fn preprocess() -> Preprocess {
        Preprocess {
            image_size: 2,
            mean: [10.0, 20.0, 30.0],
            std: [2.0, 4.0, 5.0],
        }
    }

    #[test]
    fn test_from_default_config() {
        let store = ConfigStore::from_default_schema().unwrap();
        let pre = Preprocess::from_config(&store.flatten()).unwrap();
        assert_eq!(pre.image_size, 224);
        assert_eq!(pre.shape(2), [2, 224, 224, 3]);
    }

    #[test]
    fn test_batch_is_standardized_nhwc() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([30, 40, 80])));
        let data = preprocess().batch(&[image]);

        assert_eq!(data.len(), 2 * 2 * 3);
        assert_eq!(&data[..3], &[10.0, 5.0, 10.0]);
        assert_eq!(&data[9..], &[10.0, 5.0, 10.0]);
    }

    #[test]
    fn test_batch_resizes_every_image() {
        let small = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        let large = DynamicImage::ImageRgb8(RgbImage::new(8, 5));
        let data = preprocess().batch(&[small, large]);
        assert_eq!(data.len(), 2 * 2 * 2 * 3);
    }
}
