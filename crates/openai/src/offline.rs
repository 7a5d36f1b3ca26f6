//! Deterministic offline image generator.
//!
//! Used when no API key is configured so the eval pipeline keeps producing
//! commits, rankings, and suggestions end to end. Images are digest-seeded
//! gradients (text-to-image) or digest tints of the anchor (image-edit):
//! the same prompt always yields the same bytes.

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use promptsmith_core::types::Quality;

use crate::error::AdapterError;
use crate::generator::Generator;

/// Edge length of synthesized placeholder images.
const PLACEHOLDER_SIZE: u32 = 256;

/// Generator that never leaves the process.
#[derive(Default)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    fn digest(prompt: &str) -> [u8; 32] {
        Sha256::digest(prompt.as_bytes()).into()
    }

    fn encode(img: &RgbImage) -> Result<Vec<u8>, AdapterError> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| AdapterError::MalformedOutput(format!("Failed to encode placeholder: {e}")))?;
        Ok(buffer.into_inner())
    }

    /// Digest-seeded two-axis gradient.
    fn placeholder(prompt: &str) -> Result<Vec<u8>, AdapterError> {
        let digest = Self::digest(prompt);
        let img = RgbImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
            let fx = x as u32 * 255 / PLACEHOLDER_SIZE;
            let fy = y as u32 * 255 / PLACEHOLDER_SIZE;
            Rgb([
                digest[0].wrapping_add(fx as u8),
                digest[1].wrapping_add(fy as u8),
                digest[2].wrapping_add((fx ^ fy) as u8),
            ])
        });
        Self::encode(&img)
    }
}

#[async_trait]
impl Generator for OfflineGenerator {
    async fn text_to_image(&self, prompt: &str, _model: &str, _quality: Quality) -> Result<Vec<u8>, AdapterError> {
        Self::placeholder(prompt)
    }

    async fn image_edit(
        &self,
        base_image: &[u8],
        prompt: &str,
        _model: &str,
        _quality: Quality,
    ) -> Result<Vec<u8>, AdapterError> {
        let Ok(base) = image::load_from_memory(base_image) else {
            return Self::placeholder(prompt);
        };
        let base = base.to_rgb8();
        let digest = Self::digest(prompt);
        let tinted = RgbImage::from_fn(base.width(), base.height(), |x, y| {
            let pixel = base.get_pixel(x, y).0;
            Rgb([
                ((pixel[0] as u16 + digest[0] as u16) / 2) as u8,
                ((pixel[1] as u16 + digest[1] as u16) / 2) as u8,
                ((pixel[2] as u16 + digest[2] as u16) / 2) as u8,
            ])
        });
        Self::encode(&tinted)
    }
}
