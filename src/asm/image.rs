//! LC-3 object image format.
//!
//! An object image is a flat binary file:
//! - One big-endian word: the origin address
//! - Big-endian words to place at origin, origin + 1, ...
//!
//! A trailing odd byte is ignored. Words that would land past xFFFF are
//! dropped when the image is placed.

use std::path::Path;
use thiserror::Error;

/// A loaded object image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Address of the first word.
    pub origin: u16,
    /// The image contents.
    pub words: Vec<u16>,
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    /// Parse an image from raw file bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        let mut chunks = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));

        let origin = chunks.next().ok_or(ImageError::Truncated)?;
        Ok(Self {
            origin,
            words: chunks.collect(),
        })
    }

    /// Serialize back to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load an object image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    Image::from_bytes(&bytes)
}

/// Write an object image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), image.to_bytes())
        .map_err(|e| ImageError::Io(e.to_string()))
}

/// Errors that can occur while loading an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("image too short to hold an origin address")]
    Truncated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_big_endian() {
        let image = Image::from_bytes(&[0x30, 0x00, 0x12, 0x34, 0xF0, 0x25]).unwrap();

        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0x1234, 0xF025]);
    }

    #[test]
    fn test_origin_only() {
        let image = Image::from_bytes(&[0x40, 0x00]).unwrap();
        assert_eq!(image.origin, 0x4000);
        assert!(image.is_empty());
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let image = Image::from_bytes(&[0x30, 0x00, 0x00, 0x01, 0xAB]).unwrap();
        assert_eq!(image.words, vec![0x0001]);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(Image::from_bytes(&[]), Err(ImageError::Truncated));
        assert_eq!(Image::from_bytes(&[0x30]), Err(ImageError::Truncated));
    }

    #[test]
    fn test_to_bytes_layout() {
        let image = Image::new(0x3000, vec![0xF025]);
        assert_eq!(image.to_bytes(), vec![0x30, 0x00, 0xF0, 0x25]);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("lc3vm-image-{}.obj", std::process::id()));
        let image = Image::new(0x3000, vec![0xE002, 0xF022, 0xF025]);

        save_image(&path, &image).unwrap();
        let loaded = load_image(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file() {
        let result = load_image("/nonexistent/definitely/missing.obj");
        assert!(matches!(result, Err(ImageError::Io(_))));
    }
}
