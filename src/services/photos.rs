//! Drugstore photo storage on the local filesystem
//!
//! Each upload is stored as JPEG renditions under `{dir}/{name}/{name}_{size}.jpg`
//! and served from `{base_url}/{name}/{name}_{size}.jpg`.

use crate::config::ImagesConfig;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Maximum upload size (10MB)
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("empty photo")]
    Empty,
    #[error("photo too large: {0} bytes (max 10MB)")]
    TooLarge(usize),
    #[error("invalid photo: {0}")]
    Invalid(#[from] image::ImageError),
    #[error("invalid photo name: {0:?}")]
    BadName(String),
    #[error("photo storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendition sizes kept for every photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSize {
    Small,
    Medium,
}

impl PhotoSize {
    pub const ALL: [PhotoSize; 2] = [PhotoSize::Small, PhotoSize::Medium];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoSize::Small => "small",
            PhotoSize::Medium => "medium",
        }
    }

    /// Longest edge in pixels
    fn max_edge(&self) -> u32 {
        match self {
            PhotoSize::Small => 200,
            PhotoSize::Medium => 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
    base_url: String,
}

impl PhotoStore {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of a stored rendition
    pub fn url(&self, name: &str, size: PhotoSize) -> String {
        format!("{}/{}/{}", self.base_url, name, file_name(name, size))
    }

    /// Path of a stored rendition on disk
    pub fn path(&self, name: &str, size: PhotoSize) -> PathBuf {
        self.dir.join(name).join(file_name(name, size))
    }

    /// Decode an upload and write all renditions under `name`
    pub async fn store(&self, name: &str, data: Vec<u8>) -> Result<(), PhotoError> {
        check_name(name)?;
        if data.is_empty() {
            return Err(PhotoError::Empty);
        }
        if data.len() > MAX_FILE_SIZE {
            return Err(PhotoError::TooLarge(data.len()));
        }

        let renditions = tokio::task::spawn_blocking(move || render(&data))
            .await
            .map_err(|e| PhotoError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        tokio::fs::create_dir_all(self.dir.join(name)).await?;
        for (size, bytes) in renditions {
            let path = self.path(name, size);
            debug!("Writing photo rendition {}", path.display());
            tokio::fs::write(path, bytes).await?;
        }

        info!("Stored photo {}", name);
        Ok(())
    }

    /// Remove all renditions of a photo; missing photos are ignored
    pub async fn delete(&self, name: &str) -> Result<(), PhotoError> {
        check_name(name)?;
        match tokio::fs::remove_dir_all(self.dir.join(name)).await {
            Ok(()) => {
                info!("Deleted photo {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// the extension lets static file serving pick image/jpeg
fn file_name(name: &str, size: PhotoSize) -> String {
    format!("{}_{}.jpg", name, size.as_str())
}

fn check_name(name: &str) -> Result<(), PhotoError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PhotoError::BadName(name.to_string()));
    }
    Ok(())
}

fn render(data: &[u8]) -> Result<Vec<(PhotoSize, Vec<u8>)>, PhotoError> {
    let img = image::load_from_memory(data)?;
    PhotoSize::ALL
        .into_iter()
        .map(|size| Ok::<_, PhotoError>((size, encode_jpeg(&img, size.max_edge())?)))
        .collect()
}

fn encode_jpeg(img: &DynamicImage, max_edge: u32) -> Result<Vec<u8>, PhotoError> {
    let scaled = if img.width() > max_edge || img.height() > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img.clone()
    };

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    scaled.to_rgb8().write_with_encoder(encoder)?;
    Ok(buffer)
}
