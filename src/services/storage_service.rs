//! Almacenamiento de imágenes de perfil
//!
//! Las imágenes se guardan con clave `profile_images/{user_id}.{ext}` y se
//! sirven estáticamente bajo `/uploads`. El formato se detecta por los bytes
//! iniciales, no por el content-type declarado por el cliente.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

/// Tamaño máximo de una imagen de perfil (15 MB)
pub const MAX_IMAGE_SIZE: usize = 15 * 1024 * 1024;

pub const PROFILE_IMAGE_PREFIX: &str = "profile_images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Heic,
}

impl ImageFormat {
    const ALL: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Heic];

    /// Detectar formato por magic bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }
        // ISO BMFF: "ftyp" en el offset 4 seguido de la marca
        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            let brand = &data[8..12];
            if [b"heic", b"heix", b"hevc", b"heim", b"heis", b"mif1"]
                .iter()
                .any(|b| brand == &b[..])
            {
                return Some(ImageFormat::Heic);
            }
        }
        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Heic => "heic",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Heic => "image/heic",
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Guarda el objeto y devuelve su URL pública
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Borrar un objeto inexistente no es un error
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Almacenamiento en disco bajo `UPLOAD_DIR`
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::ExternalApi(format!("Could not prepare storage: {}", e)))?;
        }

        let size = data.len();
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::ExternalApi(format!("Could not store file: {}", e)))?;

        info!("💾 Stored {} ({} bytes, {})", key, size, content_type);
        Ok(format!("{}/uploads/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.root.join(key)).await {
            Ok(()) => {
                debug!("🗑️ Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::ExternalApi(format!("Could not delete file: {}", e))),
        }
    }
}

pub fn profile_image_key(user_id: Uuid, format: ImageFormat) -> String {
    format!("{}/{}.{}", PROFILE_IMAGE_PREFIX, user_id, format.extension())
}

/// Reemplaza la imagen de perfil del usuario y devuelve la nueva URL
pub async fn store_profile_image(
    storage: &dyn ObjectStorage,
    user_id: Uuid,
    data: Vec<u8>,
) -> AppResult<String> {
    if data.is_empty() {
        return Err(AppError::BadRequest("The uploaded image is empty.".to_string()));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(AppError::PayloadTooLarge(
            "Profile images must be 15 MB or smaller.".to_string(),
        ));
    }
    let format = ImageFormat::detect(&data).ok_or_else(|| {
        AppError::BadRequest("Only JPEG, PNG and HEIC images are supported.".to_string())
    })?;

    // la imagen anterior sigue intacta si la escritura falla
    let url = storage
        .put(&profile_image_key(user_id, format), data, format.content_type())
        .await?;

    // una sola imagen por usuario aunque cambie el formato
    for stale in ImageFormat::ALL.into_iter().filter(|f| *f != format) {
        if let Err(e) = storage.delete(&profile_image_key(user_id, stale)).await {
            warn!("⚠️ Could not remove stale image for user {}: {}", user_id, e);
        }
    }
    Ok(url)
}

pub async fn remove_profile_image(storage: &dyn ObjectStorage, user_id: Uuid) -> AppResult<()> {
    for format in ImageFormat::ALL {
        storage.delete(&profile_image_key(user_id, format)).await?;
    }
    Ok(())
}
