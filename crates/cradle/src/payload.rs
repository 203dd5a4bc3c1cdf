//! Identification payloads.
//!
//! A child's payload is the text encoded into its lost-child contact card.
//! The text is a pure function of the child's name and guardian contacts;
//! turning it into an image is delegated to a [`Rasterizer`]. Rendered
//! images are cached in memory and on disk under the child ID, tagged with a
//! BLAKE3 fingerprint of the text so a changed record is re-rendered.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::child::Guardian;
use crate::config::PayloadConfig;
use crate::error::{Error, Result};
use crate::store::BlobStore;

/// Extension of the fingerprint file stored next to each image.
const FINGERPRINT_EXTENSION: &str = "sum";

/// Build the payload text for a child.
///
/// Guardians are rendered one per line, fields in name, email, phone order.
/// Identical inputs always produce byte-identical output.
#[must_use]
pub fn encode_payload(child_name: &str, guardians: &[Guardian]) -> String {
    let mut text = format!("I'm lost! My name is {child_name}.\nParents Contact:");
    for guardian in guardians {
        let _ = write!(
            text,
            "\n{} - Email: {} - Phone: {}",
            guardian.name, guardian.email, guardian.phone
        );
    }
    text
}

/// Fingerprint of a payload text.
#[must_use]
pub fn fingerprint(text: &str) -> blake3::Hash {
    blake3::hash(text.as_bytes())
}

/// Turns payload text into scannable image bytes.
pub trait Rasterizer: Send + Sync + std::fmt::Debug {
    /// File extension of the images this rasterizer produces.
    fn extension(&self) -> &'static str;

    /// Render `text` with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be rendered.
    fn rasterize(&self, text: &str, settings: &PayloadConfig) -> Result<Vec<u8>>;
}

/// Renders the payload as a plain-text card.
///
/// Used when no image rasterizer is plugged in; the card records the
/// rendering settings so a QR generator can reproduce it later.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCardRasterizer;

impl Rasterizer for TextCardRasterizer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn rasterize(&self, text: &str, settings: &PayloadConfig) -> Result<Vec<u8>> {
        let card = format!(
            "# error_correction={} box_size={} border={}\n{text}\n",
            settings.error_correction, settings.box_size, settings.border
        );
        Ok(card.into_bytes())
    }
}

#[derive(Debug)]
struct CachedImage {
    fingerprint: blake3::Hash,
    image: Vec<u8>,
}

/// In-memory cache of rendered images keyed by child ID.
#[derive(Debug, Default)]
pub struct PayloadCache {
    entries: HashMap<String, CachedImage>,
}

impl PayloadCache {
    /// Get the cached image for `child_id` if it was rendered from a payload
    /// with this fingerprint.
    #[must_use]
    pub fn get(&self, child_id: &str, fingerprint: &blake3::Hash) -> Option<&[u8]> {
        self.entries
            .get(child_id)
            .filter(|entry| entry.fingerprint == *fingerprint)
            .map(|entry| entry.image.as_slice())
    }

    /// Store a rendered image, replacing any previous one.
    pub fn insert(&mut self, child_id: &str, fingerprint: blake3::Hash, image: Vec<u8>) {
        self.entries
            .insert(child_id.to_string(), CachedImage { fingerprint, image });
    }

    /// Drop the entry for `child_id`.
    pub fn invalidate(&mut self, child_id: &str) {
        self.entries.remove(child_id);
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders, stores and caches identification images.
#[derive(Debug)]
pub struct PayloadEncoder {
    rasterizer: Box<dyn Rasterizer>,
    settings: PayloadConfig,
    images: BlobStore,
    cache: Mutex<PayloadCache>,
}

impl PayloadEncoder {
    /// Create an encoder writing images into `images`.
    #[must_use]
    pub fn new(images: BlobStore, settings: PayloadConfig, rasterizer: Box<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            settings,
            images,
            cache: Mutex::new(PayloadCache::default()),
        }
    }

    /// File name of a child's image.
    #[must_use]
    pub fn image_name(&self, child_id: &str) -> String {
        format!("{child_id}.{}", self.rasterizer.extension())
    }

    fn fingerprint_name(child_id: &str) -> String {
        format!("{child_id}.{FINGERPRINT_EXTENSION}")
    }

    /// Render `text` for `child_id`, overwrite the stored image and cache it.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterizing or writing fails.
    pub fn render(&self, child_id: &str, text: &str) -> Result<Vec<u8>> {
        let fingerprint = fingerprint(text);
        let image = self
            .rasterizer
            .rasterize(text, &self.settings)
            .map_err(|e| Error::rasterize(child_id, e.to_string()))?;

        self.images.write(&self.image_name(child_id), &image)?;
        self.images.write(
            &Self::fingerprint_name(child_id),
            fingerprint.to_hex().as_bytes(),
        )?;

        self.lock_cache().insert(child_id, fingerprint, image.clone());
        info!(child_id, bytes = image.len(), "Rendered identification image");
        Ok(image)
    }

    /// Get the image for `child_id`, rendering it only when no stored image
    /// matches `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored image cannot be read or rendering fails.
    pub fn image(&self, child_id: &str, text: &str) -> Result<Vec<u8>> {
        let fingerprint = fingerprint(text);

        if let Some(image) = self.lock_cache().get(child_id, &fingerprint) {
            debug!(child_id, "Identification image cache hit");
            return Ok(image.to_vec());
        }

        if let Some(image) = self.stored_image(child_id, &fingerprint)? {
            debug!(child_id, "Reusing stored identification image");
            self.lock_cache().insert(child_id, fingerprint, image.clone());
            return Ok(image);
        }

        debug!(child_id, "Identification image missing or stale");
        self.render(child_id, text)
    }

    /// Forget the cached image for `child_id`.
    pub fn invalidate(&self, child_id: &str) {
        self.lock_cache().invalidate(child_id);
    }

    /// Number of images held in memory.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.lock_cache().len()
    }

    /// Number of stored images on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the image directory cannot be listed.
    pub fn stored(&self) -> Result<usize> {
        let extension = self.rasterizer.extension();
        let mut count = 0;
        for entry in std::fs::read_dir(self.images.dir())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == extension) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn stored_image(&self, child_id: &str, fingerprint: &blake3::Hash) -> Result<Option<Vec<u8>>> {
        let Some(stored) = self.images.read(&Self::fingerprint_name(child_id))? else {
            return Ok(None);
        };
        let matches = std::str::from_utf8(&stored)
            .ok()
            .and_then(|hex| blake3::Hash::from_hex(hex.trim()).ok())
            .is_some_and(|stored| stored == *fingerprint);
        if !matches {
            return Ok(None);
        }
        self.images.read(&self.image_name(child_id))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, PayloadCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
