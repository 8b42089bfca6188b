use crate::frames::crop;
use crate::utils::bbox::BoundingBox;
use crate::utils::embedding::Embedding;
use anyhow::{anyhow, Result};
use lru::LruCache;
use ndarray::ArrayView3;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of embeddings kept by [EmbeddingCache](EmbeddingCache)
pub const DEFAULT_EMBEDDING_CACHE_CAPACITY: usize = 4096;

/// Appearance model: maps the image crop of a detection to a fixed-length embedding.
///
/// The crop is a `(height, width, 3)` region of the frame, already clipped to the frame
/// borders. Resizing to the model input is up to the implementation.
///
pub trait ReIdentifier: Send + Sync {
    fn embed(&self, crop: ArrayView3<u8>) -> Result<Embedding>;
}

/// Computes the embedding of the box region of the image
///
pub fn embed_region(
    reid: &dyn ReIdentifier,
    image: &ArrayView3<u8>,
    bbox: &BoundingBox,
) -> Result<Embedding> {
    bbox.ensure_valid()?;
    let region = crop(image, bbox.x(), bbox.y(), bbox.width(), bbox.height())
        .ok_or_else(|| anyhow!("bounding box {:?} is outside of the frame", bbox))?;
    reid.embed(region.view())
}

/// Bounded memo of embeddings keyed by detection id. The least recently used entry is evicted
/// when the capacity is reached.
///
pub struct EmbeddingCache {
    cache: Mutex<LruCache<usize, Arc<Embedding>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_CACHE_CAPACITY)
    }
}

impl EmbeddingCache {
    /// Creates the cache; zero capacity falls back to the default one
    ///
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(DEFAULT_EMBEDDING_CACHE_CAPACITY).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, id: usize) -> Option<Arc<Embedding>> {
        let res = self.cache.lock().unwrap().get(&id).cloned();
        if res.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        res
    }

    pub fn put(&self, id: usize, embedding: Arc<Embedding>) {
        self.cache.lock().unwrap().put(id, embedding);
    }

    /// Returns the cached embedding or computes and stores it. Failures are not cached.
    ///
    pub fn get_or_try_insert<F>(&self, id: usize, f: F) -> Result<Arc<Embedding>>
    where
        F: FnOnce() -> Result<Embedding>,
    {
        if let Some(e) = self.get(id) {
            return Ok(e);
        }
        // computed outside of the lock, so concurrent misses may compute the same id twice
        let e = Arc::new(f()?);
        self.put(id, e.clone());
        Ok(e)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().unwrap().cap().get()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}
