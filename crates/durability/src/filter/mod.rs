//! Buffer filters
//!
//! A [`BufferFilterChain`] holds an ordered list of [`BufferFilter`]s.
//! Encoding applies them front to back; decoding applies them back to
//! front. Every stage's output is checked against the caller's buffer budget
//! and the first failure aborts the whole operation.
//!
//! Built-in filters are variants of a closed enum. Anything else plugs in
//! through [`BufferFilter::Custom`] and the [`BufferCodec`] trait.

mod compression;
mod encryption;
mod traits;

pub use self::compression::{ZstdFilter, DEFAULT_ZSTD_LEVEL};
pub use self::encryption::{AesGcmFilter, NONCE_LEN, TAG_LEN};
pub use self::traits::BufferCodec;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::FilterError;

/// A single stage of the filter chain
#[derive(Clone)]
pub enum BufferFilter {
    /// zstd compression
    Zstd(ZstdFilter),
    /// AES-256-GCM encryption
    Aes256Gcm(AesGcmFilter),
    /// User-supplied codec
    Custom(Arc<dyn BufferCodec>),
}

impl BufferFilter {
    /// zstd at the given level
    pub fn zstd(level: i32) -> Self {
        BufferFilter::Zstd(ZstdFilter::new(level))
    }

    /// AES-256-GCM keyed by the SHA-256 digest of `password`
    pub fn aes256_password(password: &str) -> Self {
        BufferFilter::Aes256Gcm(AesGcmFilter::from_password(password))
    }

    /// AES-256-GCM with a raw key
    pub fn aes256_key(key: [u8; 32]) -> Self {
        BufferFilter::Aes256Gcm(AesGcmFilter::new(key))
    }

    /// Wrap a custom codec
    pub fn custom(codec: impl BufferCodec + 'static) -> Self {
        BufferFilter::Custom(Arc::new(codec))
    }
}

impl BufferCodec for BufferFilter {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        match self {
            BufferFilter::Zstd(f) => f.encode(data),
            BufferFilter::Aes256Gcm(f) => f.encode(data),
            BufferFilter::Custom(f) => f.encode(data),
        }
    }

    fn decode(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, FilterError> {
        match self {
            BufferFilter::Zstd(f) => f.decode(data, max_size),
            BufferFilter::Aes256Gcm(f) => f.decode(data, max_size),
            BufferFilter::Custom(f) => f.decode(data, max_size),
        }
    }

    fn codec_id(&self) -> &str {
        match self {
            BufferFilter::Zstd(f) => f.codec_id(),
            BufferFilter::Aes256Gcm(f) => f.codec_id(),
            BufferFilter::Custom(f) => f.codec_id(),
        }
    }
}

impl fmt::Debug for BufferFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferFilter::Zstd(z) => f.debug_tuple("Zstd").field(&z.level()).finish(),
            BufferFilter::Aes256Gcm(_) => f.write_str("Aes256Gcm"),
            BufferFilter::Custom(c) => f.debug_tuple("Custom").field(&c.codec_id()).finish(),
        }
    }
}

/// Ordered list of buffer filters
#[derive(Debug, Clone, Default)]
pub struct BufferFilterChain {
    filters: Vec<BufferFilter>,
}

impl BufferFilterChain {
    /// Create an empty chain (bytes pass through unchanged)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; it runs after the existing ones when encoding
    pub fn push(&mut self, filter: BufferFilter) {
        self.filters.push(filter);
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, filter: BufferFilter) -> Self {
        self.push(filter);
        self
    }

    /// Filters in encode order
    pub fn filters(&self) -> &[BufferFilter] {
        &self.filters
    }

    /// Number of filters
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True if no filters are configured
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Drop every filter
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Run `data` through every filter front to back
    pub fn encode(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, FilterError> {
        let mut buf = data.to_vec();
        for filter in &self.filters {
            buf = filter.encode(&buf)?;
            check_size(filter, buf.len(), max_size)?;
            trace!(target: "madara::filter", filter = filter.codec_id(), size = buf.len(), "encoded");
        }
        Ok(buf)
    }

    /// Run `data` through every filter back to front
    pub fn decode(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, FilterError> {
        let mut buf = data.to_vec();
        for filter in self.filters.iter().rev() {
            buf = filter.decode(&buf, max_size)?;
            check_size(filter, buf.len(), max_size)?;
            trace!(target: "madara::filter", filter = filter.codec_id(), size = buf.len(), "decoded");
        }
        Ok(buf)
    }
}

impl From<Vec<BufferFilter>> for BufferFilterChain {
    fn from(filters: Vec<BufferFilter>) -> Self {
        BufferFilterChain { filters }
    }
}

fn check_size(filter: &BufferFilter, size: usize, max_size: usize) -> Result<(), FilterError> {
    if size > max_size {
        return Err(FilterError::Overflow {
            filter: filter.codec_id().to_string(),
            size,
            max_size,
        });
    }
    Ok(())
}
