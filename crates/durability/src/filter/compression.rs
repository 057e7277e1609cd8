//! Zstandard compression filter

use std::io::Read;

use crate::error::FilterError;
use crate::filter::BufferCodec;

/// Default zstd compression level
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Compresses segments with zstd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdFilter {
    level: i32,
}

impl ZstdFilter {
    /// Create a filter compressing at `level`
    pub fn new(level: i32) -> Self {
        ZstdFilter { level }
    }

    /// Compression level
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdFilter {
    fn default() -> Self {
        ZstdFilter::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl BufferCodec for ZstdFilter {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        zstd::stream::encode_all(data, self.level)
            .map_err(|e| FilterError::codec(self.codec_id(), e.to_string(), data.len()))
    }

    fn decode(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, FilterError> {
        let codec_error = |e: std::io::Error| FilterError::codec("zstd", e.to_string(), data.len());
        let decoder = zstd::stream::read::Decoder::new(data).map_err(codec_error)?;

        // One byte past the budget is enough to detect overflow
        let mut out = Vec::new();
        decoder
            .take(max_size as u64 + 1)
            .read_to_end(&mut out)
            .map_err(codec_error)?;
        if out.len() > max_size {
            return Err(FilterError::Overflow {
                filter: self.codec_id().to_string(),
                size: out.len(),
                max_size,
            });
        }
        Ok(out)
    }

    fn codec_id(&self) -> &str {
        "zstd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compresses_repetitive_data() {
        let filter = ZstdFilter::default();
        let data = vec![b'k'; 10_000];
        let encoded = filter.encode(&data).unwrap();
        assert!(encoded.len() < data.len() / 10);
        assert_eq!(filter.decode(&encoded, data.len()).unwrap(), data);
    }

    #[test]
    fn test_decode_stops_at_budget() {
        let filter = ZstdFilter::default();
        let encoded = filter.encode(&vec![0u8; 1 << 20]).unwrap();
        assert!(encoded.len() < 1024);

        let err = filter.decode(&encoded, 4096).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Overflow { size: 4097, max_size: 4096, .. }
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let filter = ZstdFilter::new(1);
        let err = filter.decode(b"definitely not a zstd frame", 1024).unwrap_err();
        assert!(matches!(err, FilterError::Codec { ref filter, .. } if filter == "zstd"));
    }
}
