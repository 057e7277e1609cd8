//! Buffer codec trait definitions.

use crate::error::FilterError;

/// Buffer codec trait.
///
/// Every checkpoint segment passes through the configured codecs before it
/// reaches disk, and back through them in reverse order when it is read.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync` so a settings object can be shared with the
/// player thread.
pub trait BufferCodec: Send + Sync {
    /// Transform bytes on their way to disk.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FilterError>;

    /// Reverse [`encode`](Self::encode).
    ///
    /// Output longer than `max_size` bytes is an error; codecs that expand
    /// their input should stop producing output once past it. Returns an
    /// error if the data cannot be decoded (wrong key, corruption).
    fn decode(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, FilterError>;

    /// Short identifier used in logs and errors.
    fn codec_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl BufferCodec for Reverse {
        fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
            Ok(data.iter().rev().copied().collect())
        }

        fn decode(&self, data: &[u8], _max_size: usize) -> Result<Vec<u8>, FilterError> {
            self.encode(data)
        }

        fn codec_id(&self) -> &str {
            "reverse"
        }
    }

    // Test that trait is object-safe
    fn _accepts_box_dyn_codec(_codec: Box<dyn BufferCodec>) {}

    #[test]
    fn test_codec_trait_object_safe() {
        let codec: Box<dyn BufferCodec> = Box::new(Reverse);
        let encoded = codec.encode(b"abc").unwrap();
        assert_eq!(encoded, b"cba");
        assert_eq!(codec.decode(&encoded, 16).unwrap(), b"abc");
        assert_eq!(codec.codec_id(), "reverse");
    }
}
