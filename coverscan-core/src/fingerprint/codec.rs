//! Fingerprint computation and comparison.
//!
//! # Algorithm
//!
//! The decoded image is resized to a fixed 64x64 grayscale grid (8 pixels per
//! block along each axis), then run through Blockhash, which emits one bit per
//! block of an 8x8 block grid depending on whether the block is brighter than
//! the median block. The result is always 64 bits, whatever the input
//! resolution or file size.
//!
//! Callers are expected to hand in a square crop: the grid is square and the
//! resize does not preserve aspect ratio.
//!
//! # Usage
//!
//! ```no_run
//! use coverscan_core::fingerprint::HashCodec;
//!
//! let codec = HashCodec::new();
//! let cover = codec.compute_fingerprint(&std::fs::read("cover.jpg").unwrap()).unwrap();
//! let frame = codec.compute_fingerprint(&std::fs::read("frame.jpg").unwrap()).unwrap();
//! let distance = codec.distance(&cover, &frame).unwrap();
//! let similarity = codec.similarity(distance);
//! ```

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blockhash::{blockhash64, Blockhash64};
use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoverscanError, Result};

/// Blocks along each axis of the hash grid.
pub const GRID_SIZE: u32 = 8;

/// Side of the grayscale image the input is normalized to before hashing.
pub const NORMALIZED_SIZE: u32 = GRID_SIZE * 8;

/// Fingerprint size in bytes (64 bits).
pub const FINGERPRINT_BYTES: usize = (GRID_SIZE * GRID_SIZE / 8) as usize;

/// Fingerprint size in bits.
pub const FINGERPRINT_BITS: u32 = GRID_SIZE * GRID_SIZE;

/// Fixed-length perceptual fingerprint.
///
/// Serialized as a lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Wrap raw fingerprint bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits carried by this fingerprint.
    pub fn bit_len(&self) -> u32 {
        (self.bytes.len() * 8) as u32
    }

    /// Whether this fingerprint was produced under the system grid parameters.
    pub fn is_standard_size(&self) -> bool {
        self.bytes.len() == FINGERPRINT_BYTES
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| {
            CoverscanError::Serialization(format!("Invalid fingerprint hex: {e}"))
        })?;
        if bytes.is_empty() {
            return Err(CoverscanError::Serialization(
                "Empty fingerprint hex".into(),
            ));
        }
        Ok(Self::from_bytes(bytes))
    }

    /// Hamming distance to another fingerprint of the same length.
    pub fn distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

impl From<Blockhash64> for Fingerprint {
    fn from(hash: Blockhash64) -> Self {
        let bytes: [u8; FINGERPRINT_BYTES] = hash.into();
        Self::from_bytes(bytes.to_vec())
    }
}

/// Computes and compares fingerprints.
///
/// Construction is free; only [`HashCodec::compute_fingerprint`] does real work.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCodec;

impl HashCodec {
    pub fn new() -> Self {
        Self
    }

    /// Compute a fingerprint from encoded image bytes (JPEG, PNG, GIF or WebP).
    pub fn compute_fingerprint(&self, image_data: &[u8]) -> Result<Fingerprint> {
        if image_data.is_empty() {
            return Err(CoverscanError::Decode("Empty image data".into()));
        }
        let image = image::load_from_memory(image_data)
            .map_err(|e| CoverscanError::Decode(format!("Failed to decode image: {e}")))?;

        Ok(self.fingerprint_image(&image))
    }

    /// Compute a fingerprint from an already decoded image.
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Fingerprint {
        let normalized = image
            .resize_exact(NORMALIZED_SIZE, NORMALIZED_SIZE, FilterType::Triangle)
            .grayscale();
        blockhash64(&normalized).into()
    }

    /// Compute a fingerprint from a browser capture.
    ///
    /// Accepts either a `data:image/...;base64,` URL or bare base64.
    pub fn compute_from_data_url(&self, data_url: &str) -> Result<Fingerprint> {
        let payload = match data_url.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => data_url,
        };
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| CoverscanError::Decode(format!("Invalid base64 image: {e}")))?;
        self.compute_fingerprint(&bytes)
    }

    /// Hamming distance between two fingerprints.
    pub fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
        a.distance(b)
    }

    /// Similarity for a distance under the system fingerprint size.
    pub fn similarity(&self, distance: u32) -> f64 {
        similarity(distance, FINGERPRINT_BITS)
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

/// Count of differing bits between two equal-length byte strings.
///
/// Fingerprints produced under different grid parameters are incomparable and
/// yield [`CoverscanError::LengthMismatch`]; two empty inputs yield
/// [`CoverscanError::EmptyFingerprint`].
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(CoverscanError::LengthMismatch {
            left: (a.len() * 8) as u32,
            right: (b.len() * 8) as u32,
        });
    }
    if a.is_empty() {
        return Err(CoverscanError::EmptyFingerprint);
    }

    Ok(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Linear similarity in `[0, 1]`: `1 - distance / total_bits`, floored at 0.
pub fn similarity(distance: u32, total_bits: u32) -> f64 {
    if total_bits == 0 {
        return 0.0;
    }
    (1.0 - f64::from(distance) / f64::from(total_bits)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(bytes: [u8; 8]) -> Fingerprint {
        Fingerprint::from_bytes(bytes.to_vec())
    }

    #[test]
    fn test_fingerprint_size_constants() {
        assert_eq!(FINGERPRINT_BYTES, 8);
        assert_eq!(FINGERPRINT_BITS, 64);
        assert_eq!(NORMALIZED_SIZE, 64);
    }

    #[test]
    fn test_hamming_distance_identical() {
        let a = [0x00, 0xFF, 0xAA, 0x55, 0x00, 0xFF, 0xAA, 0x55];
        assert_eq!(hamming_distance(&a, &a).unwrap(), 0);
    }

    #[test]
    fn test_hamming_distance_all_bits() {
        assert_eq!(hamming_distance(&[0x00; 8], &[0xFF; 8]).unwrap(), 64);
    }

    #[test]
    fn test_hamming_distance_single_bit() {
        let a = [0x00; 8];
        let mut b = [0x00; 8];
        b[3] = 0x10;
        assert_eq!(hamming_distance(&a, &b).unwrap(), 1);
    }

    #[test]
    fn test_hamming_distance_is_symmetric() {
        let a = fp([0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
        let b = fp([0xCA, 0xFE, 0xBA, 0xBE, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
        assert_eq!(a.distance(&a).unwrap(), 0);
    }

    #[test]
    fn test_hamming_distance_length_mismatch() {
        let legacy = Fingerprint::from_bytes(vec![0x00; 5]);
        let current = fp([0x00; 8]);
        match legacy.distance(&current) {
            Err(CoverscanError::LengthMismatch { left, right }) => {
                assert_eq!(left, 40);
                assert_eq!(right, 64);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_hamming_distance_empty() {
        let err = hamming_distance(&[], &[]).unwrap_err();
        assert!(matches!(err, CoverscanError::EmptyFingerprint));
        assert_eq!(err.to_string(), "Cannot compare empty fingerprints");

        assert!(matches!(
            hamming_distance(&[], &[0x00; 8]),
            Err(CoverscanError::LengthMismatch { left: 0, right: 64 })
        ));
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity(0, 64), 1.0);
        assert_eq!(similarity(64, 64), 0.0);
        assert_eq!(similarity(100, 64), 0.0);
        assert!((similarity(16, 64) - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_monotonic() {
        let mut previous = similarity(0, FINGERPRINT_BITS);
        for d in 1..=80 {
            let current = similarity(d, FINGERPRINT_BITS);
            assert!(current <= previous, "similarity rose at distance {d}");
            assert!((0.0..=1.0).contains(&current));
            assert!(current < 1.0);
            previous = current;
        }
    }

    #[test]
    fn test_fingerprint_hex_roundtrip() {
        let original = fp([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(original.to_hex(), "deadbeefcafebabe");
        let restored = Fingerprint::from_hex("deadbeefcafebabe").unwrap();
        assert_eq!(restored, original);
        assert!(restored.is_standard_size());
    }

    #[test]
    fn test_fingerprint_from_hex_invalid() {
        assert!(Fingerprint::from_hex("xyz").is_err());
        assert!(Fingerprint::from_hex("").is_err());
    }

    #[test]
    fn test_fingerprint_serde_as_hex_string() {
        let original = fp([0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"0123456789abcdef\"");
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_compute_fingerprint_rejects_garbage() {
        let codec = HashCodec::new();
        assert!(matches!(
            codec.compute_fingerprint(&[0x00, 0x01, 0x02]),
            Err(CoverscanError::Decode(_))
        ));
        assert!(matches!(
            codec.compute_fingerprint(&[]),
            Err(CoverscanError::Decode(_))
        ));
    }

    #[test]
    fn test_compute_from_data_url_rejects_bad_base64() {
        let codec = HashCodec::new();
        assert!(matches!(
            codec.compute_from_data_url("data:image/jpeg;base64,@@@"),
            Err(CoverscanError::Decode(_))
        ));
    }

    #[test]
    fn test_is_supported_format() {
        assert!(HashCodec::is_supported_format(&[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A
        ]));
        assert!(HashCodec::is_supported_format(&[0xFF, 0xD8, 0xFF]));
        assert!(!HashCodec::is_supported_format(&[0x00, 0x00, 0x00]));
    }
}
