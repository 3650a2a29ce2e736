//! Perceptual fingerprints for record sleeves.
//!
//! A fingerprint summarizes the coarse visual structure of a cover so that the
//! same sleeve photographed under different lighting, scale or compression
//! lands a few bits away from the catalog image, while unrelated covers land
//! far apart.
//!
//! # Components
//!
//! - [`Fingerprint`]: fixed-length bit vector, hex encoded on the wire and on disk.
//! - [`HashCodec`]: turns image bytes into fingerprints and compares them.

pub mod codec;

pub use codec::*;
