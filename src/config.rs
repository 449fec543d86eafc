//! Load and build configuration.
//!
//! [`LoadConfig`] controls how strictly [`crate::metadata::image::Image::load`] checks an input
//! buffer and how deep the recursive readers (signatures, type definitions, virtual table
//! construction) may go before giving up with [`crate::Error::RecursionLimit`].
//!
//! # Presets
//!
//! | Preset | Heap tiling | Unknown streams | Signature depth | Build depth |
//! |--------|-------------|-----------------|-----------------|-------------|
//! | [`LoadConfig::default`] / [`LoadConfig::strict`] | checked | rejected | 50 | 64 |
//! | [`LoadConfig::lenient`] | skipped | ignored | 50 | 64 |
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::LoadConfig;
//!
//! let config = LoadConfig {
//!     max_build_depth: 16,
//!     ..LoadConfig::default()
//! };
//! assert!(config.validate_heaps);
//! ```

/// Default nesting limit for type signatures.
pub const DEFAULT_SIGNATURE_DEPTH: usize = 50;

/// Default nesting limit for inheritance and interface recursion during builds.
pub const DEFAULT_BUILD_DEPTH: usize = 64;

/// Knobs for image loading and virtual table construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadConfig {
    /// Check that the Strings, UserStrings and Blob heaps are tiled by back-to-back records
    /// and that the GUID heap holds whole entries.
    pub validate_heaps: bool,

    /// Fail the load when a stream header names a stream outside the five known ones.
    pub reject_unknown_streams: bool,

    /// Maximum nesting of a single type signature.
    pub max_signature_depth: usize,

    /// Maximum depth of the parent/interface recursion while building virtual tables.
    pub max_build_depth: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            validate_heaps: true,
            reject_unknown_streams: true,
            max_signature_depth: DEFAULT_SIGNATURE_DEPTH,
            max_build_depth: DEFAULT_BUILD_DEPTH,
        }
    }
}

impl LoadConfig {
    /// Every structural check enabled. Identical to [`LoadConfig::default`].
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Skips heap tiling and tolerates unknown stream names.
    ///
    /// Useful for images produced by obfuscators that pad heaps; table layout and row
    /// reads are still bounds checked.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            validate_heaps: false,
            reject_unknown_streams: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let strict = LoadConfig::strict();
        assert!(strict.validate_heaps);
        assert!(strict.reject_unknown_streams);
        assert_eq!(strict.max_signature_depth, DEFAULT_SIGNATURE_DEPTH);
        assert_eq!(strict.max_build_depth, DEFAULT_BUILD_DEPTH);

        let lenient = LoadConfig::lenient();
        assert!(!lenient.validate_heaps);
        assert!(!lenient.reject_unknown_streams);
        assert_eq!(lenient.max_build_depth, DEFAULT_BUILD_DEPTH);
    }

    #[test]
    fn default_is_strict() {
        assert_eq!(LoadConfig::default(), LoadConfig::strict());
    }
}
