//! Configuration for the grid processor.

use serde::{Deserialize, Serialize};

/// Grid-size and Zarr output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridProcessorConfig {
    /// Chunk dimension for the horizontal axes of Zarr arrays (square chunks).
    pub zarr_chunk_size: usize,

    /// Compression codec for Zarr arrays.
    pub zarr_compression: ZarrCompression,

    /// Compression level (1-9).
    pub zarr_compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub zarr_shuffle: bool,

    /// Refuse to build grids with more points than this.
    pub max_grid_points: Option<usize>,

    /// Log a warning for grids larger than this.
    pub large_grid_warning: usize,
}

impl Default for GridProcessorConfig {
    fn default() -> Self {
        Self {
            zarr_chunk_size: 512,
            zarr_compression: ZarrCompression::Zstd,
            zarr_compression_level: 1,
            zarr_shuffle: true,
            max_grid_points: None,
            large_grid_warning: 25_000_000,
        }
    }
}

impl GridProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ZARR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.zarr_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            if let Some(compression) = ZarrCompression::parse(&val) {
                config.zarr_compression = compression;
            }
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.zarr_compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            config.zarr_shuffle = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("MAX_GRID_POINTS") {
            if let Ok(points) = val.parse() {
                config.max_grid_points = Some(points);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.zarr_chunk_size == 0 {
            return Err("zarr_chunk_size must be > 0".to_string());
        }

        if self.zarr_compression != ZarrCompression::None
            && (self.zarr_compression_level == 0 || self.zarr_compression_level > 9)
        {
            return Err("zarr_compression_level must be 1-9".to_string());
        }

        if self.max_grid_points == Some(0) {
            return Err("max_grid_points must be > 0".to_string());
        }

        Ok(())
    }
}

/// Compression codec for Zarr arrays. Both codecs run inside Blosc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    Lz4,
    /// Blosc with Zstd.
    #[default]
    Zstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive). Accepts the `blosc_` prefixed names too.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().trim_start_matches("blosc_") {
            "none" => Some(Self::None),
            "lz4" => Some(Self::Lz4),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GridProcessorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let config = GridProcessorConfig {
            zarr_compression_level: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let uncompressed = GridProcessorConfig {
            zarr_compression: ZarrCompression::None,
            zarr_compression_level: 0,
            ..Default::default()
        };
        assert!(uncompressed.validate().is_ok());
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!(ZarrCompression::parse("BLOSC_LZ4"), Some(ZarrCompression::Lz4));
        assert_eq!(ZarrCompression::parse("zstd"), Some(ZarrCompression::Zstd));
        assert_eq!(ZarrCompression::parse("none"), Some(ZarrCompression::None));
        assert_eq!(ZarrCompression::parse("gzip"), None);
    }
}
