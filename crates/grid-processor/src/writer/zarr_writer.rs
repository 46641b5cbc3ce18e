//! Zarr V3 array and group writer.
//!
//! Every logical dataset file is a Zarr group on the local filesystem whose
//! member arrays carry their dimension names in `_ARRAY_DIMENSIONS`.

use std::path::Path;
use std::sync::Arc;

use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, Element, ElementOwned, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::config::{GridProcessorConfig, ZarrCompression};
use crate::error::{GridProcessorError, Result};

/// Attribute holding the dimension names of an array.
pub const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// Element types written to dataset arrays.
pub trait GridElement: Element + ElementOwned + Copy + Send + Sync + 'static {
    /// Size in bytes, used as the Blosc shuffle type size.
    const SIZE: usize;

    fn data_type() -> DataType;

    fn fill_value() -> FillValue;
}

impl GridElement for f32 {
    const SIZE: usize = 4;

    fn data_type() -> DataType {
        DataType::Float32
    }

    fn fill_value() -> FillValue {
        FillValue::from(f32::NAN)
    }
}

impl GridElement for f64 {
    const SIZE: usize = 8;

    fn data_type() -> DataType {
        DataType::Float64
    }

    fn fill_value() -> FillValue {
        FillValue::from(f64::NAN)
    }
}

impl GridElement for i32 {
    const SIZE: usize = 4;

    fn data_type() -> DataType {
        DataType::Int32
    }

    fn fill_value() -> FillValue {
        FillValue::from(0i32)
    }
}

/// Description of one array inside a group.
#[derive(Debug, Clone)]
pub struct ArraySpec<'a> {
    pub name: &'a str,
    pub dims: &'a [&'a str],
    pub shape: &'a [usize],
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl<'a> ArraySpec<'a> {
    pub fn new(name: &'a str, dims: &'a [&'a str], shape: &'a [usize]) -> Self {
        Self {
            name,
            dims,
            shape,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Writer for Zarr V3 groups and arrays.
#[derive(Debug, Clone)]
pub struct ZarrWriter {
    config: GridProcessorConfig,
}

impl ZarrWriter {
    /// Create a new ZarrWriter with the given configuration.
    pub fn new(config: GridProcessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GridProcessorConfig {
        &self.config
    }

    /// Replace whatever is at `path` with an empty store directory.
    pub fn create_store(&self, path: &Path) -> Result<Arc<FilesystemStore>> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        let store = FilesystemStore::new(path)
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))?;
        Ok(Arc::new(store))
    }

    /// Write the root group metadata.
    pub fn write_group(
        &self,
        store: &Arc<FilesystemStore>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let mut builder = GroupBuilder::new();
        builder.attributes(attributes);
        let group = builder
            .build(store.clone(), "/")
            .map_err(|e| GridProcessorError::zarr_error(e.to_string()))?;

        group
            .store_metadata()
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))
    }

    /// Write a whole array below the root group.
    ///
    /// # Returns
    /// Uncompressed bytes written
    pub fn write_array<T: GridElement>(
        &self,
        store: &Arc<FilesystemStore>,
        spec: ArraySpec<'_>,
        data: &[T],
    ) -> Result<u64> {
        let expected: usize = spec.shape.iter().product();
        if data.len() != expected || spec.dims.len() != spec.shape.len() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "array {} has {} values and dims {:?} for shape {:?}",
                spec.name,
                data.len(),
                spec.dims,
                spec.shape
            )));
        }

        let mut attrs = spec.attributes;
        attrs.insert(DIMENSIONS_ATTR.to_string(), serde_json::json!(spec.dims));

        let shape: Vec<u64> = spec.shape.iter().map(|&n| n as u64).collect();
        let chunk_grid: zarrs::array::ChunkGrid = self
            .chunk_shape(spec.shape)
            .try_into()
            .map_err(|e| GridProcessorError::ConfigError(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(shape.clone(), T::data_type(), chunk_grid, T::fill_value());
        let mut builder = binding.attributes(attrs);

        if self.config.zarr_compression != ZarrCompression::None {
            let codec = self.create_compression_codec(T::SIZE)?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let path = format!("/{}", spec.name);
        let array = builder
            .build(store.clone(), &path)
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))?;

        array
            .store_array_subset_elements(&subset, data)
            .map_err(|e| GridProcessorError::storage_error(e.to_string()))?;

        Ok((data.len() * T::SIZE) as u64)
    }

    /// Chunk shape for an array: one time step per chunk on 3-D arrays and
    /// square horizontal tiles capped at the array size.
    fn chunk_shape(&self, shape: &[usize]) -> Vec<u64> {
        let tile = self.config.zarr_chunk_size.max(1);
        match shape {
            [nt, ny, nx] if *nt > 0 => vec![1, (*ny).clamp(1, tile) as u64, (*nx).clamp(1, tile) as u64],
            [ny, nx] => vec![(*ny).clamp(1, tile) as u64, (*nx).clamp(1, tile) as u64],
            other => other.iter().map(|&n| n.max(1) as u64).collect(),
        }
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
        typesize: usize,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.zarr_compression_level)
            .map_err(|_| GridProcessorError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle = if self.config.zarr_shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.config.zarr_shuffle {
            Some(typesize)
        } else {
            None
        };

        let compressor = match self.config.zarr_compression {
            ZarrCompression::None => {
                return Err(GridProcessorError::ConfigError(
                    "No compression configured".to_string(),
                ))
            }
            ZarrCompression::Lz4 => BloscCompressor::LZ4,
            ZarrCompression::Zstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| GridProcessorError::ConfigError(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zarrs::array::Array;

    #[test]
    fn test_write_array_and_group() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("U_timeseries.zarr");

        let writer = ZarrWriter::new(GridProcessorConfig {
            zarr_compression: ZarrCompression::None,
            ..Default::default()
        });
        let store = writer.create_store(&path).unwrap();
        writer.write_group(&store, serde_json::Map::new()).unwrap();

        let data: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let bytes = writer
            .write_array(
                &store,
                ArraySpec::new("vozocrtx", &["time_counter", "y", "x"], &[2, 3, 4])
                    .attr("units", "m/s"),
                &data,
            )
            .unwrap();
        assert_eq!(bytes, 96);

        let array = Array::open(store.clone(), "/vozocrtx").unwrap();
        assert_eq!(array.shape(), &[2, 3, 4]);
        assert_eq!(
            array.attributes().get(DIMENSIONS_ATTR),
            Some(&serde_json::json!(["time_counter", "y", "x"]))
        );
        let subset = ArraySubset::new_with_shape(vec![2, 3, 4]);
        let back: Vec<f32> = array.retrieve_array_subset_elements(&subset).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_compressed_roundtrip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("mesh.zarr");

        let writer = ZarrWriter::new(GridProcessorConfig {
            zarr_chunk_size: 2,
            ..Default::default()
        });
        let store = writer.create_store(&path).unwrap();

        let mask = vec![0i32, 1, 1, 0, 2, 3];
        writer
            .write_array(&store, ArraySpec::new("mbathy", &["y", "x"], &[2, 3]), &mask)
            .unwrap();

        let array = Array::open(store.clone(), "/mbathy").unwrap();
        let subset = ArraySubset::new_with_shape(vec![2, 3]);
        let back: Vec<i32> = array.retrieve_array_subset_elements(&subset).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_shape_mismatch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let writer = ZarrWriter::new(GridProcessorConfig::default());
        let store = writer.create_store(&temp_dir.path().join("bad.zarr")).unwrap();
        let err = writer
            .write_array(&store, ArraySpec::new("x", &["x"], &[3]), &[1.0f64, 2.0])
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidMetadata(_)));
    }

    #[test]
    fn test_create_store_replaces_existing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("old.zarr");
        std::fs::create_dir_all(path.join("stale")).unwrap();

        let writer = ZarrWriter::new(GridProcessorConfig::default());
        writer.create_store(&path).unwrap();
        assert!(path.exists());
        assert!(!path.join("stale").exists());
    }
}
