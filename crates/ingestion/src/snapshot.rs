//! Unstructured snapshot sources.
//!
//! A snapshot is one source file (or in-memory equivalent) holding the node
//! cloud and one or more time instants of per-node fields.

use std::path::{Path, PathBuf};

use mesh_common::{FieldSample, NodeCloud};
use netcdf_parser::{SchismFile, SchismLayout};
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::metadata::stack_number;

/// Field values of one time instant.
#[derive(Debug, Clone)]
pub struct SnapshotInstant {
    /// Time value declared by the source, if it has one.
    pub source_time: Option<f64>,
    /// One sample per requested variable, in request order.
    pub fields: Vec<FieldSample>,
}

impl SnapshotInstant {
    pub fn field(&self, variable: &str) -> Option<&FieldSample> {
        self.fields.iter().find(|f| f.variable == variable)
    }
}

/// A fully read snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cloud: NodeCloud,
    pub instants: Vec<SnapshotInstant>,
}

/// Source of unstructured snapshots.
pub trait SnapshotSource: Send + Sync {
    /// Identifier used in errors and logs.
    fn describe(&self) -> String;

    /// Node coordinates and depth only.
    fn read_mesh(&self) -> Result<NodeCloud>;

    /// Mesh plus every instant of the requested variables.
    ///
    /// Fails with `SourceFormat` if a variable is absent and `EmptyDomain`
    /// if the snapshot has no nodes.
    fn read(&self, variables: &[String]) -> Result<Snapshot>;
}

/// A SCHISM `out2d_*.nc` file.
#[derive(Debug, Clone)]
pub struct NetCdfSnapshot {
    path: PathBuf,
    layout: SchismLayout,
}

impl NetCdfSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_layout(path, SchismLayout::default())
    }

    pub fn with_layout(path: impl Into<PathBuf>, layout: SchismLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<SchismFile> {
        let file = SchismFile::open_with_layout(&self.path, self.layout.clone())
            .map_err(|e| IngestionError::netcdf(self.describe(), e))?;
        if file.node_count() == 0 {
            return Err(IngestionError::EmptyDomain(format!(
                "{} has no nodes",
                self.describe()
            )));
        }
        Ok(file)
    }

    fn cloud(&self, file: &SchismFile) -> Result<NodeCloud> {
        let mesh = file
            .read_mesh()
            .map_err(|e| IngestionError::netcdf(self.describe(), e))?;
        NodeCloud::new(mesh.lons, mesh.lats, mesh.depths)
            .map_err(|e| IngestionError::source_format(self.describe(), e))
    }
}

impl SnapshotSource for NetCdfSnapshot {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_mesh(&self) -> Result<NodeCloud> {
        let file = self.open()?;
        self.cloud(&file)
    }

    fn read(&self, variables: &[String]) -> Result<Snapshot> {
        let file = self.open()?;
        let cloud = self.cloud(&file)?;

        let mut columns = Vec::with_capacity(variables.len());
        for name in variables {
            if !file.has_variable(name) {
                return Err(IngestionError::source_format(
                    self.describe(),
                    format!("missing variable {}", name),
                ));
            }
            let var = file
                .read_variable(name)
                .map_err(|e| IngestionError::netcdf(self.describe(), e))?;
            columns.push(var);
        }

        let (source_times, time_units) = match file
            .read_time()
            .map_err(|e| IngestionError::netcdf(self.describe(), e))?
        {
            Some(time) => (Some(time.values), time.units),
            None => (None, None),
        };

        let instant_count = columns
            .first()
            .map(|c| c.instants.len())
            .or_else(|| source_times.as_ref().map(Vec::len))
            .unwrap_or(1);

        if let Some(c) = columns.iter().find(|c| c.instants.len() != instant_count) {
            return Err(IngestionError::source_format(
                self.describe(),
                format!(
                    "variable {} has {} instants, expected {}",
                    c.name,
                    c.instants.len(),
                    instant_count
                ),
            ));
        }

        let times: Vec<Option<f64>> = match source_times {
            Some(values) if values.len() == instant_count => values.into_iter().map(Some).collect(),
            Some(values) => {
                return Err(IngestionError::source_format(
                    self.describe(),
                    format!(
                        "time has {} values for {} instants",
                        values.len(),
                        instant_count
                    ),
                ))
            }
            None => vec![None; instant_count],
        };

        let mut instants: Vec<SnapshotInstant> = times
            .into_iter()
            .map(|source_time| SnapshotInstant {
                source_time,
                fields: Vec::with_capacity(columns.len()),
            })
            .collect();

        for column in columns {
            for (instant, values) in instants.iter_mut().zip(column.instants) {
                instant.fields.push(FieldSample::new(column.name.clone(), values));
            }
        }

        debug!(
            snapshot = %self.describe(),
            stack = ?stack_number(&self.path),
            nodes = cloud.len(),
            instants = instants.len(),
            time_units = time_units.as_deref().unwrap_or("none"),
            "Read SCHISM snapshot"
        );

        Ok(Snapshot { cloud, instants })
    }
}

/// A snapshot held in memory, for synthetic inputs and tests.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    name: String,
    cloud: NodeCloud,
    instants: Vec<SnapshotInstant>,
}

impl MemorySnapshot {
    pub fn new(name: impl Into<String>, cloud: NodeCloud) -> Self {
        Self {
            name: name.into(),
            cloud,
            instants: Vec::new(),
        }
    }

    /// Add an instant holding `fields`.
    pub fn with_instant(mut self, source_time: Option<f64>, fields: Vec<FieldSample>) -> Self {
        self.instants.push(SnapshotInstant {
            source_time,
            fields,
        });
        self
    }
}

impl SnapshotSource for MemorySnapshot {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn read_mesh(&self) -> Result<NodeCloud> {
        if self.cloud.is_empty() {
            return Err(IngestionError::EmptyDomain(format!("{} has no nodes", self.name)));
        }
        Ok(self.cloud.clone())
    }

    fn read(&self, variables: &[String]) -> Result<Snapshot> {
        let cloud = self.read_mesh()?;

        let mut instants = Vec::with_capacity(self.instants.len());
        for instant in &self.instants {
            let mut fields = Vec::with_capacity(variables.len());
            for name in variables {
                let field = instant.field(name).ok_or_else(|| {
                    IngestionError::source_format(&self.name, format!("missing variable {}", name))
                })?;
                field
                    .check_len(cloud.len())
                    .map_err(|e| IngestionError::source_format(&self.name, e))?;
                fields.push(field.clone());
            }
            instants.push(SnapshotInstant {
                source_time: instant.source_time,
                fields,
            });
        }

        Ok(Snapshot { cloud, instants })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> NodeCloud {
        NodeCloud::new(vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0], vec![1.0; 3]).unwrap()
    }

    #[test]
    fn test_memory_snapshot_selects_variables() {
        let snap = MemorySnapshot::new("s0", cloud()).with_instant(
            Some(0.0),
            vec![
                FieldSample::new("U", vec![1.0, 2.0, 3.0]),
                FieldSample::new("V", vec![0.0; 3]),
            ],
        );
        let read = snap.read(&["V".to_string()]).unwrap();
        assert_eq!(read.instants.len(), 1);
        assert_eq!(read.instants[0].fields.len(), 1);
        assert_eq!(read.instants[0].fields[0].variable, "V");
    }

    #[test]
    fn test_memory_snapshot_missing_variable() {
        let snap = MemorySnapshot::new("s0", cloud())
            .with_instant(None, vec![FieldSample::new("U", vec![1.0; 3])]);
        let err = snap.read(&["elevation".to_string()]).unwrap_err();
        match err {
            IngestionError::SourceFormat { snapshot, reason } => {
                assert_eq!(snapshot, "s0");
                assert!(reason.contains("elevation"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_memory_snapshot_length_mismatch() {
        let snap = MemorySnapshot::new("s0", cloud())
            .with_instant(None, vec![FieldSample::new("U", vec![1.0; 2])]);
        assert!(matches!(
            snap.read(&["U".to_string()]),
            Err(IngestionError::SourceFormat { .. })
        ));
    }

    #[test]
    fn test_empty_cloud() {
        let empty = NodeCloud::new(vec![], vec![], vec![]).unwrap();
        let snap = MemorySnapshot::new("empty", empty);
        assert!(matches!(snap.read_mesh(), Err(IngestionError::EmptyDomain(_))));
    }
}
