//! Time-series assembly over an ordered snapshot sequence.
//!
//! Every snapshot is regridded against the same grid and node selection.
//! All slices of a snapshot are computed before any is appended, so a
//! failing snapshot never leaves a partial time step behind.

use grid_processor::{FieldRegridder, NoValidDataWarning, RegridOutcome, RegriddedField};
use mesh_common::NodeSelection;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{node_variables, VariableSource, VariableSpec};
use crate::error::{IngestionError, Result};
use crate::snapshot::{Snapshot, SnapshotInstant, SnapshotSource};

/// What to do with a snapshot that cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Fail the run, naming the snapshot.
    #[default]
    Abort,
    /// Log, record and continue with the next snapshot.
    Skip,
}

impl Strictness {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "abort" | "strict" => Some(Self::Abort),
            "skip" | "lenient" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// A snapshot left out under [`Strictness::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSnapshot {
    pub snapshot: String,
    pub reason: String,
}

/// Accumulated result of an assembly.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// One field per output variable, in variable-table order.
    pub fields: Vec<RegriddedField>,
    /// Raw step index of every assembled time step.
    pub indices: Vec<u64>,
    /// Source time of every step, where the snapshot declared one.
    pub source_times: Vec<Option<f64>>,
    pub warnings: Vec<NoValidDataWarning>,
    pub skipped: Vec<SkippedSnapshot>,
}

impl Assembly {
    pub fn steps(&self) -> usize {
        self.indices.len()
    }
}

/// Regridded slices of one snapshot: `[instant][variable]`.
struct SnapshotSlices {
    source_times: Vec<Option<f64>>,
    outcomes: Vec<Vec<RegridOutcome>>,
}

/// Stacks regridded snapshots into per-variable `(time, y, x)` fields.
pub struct TimeSeriesAssembler<'a> {
    regridder: &'a FieldRegridder<'a>,
    selection: &'a NodeSelection,
    variables: &'a [VariableSpec],
    strictness: Strictness,
    parallel: bool,
}

impl<'a> TimeSeriesAssembler<'a> {
    /// `selection` is the window mask over the full snapshot nodes; the
    /// regridder works on the selected nodes only.
    pub fn new(
        regridder: &'a FieldRegridder<'a>,
        selection: &'a NodeSelection,
        variables: &'a [VariableSpec],
    ) -> Self {
        Self {
            regridder,
            selection,
            variables,
            strictness: Strictness::default(),
            parallel: false,
        }
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Regrid the (variable, instant) jobs of each snapshot on the rayon pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn assemble(&self, sources: &[Box<dyn SnapshotSource>]) -> Result<Assembly> {
        let grid = self.regridder.grid();
        let node_vars = node_variables(self.variables);

        let mut assembly = Assembly {
            fields: self
                .variables
                .iter()
                .map(|v| RegriddedField::with_capacity(v.key.clone(), grid.ny(), grid.nx(), sources.len()))
                .collect(),
            indices: Vec::new(),
            source_times: Vec::new(),
            warnings: Vec::new(),
            skipped: Vec::new(),
        };
        let mut next_index: u64 = 0;
        let mut last_time: Option<(f64, String)> = None;

        for source in sources {
            let name = source.describe();

            let slices = match self.process(source.as_ref(), &name, &node_vars) {
                Ok(slices) => slices,
                Err(err) if self.strictness == Strictness::Skip && is_skippable(&err) => {
                    warn!(snapshot = %name, error = %err, "Skipping unreadable snapshot");
                    assembly.skipped.push(SkippedSnapshot {
                        snapshot: name,
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            for t in slices.source_times.iter().flatten() {
                if !t.is_finite() {
                    return Err(IngestionError::time_conflict(
                        &name,
                        format!("source time {} is not a finite value", t),
                    ));
                }
                if let Some((previous, previous_snapshot)) = &last_time {
                    if *t <= *previous {
                        return Err(IngestionError::time_conflict(
                            &name,
                            format!(
                                "source time {} does not follow {} from {}",
                                t, previous, previous_snapshot
                            ),
                        ));
                    }
                }
                last_time = Some((*t, name.clone()));
            }

            for (source_time, outcomes) in slices.source_times.into_iter().zip(slices.outcomes) {
                for (field, outcome) in assembly.fields.iter_mut().zip(outcomes) {
                    field.push_slice(&outcome.data)?;
                    if let Some(warning) = outcome.warning {
                        let warning = warning.at(&name, next_index);
                        warn!(warning = %warning, "Substituted fill value");
                        assembly.warnings.push(warning);
                    }
                }
                assembly.indices.push(next_index);
                assembly.source_times.push(source_time);
                next_index += 1;
            }

            debug!(snapshot = %name, steps = next_index, "Appended snapshot");
        }

        info!(
            snapshots = sources.len(),
            steps = assembly.steps(),
            skipped = assembly.skipped.len(),
            warnings = assembly.warnings.len(),
            "Assembled time series"
        );

        Ok(assembly)
    }

    fn process(
        &self,
        source: &dyn SnapshotSource,
        name: &str,
        node_vars: &[String],
    ) -> Result<SnapshotSlices> {
        let snapshot = source.read(node_vars)?;
        self.check_mesh(&snapshot, name)?;

        let jobs: Vec<(usize, usize)> = (0..snapshot.instants.len())
            .flat_map(|i| (0..self.variables.len()).map(move |v| (i, v)))
            .collect();

        let run = |&(i, v): &(usize, usize)| self.regrid_job(&snapshot.instants[i], &self.variables[v], name);
        let mut outcomes: Vec<RegridOutcome> = if self.parallel {
            jobs.par_iter().map(run).collect::<Result<_>>()?
        } else {
            jobs.iter().map(run).collect::<Result<_>>()?
        };

        // Jobs are instant-major, so every instant owns a contiguous run.
        let per_instant = self.variables.len();
        let mut grouped = Vec::with_capacity(snapshot.instants.len());
        for _ in 0..snapshot.instants.len() {
            let rest = outcomes.split_off(per_instant);
            grouped.push(std::mem::replace(&mut outcomes, rest));
        }

        Ok(SnapshotSlices {
            source_times: snapshot.instants.iter().map(|i| i.source_time).collect(),
            outcomes: grouped,
        })
    }

    fn check_mesh(&self, snapshot: &Snapshot, name: &str) -> Result<()> {
        if snapshot.cloud.len() != self.selection.len() {
            return Err(IngestionError::source_format(
                name,
                format!(
                    "snapshot has {} nodes, the mesh has {}",
                    snapshot.cloud.len(),
                    self.selection.len()
                ),
            ));
        }
        Ok(())
    }

    fn regrid_job(
        &self,
        instant: &SnapshotInstant,
        spec: &VariableSpec,
        name: &str,
    ) -> Result<RegridOutcome> {
        match &spec.source {
            VariableSource::Constant(value) => Ok(RegridOutcome {
                data: vec![*value as f32; self.regridder.grid().len()],
                warning: None,
            }),
            VariableSource::Node(variable) => {
                let sample = instant.field(variable).ok_or_else(|| {
                    IngestionError::source_format(name, format!("missing variable {}", variable))
                })?;
                let sample = sample
                    .subset(self.selection)
                    .map_err(|e| IngestionError::source_format(name, e))?;
                let mut outcome = self
                    .regridder
                    .regrid(&sample)
                    .map_err(|e| IngestionError::source_format(name, e))?;
                // Warnings are reported under the output key.
                if let Some(warning) = outcome.warning.as_mut() {
                    warning.variable = spec.key.clone();
                }
                Ok(outcome)
            }
        }
    }
}

/// Per-snapshot read failures; anything else stays fatal under `Skip`.
fn is_skippable(err: &IngestionError) -> bool {
    matches!(
        err,
        IngestionError::SourceFormat { .. } | IngestionError::EmptyDomain(_) | IngestionError::FileRead(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshot;
    use grid_processor::{FillPolicy, GridBuilder};
    use mesh_common::{FieldSample, NodeCloud};

    fn triangle() -> NodeCloud {
        NodeCloud::new(
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![-1.0, -1.0, 2.0],
        )
        .unwrap()
    }

    fn snapshot(name: &str, time: Option<f64>, u: [f64; 3]) -> Box<dyn SnapshotSource> {
        Box::new(
            MemorySnapshot::new(name, triangle())
                .with_instant(time, vec![FieldSample::new("u", u.to_vec())]),
        )
    }

    fn specs() -> Vec<VariableSpec> {
        vec![
            VariableSpec::node("U", "vozocrtx", "U", "u"),
            VariableSpec::constant("S", "vosaline", "S", 35.0),
        ]
    }

    #[test]
    fn test_sequential_indices_and_constants() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let sources: Vec<_> = (0..3)
            .map(|i| snapshot(&format!("s{}", i), Some(i as f64), [1.0, 2.0, 3.0]))
            .collect();
        let assembly = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap();

        assert_eq!(assembly.indices, vec![0, 1, 2]);
        assert_eq!(assembly.fields[0].shape(), (3, 3, 3));
        assert_eq!(assembly.fields[1].get(2, 2, 2), Some(35.0));
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.25).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let sources: Vec<_> = (0..4)
            .map(|i| snapshot(&format!("s{}", i), None, [i as f64, 2.0, 3.0]))
            .collect();
        let sequential = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap();
        let parallel = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .parallel(true)
            .assemble(&sources)
            .unwrap();

        assert_eq!(sequential.indices, parallel.indices);
        for (a, b) in sequential.fields.iter().zip(&parallel.fields) {
            assert_eq!(a.data(), b.data());
        }
    }

    #[test]
    fn test_non_increasing_source_time() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let sources = vec![
            snapshot("s0", Some(3600.0), [1.0; 3]),
            snapshot("s1", Some(3600.0), [1.0; 3]),
        ];
        let err = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .strictness(Strictness::Skip)
            .assemble(&sources)
            .unwrap_err();
        match err {
            IngestionError::TimeIndexConflict { snapshot, .. } => assert_eq!(snapshot, "s1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_source_time_is_conflict() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        // a fill-valued time cell decodes to NaN
        let sources = vec![
            snapshot("s0", Some(10.0), [1.0; 3]),
            snapshot("s1", Some(f64::NAN), [1.0; 3]),
            snapshot("s2", Some(5.0), [1.0; 3]),
        ];
        let err = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap_err();
        match err {
            IngestionError::TimeIndexConflict { snapshot, .. } => assert_eq!(snapshot, "s1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_all_nan_field_warns() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let sources = vec![
            snapshot("s0", None, [1.0; 3]),
            snapshot("s1", None, [f64::NAN; 3]),
        ];
        let assembly = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap();

        assert_eq!(assembly.steps(), 2);
        assert_eq!(assembly.warnings.len(), 1);
        let warning = &assembly.warnings[0];
        assert_eq!(warning.variable, "U");
        assert_eq!(warning.snapshot.as_deref(), Some("s1"));
        assert_eq!(warning.time_index, Some(1));
        assert!(assembly.fields[0].slice(1).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_multi_instant_snapshot() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let multi: Box<dyn SnapshotSource> = Box::new(
            MemorySnapshot::new("multi", triangle())
                .with_instant(Some(0.0), vec![FieldSample::new("u", vec![1.0; 3])])
                .with_instant(Some(1.0), vec![FieldSample::new("u", vec![2.0; 3])]),
        );
        let sources = vec![multi, snapshot("next", Some(2.0), [3.0; 3])];
        let assembly = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap();

        assert_eq!(assembly.indices, vec![0, 1, 2]);
        assert_eq!(assembly.source_times, vec![Some(0.0), Some(1.0), Some(2.0)]);
        assert_eq!(assembly.fields[0].get(1, 0, 0), Some(2.0));
        assert_eq!(assembly.fields[0].get(2, 0, 0), Some(3.0));
    }

    #[test]
    fn test_skip_and_abort() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let broken: Box<dyn SnapshotSource> = Box::new(
            MemorySnapshot::new("broken", triangle())
                .with_instant(None, vec![FieldSample::new("other", vec![1.0; 3])]),
        );
        let sources = vec![snapshot("s0", None, [1.0; 3]), broken, snapshot("s2", None, [2.0; 3])];

        let err = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .assemble(&sources)
            .unwrap_err();
        assert!(matches!(err, IngestionError::SourceFormat { ref snapshot, .. } if snapshot == "broken"));

        let assembly = TimeSeriesAssembler::new(&regridder, &plan.selection, &specs)
            .strictness(Strictness::Skip)
            .assemble(&sources)
            .unwrap();
        assert_eq!(assembly.indices, vec![0, 1]);
        assert_eq!(assembly.skipped.len(), 1);
        assert_eq!(assembly.skipped[0].snapshot, "broken");
        assert_eq!(assembly.fields[0].get(1, 0, 0), Some(2.0));
    }

    #[test]
    fn test_node_count_mismatch() {
        let cloud = triangle();
        let plan = GridBuilder::new(0.5).build(&cloud).unwrap();
        let regridder = FieldRegridder::new(&cloud, &plan.grid, FillPolicy::Zero);
        let specs = specs();

        let bigger = NodeCloud::new(vec![0.0, 1.0, 0.0, 1.0], vec![0.0, 0.0, 1.0, 1.0], vec![1.0; 4]).unwrap();
        let sources: Vec<Box<dyn SnapshotSource>> = vec![Box::new(
            MemorySnapshot::new("bigger", bigger)
                .with_instant(None, vec![FieldSample::new("u", vec![1.0; 4])]),
        )];
        assert!(matches!(
            TimeSeriesAssembler::new(&regridder, &plan.selection, &specs).assemble(&sources),
            Err(IngestionError::SourceFormat { .. })
        ));
    }
}
