//! Conversions of SCHISM-shaped NetCDF files created on the fly.

use std::path::{Path, PathBuf};

use grid_processor::{Fieldset, FileGranularity};
use ingestion::{
    sort_snapshots, ConversionPipeline, IngestionError, NetCdfSnapshot, PipelineOptions,
    SnapshotSource, Strictness, VariableSpec,
};
use mesh_common::TimeEncoding;
use netcdf_parser::SchismLayout;
use test_utils::fixtures::schism;
use test_utils::{assert_approx_eq, require_test_file};

/// Unit-square mesh with `[time, node]` velocity and `[node]` elevation.
fn write_out2d(path: &Path, times: &[f64], velx: &[f64]) {
    let mut file = netcdf::create(path).expect("create netcdf");
    file.add_dimension(schism::NODE_DIM, 4).unwrap();
    file.add_dimension(schism::TIME, times.len()).unwrap();

    let node = [schism::NODE_DIM];
    {
        let mut x = file.add_variable::<f64>(schism::NODE_X, &node).unwrap();
        x.put_values(&[0.0, 1.0, 0.0, 1.0], ..).unwrap();
    }
    {
        let mut y = file.add_variable::<f64>(schism::NODE_Y, &node).unwrap();
        y.put_values(&[0.0, 0.0, 1.0, 1.0], ..).unwrap();
    }
    {
        let mut depth = file.add_variable::<f64>(schism::DEPTH, &node).unwrap();
        depth.put_values(&[5.0, 5.0, 5.0, -1.0], ..).unwrap();
    }
    {
        let mut time = file.add_variable::<f64>(schism::TIME, &[schism::TIME]).unwrap();
        time.put_attribute("units", "seconds since 2024-01-01 00:00:00").unwrap();
        time.put_values(times, ..).unwrap();
    }
    {
        let mut u = file
            .add_variable::<f64>(schism::VEL_X, &[schism::TIME, schism::NODE_DIM])
            .unwrap();
        u.put_attribute("_FillValue", -9999.0f64).unwrap();
        u.put_values(velx, ..).unwrap();
    }
    {
        let mut v = file
            .add_variable::<f64>(schism::VEL_Y, &[schism::TIME, schism::NODE_DIM])
            .unwrap();
        let zeros = vec![0.0f64; velx.len()];
        v.put_values(&zeros[..], ..).unwrap();
    }
    {
        let mut elev = file.add_variable::<f32>(schism::ELEVATION, &node).unwrap();
        elev.put_values(&[0.5f32, 0.5, 0.5, 0.5], ..).unwrap();
    }
}

fn velocity_options() -> PipelineOptions {
    PipelineOptions {
        resolution: 0.5,
        variables: vec![
            VariableSpec::node("U", "vozocrtx", "U", schism::VEL_X),
            VariableSpec::node("V", "vomecrty", "V", schism::VEL_Y),
        ],
        ..Default::default()
    }
}

fn stack(dir: &Path, n: usize, times: &[f64], velx: &[f64]) -> PathBuf {
    let path = dir.join(format!("out2d_{}.nc", n));
    write_out2d(&path, times, velx);
    path
}

#[test]
fn test_schism_files_to_fieldset() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let mut paths = vec![
        stack(input.path(), 10, &[7200.0], &[3.0; 4]),
        stack(input.path(), 2, &[3600.0], &[2.0; 4]),
        stack(input.path(), 1, &[0.0], &[1.0, 1.0, 1.0, 1.0]),
    ];
    sort_snapshots(&mut paths);

    let report = ConversionPipeline::new(velocity_options())
        .run_files(&paths, &SchismLayout::default(), output.path())
        .unwrap();
    assert_eq!(report.time_steps, 3);
    assert_eq!(report.nodes_used, 4);

    let fieldset = Fieldset::open(output.path()).unwrap();
    assert_eq!(fieldset.shape(), (3, 3, 3));
    assert_eq!(fieldset.time().values(), &[0.0, 3600.0, 7200.0]);
    // natural order puts out2d_10 last
    assert_approx_eq!(fieldset.sample("U", 2, 0, 1, 1).unwrap(), 3.0, 1e-6);
    assert_approx_eq!(fieldset.sample("U", 0, 0, 0, 0).unwrap(), 1.0, 1e-6);
    // (1, 1) is the one land node
    assert_eq!(fieldset.mbathy()[fieldset.grid().index(2, 2)], 0);
    assert_eq!(fieldset.mbathy()[fieldset.grid().index(0, 0)], 1);
}

#[test]
fn test_multi_instant_file_and_fill_values() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    // second instant has a fill value at node 3
    let velx = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, -9999.0];
    let paths = vec![stack(input.path(), 1, &[0.0, 3600.0], &velx)];

    let options = PipelineOptions {
        time_axis: mesh_common::TimeAxis {
            encoding: TimeEncoding::HourCounter,
            ..Default::default()
        },
        granularity: FileGranularity::Hourly,
        ..velocity_options()
    };
    ConversionPipeline::new(options)
        .run_files(&paths, &SchismLayout::default(), output.path())
        .unwrap();

    assert!(output.path().join("U_2024-01-01T00.zarr").is_dir());
    assert!(output.path().join("U_2024-01-01T01.zarr").is_dir());

    let fieldset = Fieldset::open(output.path()).unwrap();
    assert_eq!(fieldset.time().values(), &[0.0, 1.0]);
    assert_approx_eq!(fieldset.sample("U", 1, 0, 0, 0).unwrap(), 2.0, 1e-6);
    // node (1, 1) is masked at t = 1, leaving the far corner outside the hull
    assert_eq!(fieldset.sample("U", 1, 0, 2, 2).unwrap(), 0.0);
}

#[test]
fn test_decreasing_source_time_conflict() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let paths = vec![
        stack(input.path(), 1, &[3600.0], &[1.0; 4]),
        stack(input.path(), 2, &[0.0], &[1.0; 4]),
    ];
    let options = PipelineOptions {
        strictness: Strictness::Skip,
        ..velocity_options()
    };
    let err = ConversionPipeline::new(options)
        .run_files(&paths, &SchismLayout::default(), output.path())
        .unwrap_err();
    assert!(matches!(err, IngestionError::TimeIndexConflict { .. }));
    assert!(!output.path().join("settings.json").exists());
}

#[test]
fn test_missing_file_aborts_with_snapshot_name() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let paths = vec![
        stack(input.path(), 1, &[0.0], &[1.0; 4]),
        input.path().join("out2d_2.nc"),
    ];
    let err = ConversionPipeline::new(velocity_options())
        .run_files(&paths, &SchismLayout::default(), output.path())
        .unwrap_err();
    match err {
        IngestionError::SourceFormat { snapshot, .. } => assert!(snapshot.ends_with("out2d_2.nc")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_variable_is_source_format() {
    let input = tempfile::tempdir().unwrap();
    let path = stack(input.path(), 1, &[0.0], &[1.0; 4]);

    let snapshot = NetCdfSnapshot::new(&path);
    let err = snapshot.read(&["salt".to_string()]).unwrap_err();
    assert!(matches!(err, IngestionError::SourceFormat { .. }));

    let read = snapshot
        .read(&[schism::VEL_X.to_string(), schism::ELEVATION.to_string()])
        .unwrap();
    assert_eq!(read.cloud.len(), 4);
    assert_eq!(read.instants.len(), 1);
    assert_eq!(read.instants[0].source_time, Some(0.0));
    assert_eq!(read.instants[0].fields[1].values, vec![0.5; 4]);
}

#[test]
fn test_real_schism_output() {
    let path = require_test_file!("out2d_1.nc");
    let output = tempfile::tempdir().unwrap();

    let options = PipelineOptions {
        resolution: 0.05,
        ..Default::default()
    };
    let report = ConversionPipeline::new(options)
        .run_files(&[path], &SchismLayout::default(), output.path())
        .unwrap();
    assert!(report.time_steps >= 1);
    assert!(Fieldset::open(output.path()).is_ok());
}
