//! End to end runs of the pipeline on a 2 x 3 cell lattice.

use moisture_common::structures::GridAxes;
use moisture_tools::config::{Correction, OutputFormat, RunConfig};
use moisture_tools::netcdf_io;
use moisture_tools::pool::{UnitStatus, WorkerPool};
use moisture_tools::tables::{target_cells_path, CoordinateTable, ShardKey, ZoneId};
use moisture_tools::tools::ToolManager;
use moisture_tools::tracking::{
    plan_zones, read_footprint, region_path, shard_path, AssemblyOutcome, BatchAggregator, Direction,
    FluxClimatology, FootprintEngine, NetcdfKernel, RunAssembler, ShardOrchestrator,
};
use moisture_tools::watersheds::{watershed_path, WatershedDelineator};
use moisture_tools::zones::{ZoneRaster, ZoneScreener};
use std::fs;
use std::path::{Path, PathBuf};

const ROWS: usize = 2;
const COLUMNS: usize = 3;
const EVAP: f64 = 1.0;
const PRECIP: f64 = 2.0;
const AREA: f64 = 10.0;

fn axes() -> GridAxes {
    GridAxes::regular(1.0, -1.0, ROWS, 0.0, 1.0, COLUMNS)
}

/// A file on the fixture lattice with one double variable.
fn write_grid(path: &Path, variable: &str, dims: &[&str], values: &[f64]) {
    let mut file = netcdf::create(path).unwrap();
    if dims[0] == "month" {
        file.add_dimension("month", 12).unwrap();
    }
    netcdf_io::put_axes(&mut file, &axes()).unwrap();
    netcdf_io::put_f64(&mut file, variable, dims, values, &[]).unwrap();
}

fn write_monthly(path: &Path, variable: &str, value: f64) {
    let values = vec![value; 12 * ROWS * COLUMNS];
    write_grid(path, variable, &["month", "lat", "lon"], &values);
}

fn write_area(path: &Path) {
    write_grid(path, "cell_area", &["lat", "lon"], &[AREA; ROWS * COLUMNS]);
}

fn write_kernel(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let cells = ROWS * COLUMNS;
    for month in 1..=12 {
        let mut values = Vec::with_capacity(cells * cells);
        for source in 0..cells {
            for dest in 0..cells {
                values.push(1.0 + ((source + dest + month) % 5) as f64);
            }
        }
        let mut file = netcdf::create(dir.join(format!("utrack_climatology_0.5_{:02}.nc", month))).unwrap();
        file.add_dimension("src_lat", ROWS).unwrap();
        file.add_dimension("src_lon", COLUMNS).unwrap();
        netcdf_io::put_axes(&mut file, &axes()).unwrap();
        netcdf_io::put_f64(&mut file, "moisture_flow", &["src_lat", "src_lon", "lat", "lon"], &values, &[]).unwrap();
    }
}

/// Zone 1 holds three cells, zone 2 two, and one cell has no zone.
fn write_zones(path: &Path) {
    let ids = [1.0, 1.0, 2.0, 2.0, f64::NAN, 1.0];
    write_grid(path, "Band1", &["lat", "lon"], &ids);
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config: RunConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    write_kernel(&root.join("kernel"));
    write_monthly(&root.join("evap.nc"), "e", EVAP);
    write_monthly(&root.join("precip.nc"), "tp", PRECIP);
    write_area(&root.join("area.nc"));
    write_zones(&root.join("zones.nc"));
    let config = RunConfig {
        kernel_dir: root.join("kernel"),
        evap_path: root.join("evap.nc"),
        precip_path: root.join("precip.nc"),
        area_path: root.join("area.nc"),
        target_cells_dir: root.join("target_cells"),
        footprints_dir: root.join("footprints"),
        watersheds_dir: root.join("watersheds"),
        correction: Correction {
            apply: false,
            ..Correction::default()
        },
        max_workers: 2,
        shard_size: 2,
        axes: axes(),
        ..RunConfig::default()
    };
    Fixture {
        _dir: dir,
        root,
        config,
    }
}

fn kernel(config: &RunConfig) -> NetcdfKernel {
    NetcdfKernel::new(
        &config.kernel_dir,
        &config.variables.kernel_file_prefix,
        &config.variables.kernel,
        ROWS,
        COLUMNS,
    )
}

fn screen(config: &RunConfig, pool: &WorkerPool) {
    let raster = ZoneRaster::load(&config.area_path.with_file_name("zones.nc"), "Band1").unwrap();
    let ids = raster.distinct_ids();
    assert_eq!(ids, vec![ZoneId(1), ZoneId(2)]);
    let summary = ZoneScreener::new(&raster, &config.target_cells_dir).run(pool, &ids);
    assert_eq!(summary.succeeded(), 2);
}

#[test]
fn test_pipeline_conserves_flux_and_delineates_watersheds() {
    let f = fixture();
    let config = &f.config;
    let pool = WorkerPool::new(config.max_workers).unwrap();

    screen(config, &pool);
    let table = CoordinateTable::read(&target_cells_path(&config.target_cells_dir, ZoneId(1))).unwrap();
    assert_eq!(table.len(), 3);

    let shards = plan_zones(&config.target_cells_dir, &[ZoneId(1), ZoneId(2)], config.shard_size).unwrap();
    assert_eq!(
        shards,
        vec![
            ShardKey::new(ZoneId(1), 0, 2),
            ShardKey::new(ZoneId(1), 2, 3),
            ShardKey::new(ZoneId(2), 0, 2)
        ]
    );

    let kernel = kernel(config);
    kernel.verify().unwrap();
    let climatology = FluxClimatology::load(config).unwrap();
    let orchestrator = ShardOrchestrator::new(config, &kernel, &climatology).unwrap();
    let summary = orchestrator.run(&pool, &shards);
    assert_eq!(summary.succeeded(), 3, "Got {:?}", summary.lines());
    for key in &shards {
        for direction in Direction::both() {
            assert!(shard_path(&config.footprints_dir, direction, key).is_file());
        }
    }

    let assembler = RunAssembler::new(config);
    match assembler.assemble(ZoneId(1)).unwrap() {
        AssemblyOutcome::Assembled {
            shard_count,
            gaps,
            unpaired,
            ..
        } => {
            assert_eq!(shard_count, 2);
            assert!(gaps.is_empty());
            assert!(unpaired.is_empty());
        }
        other => panic!("Expected zone 1 to assemble, got {:?}", other),
    }

    // every cell-month sends its whole evaporation volume and receives its
    // whole precipitation volume
    let forward = read_footprint(&region_path(&config.footprints_dir, Direction::Forward, ZoneId(1)), Direction::Forward)
        .unwrap();
    let forward_total: f64 = forward.annual().unwrap().as_slice().iter().sum();
    let expected = 3.0 * 12.0 * EVAP * AREA;
    assert!((forward_total - expected).abs() < 1e-6, "Expected {}, got {}", expected, forward_total);

    let backward = read_footprint(&region_path(&config.footprints_dir, Direction::Backward, ZoneId(1)), Direction::Backward)
        .unwrap();
    let backward_total: f64 = backward.annual().unwrap().as_slice().iter().sum();
    let expected = 3.0 * 12.0 * PRECIP * AREA;
    assert!((backward_total - expected).abs() < 1e-6, "Expected {}, got {}", expected, backward_total);

    // the assembled shards equal one batch over the whole table
    let engine = FootprintEngine::new(&kernel, &climatology, &config.axes).unwrap();
    let whole = BatchAggregator::new(engine).aggregate(&table.cells).unwrap();
    let assembled = forward.into_aggregate("1").unwrap();
    for (a, b) in assembled.grid.as_slice().iter().zip(whole.get(Direction::Forward).grid.as_slice()) {
        assert!((a - b).abs() < 1e-9, "Expected {}, got {}", b, a);
    }

    let mut gridded = config.clone();
    gridded.output_format = OutputFormat::Netcdf;
    gridded.percentile = 90.0;
    let summary = WatershedDelineator::new(&gridded).unwrap().run(&pool, &[ZoneId(1)]);
    assert_eq!(summary.succeeded(), 1, "Got {:?}", summary.lines());
    let path = watershed_path(&gridded.watersheds_dir, Direction::Backward, OutputFormat::Netcdf, 90.0, ZoneId(1));
    let file = netcdf::open(&path).unwrap();
    assert_eq!(netcdf_io::read_f64(&file, "lat").unwrap(), vec![0.0, 1.0]);
    let mask = netcdf_io::read_f64(&file, "90%_pshed_mask").unwrap();
    let values = netcdf_io::read_f64(&file, "90%_pshed_values").unwrap();
    assert!(mask.iter().any(|m| *m == 1.0));
    let inside: f64 = values.iter().filter(|v| v.is_finite()).sum();
    assert!(inside >= 0.9 * backward_total - 1e-6);
    assert!(watershed_path(&gridded.watersheds_dir, Direction::Forward, OutputFormat::Netcdf, 90.0, ZoneId(1)).is_file());

    let mut vector = config.clone();
    vector.output_format = OutputFormat::GeoJson;
    let summary = WatershedDelineator::new(&vector).unwrap().run(&pool, &[ZoneId(1)]);
    assert_eq!(summary.succeeded(), 1);
    let path = watershed_path(&vector.watersheds_dir, Direction::Backward, OutputFormat::GeoJson, 99.0, ZoneId(1));
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(parsed["type"], "FeatureCollection");
    assert_eq!(parsed["features"][0]["geometry"]["type"], "MultiPolygon");
}

#[test]
fn test_missing_inputs_skip_units() {
    let f = fixture();
    let config = &f.config;
    let pool = WorkerPool::new(config.max_workers).unwrap();
    screen(config, &pool);

    // without March every shard is skipped, none fails
    fs::remove_file(config.kernel_dir.join("utrack_climatology_0.5_03.nc")).unwrap();
    let kernel = kernel(config);
    assert!(kernel.verify().is_err());
    let climatology = FluxClimatology::load(config).unwrap();
    let orchestrator = ShardOrchestrator::new(config, &kernel, &climatology).unwrap();
    let shards = plan_zones(&config.target_cells_dir, &[ZoneId(1), ZoneId(2)], config.shard_size).unwrap();
    let summary = orchestrator.run(&pool, &shards);
    assert_eq!(summary.skipped(), 3, "Got {:?}", summary.lines());
    assert_eq!(summary.failed(), 0);

    let summary = RunAssembler::new(config).run(&pool, &[ZoneId(1), ZoneId(2)]);
    assert_eq!(summary.skipped(), 2);
    assert!(matches!(summary.status_of("1"), Some(UnitStatus::Skipped(_))));
    assert!(!region_path(&config.footprints_dir, Direction::Forward, ZoneId(1)).exists());

    let summary = WatershedDelineator::new(config).unwrap().run(&pool, &[ZoneId(1)]);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.failed(), 0);
}

#[test]
fn test_lone_shard_file_is_left_out_of_assembly() {
    let f = fixture();
    let config = &f.config;
    let pool = WorkerPool::new(config.max_workers).unwrap();
    screen(config, &pool);

    let kernel = kernel(config);
    let climatology = FluxClimatology::load(config).unwrap();
    let orchestrator = ShardOrchestrator::new(config, &kernel, &climatology).unwrap();
    let shards = plan_zones(&config.target_cells_dir, &[ZoneId(1)], config.shard_size).unwrap();
    assert_eq!(orchestrator.run(&pool, &shards).succeeded(), 2);

    let lost = ShardKey::new(ZoneId(1), 2, 3);
    fs::remove_file(shard_path(&config.footprints_dir, Direction::Backward, &lost)).unwrap();
    match RunAssembler::new(config).assemble(ZoneId(1)).unwrap() {
        AssemblyOutcome::Assembled {
            shard_count,
            gaps,
            unpaired,
            ..
        } => {
            assert_eq!(shard_count, 1);
            assert_eq!(gaps, vec![(2, 3)]);
            assert_eq!(unpaired, vec![lost]);
        }
        other => panic!("Expected a partial assembly, got {:?}", other),
    }
}

#[test]
fn test_tools_run_the_pipeline() {
    let f = fixture();
    let root = &f.root;
    let arg = |flag: &str, path: &Path| format!("--{}={}", flag, path.display());
    let tm = ToolManager::new("", &false).unwrap();

    tm.run_tool(
        "ScreenZones".to_string(),
        vec![
            arg("zones", &root.join("zones.nc")),
            arg("out_dir", &root.join("target_cells")),
            "--workers=2".to_string(),
        ],
    )
    .unwrap();
    assert!(target_cells_path(&root.join("target_cells"), ZoneId(2)).is_file());

    let plan = root.join("params.csv");
    let summary = root.join("shards.json");
    tm.run_tool(
        "RunShards".to_string(),
        vec![
            "--zones=all".to_string(),
            "--shard_size=2".to_string(),
            arg("kernel_dir", &root.join("kernel")),
            arg("evap", &root.join("evap.nc")),
            arg("precip", &root.join("precip.nc")),
            arg("area", &root.join("area.nc")),
            arg("target_cells", &root.join("target_cells")),
            arg("footprints", &root.join("footprints")),
            arg("plan", &plan),
            arg("summary", &summary),
            "--no_correction".to_string(),
            "--workers=2".to_string(),
        ],
    )
    .unwrap();
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(report["reports"].as_array().map(|r| r.len()), Some(3));

    tm.run_tool(
        "AssembleRuns".to_string(),
        vec![
            arg("params", &plan),
            arg("target_cells", &root.join("target_cells")),
            arg("footprints", &root.join("footprints")),
        ],
    )
    .unwrap();
    assert!(region_path(&root.join("footprints"), Direction::Backward, ZoneId(2)).is_file());

    tm.run_tool(
        "AtmosWatersheds".to_string(),
        vec![
            arg("params", &plan),
            arg("footprints", &root.join("footprints")),
            arg("watersheds", &root.join("watersheds")),
            "--format=geojson".to_string(),
            "--percent=50".to_string(),
        ],
    )
    .unwrap();
    for zone in [ZoneId(1), ZoneId(2)] {
        let path = watershed_path(&root.join("watersheds"), Direction::Forward, OutputFormat::GeoJson, 50.0, zone);
        assert!(path.is_file(), "Expected {}", path.display());
    }

    assert!(tm
        .run_tool("AtmosWatersheds".to_string(), vec!["--percent=0".to_string()])
        .is_err());
}
