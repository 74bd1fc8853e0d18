use approx::assert_relative_eq;
use blowout_common::{OutputConfig, OutputFormat, RunConfig, SwarmConfig};
use blowout_engine::constants::E_CHARGE;
use blowout_engine::error::ConfigError;
use blowout_engine::{
    BunchDescriptor, CavitySettings, ElectronSwarmState, IonCavityTracker, PersistError, RunError,
    RunState, SimulationRun, SliceSchedule,
};
use std::path::Path;
use std::sync::Arc;

const SZ: f64 = 30e-6;

fn schedule() -> Arc<SliceSchedule> {
    Arc::new(SliceSchedule::new(-5.0 * SZ, 0.0, SZ / 5.0, 1e18).unwrap())
}

fn bunch(charge: f64) -> BunchDescriptor {
    BunchDescriptor::new(8e-6, 2e-6, SZ, charge, 39824.0).unwrap()
}

fn grid_run(charge: f64, num_pts: u32, mag: f64) -> SimulationRun {
    let swarm =
        ElectronSwarmState::new(schedule(), &SwarmConfig::Grid { num_pts, x_mag: mag, y_mag: mag }).unwrap();
    let tracker = IonCavityTracker::new(CavitySettings::default().with_bins(50).unwrap());
    SimulationRun::new(bunch(charge), swarm, tracker).unwrap()
}

fn velocity_change(run: &SimulationRun, j: usize) -> f64 {
    let swarm = run.swarm();
    let last = swarm.num_steps() - 1;
    (swarm.velocity(last, j).unwrap() - swarm.velocity(0, j).unwrap()).length()
}

fn find_particle(run: &SimulationRun, x: f64, y: f64) -> usize {
    let swarm = run.swarm();
    (0..swarm.num_parts())
        .find(|&j| {
            let p = swarm.position(0, j).unwrap();
            (p.x - x).abs() < 1e-12 && (p.y - y).abs() < 1e-12
        })
        .unwrap()
}

fn output(dir: &Path, format: OutputFormat) -> OutputConfig {
    OutputConfig {
        directory: dir.to_path_buf(),
        base_filename: Some("run".into()),
        format,
        save_positions: false,
        format_version: "test-1".into(),
    }
}

#[test]
fn four_electrons_complete_with_one_snapshot_per_slice() {
    let mut run = grid_run(1e4 * E_CHARGE, 2, 1e-8);
    run.run().unwrap();

    assert_eq!(run.state(), RunState::Completed);
    assert_eq!(run.swarm().num_steps(), 26);
    assert_eq!(run.tracker().len(), 26);

    // Symmetric start, symmetric push
    let first = velocity_change(&run, 0);
    assert!(first > 0.0);
    for j in 1..4 {
        assert_relative_eq!(velocity_change(&run, j), first, max_relative = 1e-12);
    }
    let last = run.swarm().num_steps() - 1;
    for j in 0..4 {
        let p = run.swarm().position(0, j).unwrap();
        let v = run.swarm().velocity(last, j).unwrap();
        assert!(p.x * v.x > 0.0 && p.y * v.y > 0.0);
    }
}

#[test]
fn electrons_nearer_the_axis_are_pushed_harder() {
    let mut run = grid_run(1e4 * E_CHARGE, 5, 80e-6);
    run.run().unwrap();

    let near = find_particle(&run, 0.0, 40e-6);
    let far = find_particle(&run, 0.0, 80e-6);
    assert!(velocity_change(&run, near) > velocity_change(&run, far));

    let near_x = find_particle(&run, 40e-6, 0.0);
    let far_x = find_particle(&run, 80e-6, 0.0);
    assert!(velocity_change(&run, near_x) > velocity_change(&run, far_x));
}

// With the q/ε0 field prefactor, 2e10 electrons within ±10 nm of the axis
// drive the swarm past β² = 1 within a few slices.
#[test]
fn full_charge_on_tiny_grid_aborts_and_is_not_persisted() {
    let mut run = grid_run(2e10 * E_CHARGE, 2, 1e-8);
    let err = run.run().unwrap_err();
    assert!(matches!(err, RunError::Kinematics { .. }));
    assert!(matches!(run.state(), RunState::Aborted { .. }));
    assert!(run.swarm().completed_at().is_none());
    assert!(run.tracker().completed_at().is_none());

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(run.default_base_filename(), Err(PersistError::Incomplete(_))));
    assert!(matches!(
        run.save(&output(dir.path(), OutputFormat::Bincode)),
        Err(PersistError::Incomplete(RunError::Aborted(_)))
    ));
}

#[test]
fn unstarted_run_cannot_be_saved() {
    let run = grid_run(1e4 * E_CHARGE, 2, 1e-8);
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        run.save(&output(dir.path(), OutputFormat::Json)),
        Err(PersistError::Incomplete(RunError::NotCompleted))
    ));
}

#[test]
fn random_swarm_stays_mirror_symmetric() {
    let swarm = ElectronSwarmState::new(
        schedule(),
        &SwarmConfig::Random { num_parts: 10, x_mag: 20e-6, y_mag: 20e-6, seed: 3 },
    )
    .unwrap();
    assert_eq!(swarm.num_parts(), 8);
    let tracker = IonCavityTracker::new(CavitySettings::default().with_bins(50).unwrap());
    let mut run = SimulationRun::new(bunch(1e4 * E_CHARGE), swarm, tracker).unwrap();
    run.run().unwrap();

    let swarm = run.swarm();
    let last = swarm.num_steps() - 1;
    for j in 0..2 {
        let p = swarm.position(last, j).unwrap();
        let mirrored_x = swarm.position(last, j + 2).unwrap();
        let mirrored_y = swarm.position(last, j + 4).unwrap();
        assert_eq!(mirrored_x.x, -p.x);
        assert_eq!(mirrored_x.y, p.y);
        assert_eq!(mirrored_y.x, p.x);
        assert_eq!(mirrored_y.y, -p.y);
    }
}

#[test]
fn persisted_run_reloads_in_every_format() {
    let mut run = grid_run(1e4 * E_CHARGE, 4, 5e-6);
    run.run().unwrap();
    let settings = *run.tracker().settings();
    let dir = tempfile::tempdir().unwrap();

    for format in [OutputFormat::Bincode, OutputFormat::Json, OutputFormat::MessagePack] {
        let out = output(dir.path(), format);
        let saved = run.save(&out).unwrap();
        assert!(saved.records.ions.exists());
        assert!(saved.positions.is_none());

        let loaded = SimulationRun::load(&out, &saved.base, settings).unwrap();
        assert_eq!(loaded.state(), RunState::Completed);
        assert_eq!(loaded.completed_at().unwrap(), run.completed_at().unwrap());
        assert_eq!(loaded.bunch(), run.bunch());
        assert_eq!(loaded.schedule(), run.schedule());
        assert_eq!(loaded.swarm().num_parts(), run.swarm().num_parts());
        assert_eq!(loaded.swarm().x(), run.swarm().x());
        assert_eq!(loaded.swarm().y(), run.swarm().y());
        assert_eq!(loaded.swarm().bx(), run.swarm().bx());
        assert_eq!(loaded.swarm().by(), run.swarm().by());
        assert_eq!(loaded.tracker(), run.tracker());
    }
}

#[test]
fn version_mismatch_is_rejected_on_load() {
    let mut run = grid_run(1e4 * E_CHARGE, 2, 1e-8);
    run.run().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = output(dir.path(), OutputFormat::Bincode);
    let saved = run.save(&out).unwrap();

    let newer = OutputConfig { format_version: "test-2".into(), ..out };
    let err = SimulationRun::load(&newer, &saved.base, *run.tracker().settings()).unwrap_err();
    assert!(matches!(err, PersistError::VersionMismatch { .. }));
}

#[test]
fn default_names_and_position_export() {
    let mut run = grid_run(1e4 * E_CHARGE, 3, 1e-6);
    run.run().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = OutputConfig { base_filename: None, save_positions: true, ..output(dir.path(), OutputFormat::Bincode) };

    let saved = run.save(&out).unwrap();
    assert_eq!(saved.base, run.default_base_filename().unwrap());
    let expected = dir.path().join(format!("{}.electrons.bin", saved.base));
    assert_eq!(saved.records.electrons, expected);

    let csv_path = saved.positions.unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    assert_eq!(reader.headers().unwrap(), vec!["x_m", "y_m", "bx", "by"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 9);
    let last = run.swarm().num_steps() - 1;
    let x0: f64 = rows[0][0].parse().unwrap();
    assert_eq!(x0, run.swarm().position(last, 0).unwrap().x);
}

#[test]
fn bunch_wider_in_y_is_rejected_before_running() {
    let text = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
    let mut config = RunConfig::from_toml_str(&text).unwrap();
    config.bunch.sx = config.bunch.sy / 2.0;
    assert!(config.validate().is_err());
    assert!(matches!(
        SimulationRun::from_config(&config),
        Err(RunError::Config(ConfigError::Misoriented { .. }))
    ));
}

#[test]
fn configured_run_from_toml() {
    let config = RunConfig::from_toml_str(
        r#"
        [bunch]
        sx = 8e-6
        sy = 2e-6
        sz = 30e-6
        charge = 1.602176634e-15
        gamma = 39824.0

        [schedule]
        xi_start = -60e-6
        xi_end = 0.0
        dxi = 6e-6
        density = 1e18

        [swarm]
        kind = "random"
        num_parts = 40
        x_mag = 20e-6
        y_mag = 20e-6
        seed = 11

        [cavity]
        bins = 40
        "#,
    )
    .unwrap();
    let mut run = SimulationRun::from_config(&config).unwrap();
    assert_eq!(run.swarm().num_parts(), 40);
    assert_eq!(run.swarm().num_steps(), 11);
    assert_eq!(run.tracker().settings().bins(), 40);

    run.run().unwrap();
    assert_eq!(run.tracker().len(), 11);
    for snapshot in run.tracker().snapshots() {
        assert_eq!(snapshot.image().data().iter().sum::<f64>(), 40.0);
        assert_eq!(snapshot.closed_mask().nx(), 40);
        assert_eq!(snapshot.boundary_mask().nx(), 79);
    }
    assert_eq!(run.tracker().results_table().num_rows, 11);
}
