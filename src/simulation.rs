use crate::bunch::BunchDescriptor;
use crate::error::RunError;
use crate::ions::{CavitySettings, IonCavitySnapshot, IonCavityTracker};
use crate::kinematics;
use crate::schedule::SliceSchedule;
use crate::swarm::{ElectronSwarmState, SliceView};
use blowout_common::RunConfig;
use chrono::{DateTime, Local};
use log::{debug, error, info, trace};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Seconds between progress lines.
const PRINT_INTERVAL_SECS: f64 = 5.0;

/// Lifecycle of a [`SimulationRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Running,
    Completed,
    /// Stepping failed while advancing from `slice`; the swarm is left
    /// partially filled and nothing is timestamped.
    Aborted { slice: usize },
}

/// Drives the drive bunch, the electron swarm and the cavity tracker
/// through every slice of the schedule.
#[derive(Debug)]
pub struct SimulationRun {
    bunch: BunchDescriptor,
    swarm: ElectronSwarmState,
    tracker: IonCavityTracker,
    state: RunState,
    completed_at: Option<DateTime<Local>>,
}

impl SimulationRun {
    /// Creates a run over a freshly initialized swarm and an empty tracker.
    pub fn new(
        bunch: BunchDescriptor,
        swarm: ElectronSwarmState,
        tracker: IonCavityTracker,
    ) -> Result<Self, RunError> {
        if swarm.filled_rows() != 1 || swarm.is_completed() || !tracker.is_empty() {
            return Err(RunError::AlreadyStarted);
        }
        Ok(Self { bunch, swarm, tracker, state: RunState::Uninitialized, completed_at: None })
    }

    /// Builds every component from a validated configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self, RunError> {
        let bunch = BunchDescriptor::from_config(&config.bunch)?;
        let schedule = Arc::new(SliceSchedule::from_config(&config.schedule)?);
        let swarm = ElectronSwarmState::new(schedule, &config.swarm)?;
        let tracker = IonCavityTracker::new(CavitySettings::from_config(&config.cavity)?);
        Self::new(bunch, swarm, tracker)
    }

    /// Reassembles a completed run from persisted parts.
    ///
    /// The swarm and tracker must both carry the same completion timestamp
    /// and the tracker must hold one snapshot per slice.
    pub fn from_parts(
        bunch: BunchDescriptor,
        swarm: ElectronSwarmState,
        tracker: IonCavityTracker,
    ) -> Result<Self, RunError> {
        let completed_at = swarm.completed_at().ok_or(RunError::NotCompleted)?;
        if tracker.completed_at() != Some(completed_at) {
            return Err(RunError::Inconsistent(format!(
                "swarm completed at {completed_at}, cavity history at {:?}",
                tracker.completed_at()
            )));
        }
        if tracker.len() != swarm.num_steps() {
            return Err(RunError::Inconsistent(format!(
                "{} cavity snapshots for {} slices",
                tracker.len(),
                swarm.num_steps()
            )));
        }
        Ok(Self { bunch, swarm, tracker, state: RunState::Completed, completed_at: Some(completed_at) })
    }

    pub fn bunch(&self) -> &BunchDescriptor { &self.bunch }
    pub fn swarm(&self) -> &ElectronSwarmState { &self.swarm }
    pub fn tracker(&self) -> &IonCavityTracker { &self.tracker }
    pub fn schedule(&self) -> &SliceSchedule { self.swarm.schedule() }
    pub fn state(&self) -> RunState { self.state }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Timestamp shared by the swarm and cavity history once completed.
    pub fn completed_at(&self) -> Result<DateTime<Local>, RunError> {
        match (self.state, self.completed_at) {
            (RunState::Completed, Some(at)) => Ok(at),
            (RunState::Aborted { slice }, _) => Err(RunError::Aborted(slice)),
            _ => Err(RunError::NotCompleted),
        }
    }

    /// Steps through every slice, then timestamps the run.
    ///
    /// A stepping failure leaves the run [`RunState::Aborted`].
    pub fn run(&mut self) -> Result<(), RunError> {
        if self.state != RunState::Uninitialized {
            return Err(RunError::AlreadyStarted);
        }
        self.state = RunState::Running;

        let num_steps = self.swarm.num_steps();
        let schedule = self.swarm.schedule().clone();
        info!(
            "Starting run: {} particles over {} slices (dt = {:.3e} s, ωp = {:.3e} rad/s, c/ωp = {:.3e} m).",
            self.swarm.num_parts(),
            num_steps,
            schedule.dt(),
            schedule.plasma_frequency(),
            schedule.skin_depth()
        );
        debug!("Drive bunch: {:?}", self.bunch);

        let start_time = Instant::now();
        let mut previous_print_time = start_time;

        for i in 0..num_steps - 1 {
            let step_start_time = Instant::now();
            if let Err(e) = self.step(i) {
                error!("Stepping failed at slice {}: {}", i, e);
                self.state = RunState::Aborted { slice: i };
                return Err(e);
            }
            self.swarm.mark_filled(i + 2);
            let step_duration = step_start_time.elapsed();

            let current_time = Instant::now();
            let should_print = current_time.duration_since(previous_print_time).as_secs_f64()
                >= PRINT_INTERVAL_SECS;
            if should_print || i + 2 == num_steps {
                info!(
                    "Step [{}/{}] (xi = {:.3e} m) | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                    i + 1,
                    num_steps - 1,
                    schedule.slices()[i],
                    step_duration.as_secs_f64() * 1000.0,
                    start_time.elapsed().as_secs_f64()
                );
                previous_print_time = current_time;
            } else {
                trace!(
                    "Step [{}/{}] completed in {:.2} ms",
                    i + 1,
                    num_steps - 1,
                    step_duration.as_secs_f64() * 1000.0
                );
            }
        }

        // The last row has no step of its own, only the cavity extraction.
        let last = num_steps - 1;
        let extracted = match (self.swarm.x_row(last), self.swarm.y_row(last)) {
            (Some(x), Some(y)) => IonCavitySnapshot::extract(x, y, self.tracker.settings()),
            _ => Err(crate::error::CavityError::NoParticles),
        };
        match extracted {
            Ok(snapshot) => {
                self.tracker.push(snapshot);
            }
            Err(source) => {
                error!("Cavity extraction failed on the last slice: {}", source);
                self.state = RunState::Aborted { slice: last };
                return Err(RunError::Cavity { slice: last, source });
            }
        }

        let now = Local::now();
        self.swarm.mark_completed(now);
        self.tracker.mark_completed(now);
        self.completed_at = Some(now);
        self.state = RunState::Completed;

        info!(
            "Run finished in {:.3} seconds with {} cavity snapshots.",
            start_time.elapsed().as_secs_f64(),
            self.tracker.len()
        );
        Ok(())
    }

    /// Advances from slice `i` to `i + 1`.
    ///
    /// The cavity of slice `i` is extracted from the pre-update positions
    /// while the velocities are pushed in parallel.
    fn step(&mut self, i: usize) -> Result<(), RunError> {
        self.swarm.advance_positions(i);

        let schedule = self.swarm.schedule().clone();
        let xi = schedule.slices()[i];
        let dt = schedule.dt();
        let bunch = &self.bunch;
        let gamma_drive = bunch.gamma();
        let settings = *self.tracker.settings();

        let SliceView { x, y, bx, by, bx_next, by_next } = self.swarm.slice_view(i);

        let (extracted, pushed) = rayon::join(
            || IonCavitySnapshot::extract(x, y, &settings),
            || {
                bx_next
                    .par_iter_mut()
                    .zip(by_next.par_iter_mut())
                    .enumerate()
                    .try_for_each(|(j, (bx_out, by_out))| -> Result<(), RunError> {
                        let e = bunch
                            .e_fields(x[j], y[j], xi)
                            .map_err(|source| RunError::Field { slice: i, particle: j, source })?
                            * gamma_drive;
                        let acc = kinematics::dbeta_dt(x[j], y[j], bx[j], by[j], e.x, e.y)
                            .map_err(|source| RunError::Kinematics { slice: i, particle: j, source })?;
                        *bx_out = bx[j] + acc.x * dt;
                        *by_out = by[j] + acc.y * dt;
                        Ok(())
                    })
            },
        );
        pushed?;
        let snapshot = extracted.map_err(|source| RunError::Cavity { slice: i, source })?;
        self.tracker.push(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::E_CHARGE;
    use blowout_common::SwarmConfig;

    fn schedule() -> Arc<SliceSchedule> {
        let sz = 30e-6;
        Arc::new(SliceSchedule::new(-5.0 * sz, 0.0, sz / 5.0, 1e18).unwrap())
    }

    fn run_with(charge: f64, num_pts: u32, mag: f64) -> SimulationRun {
        let bunch = BunchDescriptor::new(8e-6, 2e-6, 30e-6, charge, 39824.0).unwrap();
        let swarm = ElectronSwarmState::new(
            schedule(),
            &SwarmConfig::Grid { num_pts, x_mag: mag, y_mag: mag },
        )
        .unwrap();
        let tracker = IonCavityTracker::new(CavitySettings::default().with_bins(20).unwrap());
        SimulationRun::new(bunch, swarm, tracker).unwrap()
    }

    #[test]
    fn lifecycle() {
        let mut run = run_with(1e4 * E_CHARGE, 2, 1e-8);
        assert_eq!(run.state(), RunState::Uninitialized);
        assert!(matches!(run.completed_at(), Err(RunError::NotCompleted)));

        run.run().unwrap();
        assert_eq!(run.state(), RunState::Completed);
        let at = run.completed_at().unwrap();
        assert_eq!(run.swarm().completed_at(), Some(at));
        assert_eq!(run.tracker().completed_at(), Some(at));
        assert_eq!(run.tracker().len(), run.swarm().num_steps());
        assert_eq!(run.swarm().filled_rows(), run.swarm().num_steps());

        assert!(matches!(run.run(), Err(RunError::AlreadyStarted)));
    }

    #[test]
    fn no_charge_no_motion() {
        let mut run = run_with(0.0, 1, 1e-6);
        run.run().unwrap();
        let swarm = run.swarm();
        for i in 0..swarm.num_steps() {
            assert_eq!(swarm.x_row(i), swarm.x_row(0));
            assert_eq!(swarm.y_row(i), swarm.y_row(0));
            assert_eq!(swarm.bx_row(i), Some(&[0.0][..]));
            assert_eq!(swarm.by_row(i), Some(&[0.0][..]));
        }
    }

    #[test]
    fn velocity_push_follows_field() {
        let mut run = run_with(1e4 * E_CHARGE, 2, 1e-8);
        run.run().unwrap();
        let swarm = run.swarm();
        let last = swarm.num_steps() - 1;
        for j in 0..swarm.num_parts() {
            let start = swarm.position(0, j).unwrap();
            let v = swarm.velocity(last, j).unwrap();
            // Expelled from the axis
            assert!(v.x * start.x > 0.0 && v.y * start.y > 0.0);
            // Position of slice 1 uses the slice 0 velocity, which is zero
            assert_eq!(swarm.position(1, j), Some(start));
        }
    }

    #[test]
    fn oversized_charge_aborts() {
        let mut run = run_with(2e10 * E_CHARGE, 2, 1e-8);
        let err = run.run().unwrap_err();
        assert!(matches!(err, RunError::Kinematics { .. }));
        assert!(matches!(run.state(), RunState::Aborted { .. }));
        assert!(matches!(run.completed_at(), Err(RunError::Aborted(_))));
        assert!(run.swarm().completed_at().is_none());
        assert!(run.swarm().filled_rows() < run.swarm().num_steps());
    }

    #[test]
    fn from_parts_requires_completion() {
        let run = run_with(0.0, 1, 1e-6);
        let SimulationRun { bunch, swarm, tracker, .. } = run;
        assert!(matches!(
            SimulationRun::from_parts(bunch, swarm, tracker),
            Err(RunError::NotCompleted)
        ));
    }
}
