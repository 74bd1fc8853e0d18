//! Record files of a completed run.
//!
//! A run is written as four records sharing a base name: the plasma
//! schedule (`plasmaparams`), the electron history (`electrons`), the drive
//! bunch (`drive`) and the cavity history (`ions`). Every record starts with
//! a [`RecordHeader`] carrying the format version and completion time.

use crate::bunch::BunchDescriptor;
use crate::error::PersistError;
use crate::ions::{CavitySettings, IonCavityTracker};
use crate::schedule::SliceSchedule;
use crate::simulation::SimulationRun;
use crate::swarm::ElectronSwarmState;
use blowout_common::{
    Array2Record, BunchRecord, CavityRecord, OutputConfig, OutputFormat, RecordHeader, ScheduleRecord,
    SwarmRecord,
};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Base name derived from a completion timestamp.
pub fn timestamp_base_filename(completed_at: DateTime<Local>) -> String {
    completed_at.format("%Y.%m.%d.%H%M.%S").to_string()
}

/// Locations of the four records of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPaths {
    pub plasma: PathBuf,
    pub electrons: PathBuf,
    pub drive: PathBuf,
    pub ions: PathBuf,
}

impl RecordPaths {
    pub fn new(directory: &Path, base: &str, format: OutputFormat) -> Self {
        let path = |suffix: &str| directory.join(format!("{base}.{suffix}.{}", format.extension()));
        Self {
            plasma: path("plasmaparams"),
            electrons: path("electrons"),
            drive: path("drive"),
            ions: path("ions"),
        }
    }
}

/// What [`SimulationRun::save`] wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRun {
    pub base: String,
    pub records: RecordPaths,
    pub positions: Option<PathBuf>,
}

impl SimulationRun {
    /// Default base name of this run's records. Fails before completion.
    pub fn default_base_filename(&self) -> Result<String, PersistError> {
        Ok(timestamp_base_filename(self.completed_at()?))
    }

    /// Writes the four records, plus the final positions as CSV when
    /// `output.save_positions` is set. Refuses runs that did not complete.
    pub fn save(&self, output: &OutputConfig) -> Result<SavedRun, PersistError> {
        let completed_at = self.completed_at()?;
        let base = match &output.base_filename {
            Some(base) => base.clone(),
            None => timestamp_base_filename(completed_at),
        };
        std::fs::create_dir_all(&output.directory)
            .map_err(|source| io_error(&output.directory, source))?;

        let records = RecordPaths::new(&output.directory, &base, output.format);
        let header = RecordHeader { version: output.format_version.clone(), completed_at };

        write_record(&records.drive, output.format, &bunch_record(self.bunch(), header.clone()))?;
        write_record(&records.plasma, output.format, &schedule_record(self.schedule(), header.clone()))?;
        write_record(&records.electrons, output.format, &swarm_record(self.swarm(), header.clone()))?;
        write_record(&records.ions, output.format, &self.tracker().to_record(header))?;
        info!("Run records saved as '{}' in {}", base, output.directory.display());

        let positions = if output.save_positions {
            let path = output.directory.join(format!("{base}.final_positions.csv"));
            self.save_final_positions(&path)?;
            Some(path)
        } else {
            None
        };

        Ok(SavedRun { base, records, positions })
    }

    /// Writes `x_m, y_m, bx, by` of every particle at the last slice.
    pub fn save_final_positions(&self, path: &Path) -> Result<(), PersistError> {
        let swarm = self.swarm();
        let last = swarm.num_steps() - 1;
        let codec = |e: csv::Error| PersistError::Codec { path: display(path), reason: e.to_string() };

        let mut writer = csv::Writer::from_path(path).map_err(codec)?;
        writer.write_record(["x_m", "y_m", "bx", "by"]).map_err(codec)?;
        for j in 0..swarm.num_parts() {
            let (Some(p), Some(v)) = (swarm.position(last, j), swarm.velocity(last, j)) else {
                continue;
            };
            writer
                .write_record(&[
                    format!("{:e}", p.x),
                    format!("{:e}", p.y),
                    format!("{:e}", v.x),
                    format!("{:e}", v.y),
                ])
                .map_err(codec)?;
        }
        writer.flush().map_err(|source| io_error(path, source))?;
        info!("Final positions saved to {}", path.display());
        Ok(())
    }

    /// Reads back the run stored under `base` in `output.directory`.
    ///
    /// Every record must carry `output.format_version` and the same
    /// completion time.
    pub fn load(output: &OutputConfig, base: &str, settings: CavitySettings) -> Result<Self, PersistError> {
        let paths = RecordPaths::new(&output.directory, base, output.format);
        let expected = output.format_version.as_str();

        let drive: BunchRecord = read_record(&paths.drive, output.format)?;
        check_header(&paths.drive, &drive.header, expected)?;
        let plasma: ScheduleRecord = read_record(&paths.plasma, output.format)?;
        check_header(&paths.plasma, &plasma.header, expected)?;
        let electrons: SwarmRecord = read_record(&paths.electrons, output.format)?;
        check_header(&paths.electrons, &electrons.header, expected)?;
        let ions: CavityRecord = read_record(&paths.ions, output.format)?;
        check_header(&paths.ions, &ions.header, expected)?;

        let completed_at = drive.header.completed_at;
        for (path, header) in [
            (&paths.plasma, &plasma.header),
            (&paths.electrons, &electrons.header),
            (&paths.ions, &ions.header),
        ] {
            if header.completed_at != completed_at {
                return Err(malformed(path, "completion time differs from the drive record"));
            }
        }

        let bunch = BunchDescriptor::new(drive.sx, drive.sy, drive.sz, drive.charge, drive.gamma)?;
        let schedule = Arc::new(SliceSchedule::new(plasma.xi_start, plasma.xi_end, plasma.dxi, plasma.density)?);

        let shape = (schedule.num_steps(), electrons.num_parts);
        let mut arrays = Vec::with_capacity(4);
        for array in [electrons.x, electrons.y, electrons.bx, electrons.by] {
            if (array.rows, array.cols) != shape || !array.is_consistent() {
                return Err(malformed(
                    &paths.electrons,
                    &format!("array of {}x{} does not match {}x{}", array.rows, array.cols, shape.0, shape.1),
                ));
            }
            arrays.push(array.data);
        }
        let [x, y, bx, by]: [Vec<f64>; 4] = arrays
            .try_into()
            .map_err(|_| malformed(&paths.electrons, "expected four arrays"))?;
        let swarm = ElectronSwarmState::from_parts(schedule, electrons.num_parts, x, y, bx, by, completed_at)?;

        let tracker = IonCavityTracker::from_record(&ions, settings)?;
        let run = SimulationRun::from_parts(bunch, swarm, tracker)
            .map_err(|e| malformed(&paths.ions, &e.to_string()))?;
        info!("Loaded run '{}' completed at {}", base, completed_at);
        Ok(run)
    }
}

fn bunch_record(bunch: &BunchDescriptor, header: RecordHeader) -> BunchRecord {
    BunchRecord {
        header,
        sx: bunch.sx(),
        sy: bunch.sy(),
        sz: bunch.sz(),
        charge: bunch.charge(),
        gamma: bunch.gamma(),
    }
}

fn schedule_record(schedule: &SliceSchedule, header: RecordHeader) -> ScheduleRecord {
    ScheduleRecord {
        header,
        xi_start: schedule.xi_start(),
        xi_end: schedule.xi_end(),
        dxi: schedule.dxi(),
        density: schedule.density(),
    }
}

fn swarm_record(swarm: &ElectronSwarmState, header: RecordHeader) -> SwarmRecord {
    let array = |data: &[f64]| Array2Record {
        rows: swarm.num_steps(),
        cols: swarm.num_parts(),
        data: data.to_vec(),
    };
    SwarmRecord {
        header,
        num_parts: swarm.num_parts(),
        x: array(swarm.x()),
        y: array(swarm.y()),
        bx: array(swarm.bx()),
        by: array(swarm.by()),
    }
}

fn check_header(path: &Path, header: &RecordHeader, expected: &str) -> Result<(), PersistError> {
    if header.version != expected {
        warn!("Record {} was written by version {}", path.display(), header.version);
        return Err(PersistError::VersionMismatch {
            path: display(path),
            found: header.version.clone(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}

fn write_record<T: Serialize>(path: &Path, format: OutputFormat, value: &T) -> Result<(), PersistError> {
    let file = File::create(path).map_err(|source| io_error(path, source))?;
    let mut writer = BufWriter::new(file);
    let encoded = match format {
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, value).map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::to_writer(&mut writer, value).map_err(|e| e.to_string()),
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, value).map_err(|e| e.to_string()),
    };
    encoded.map_err(|reason| PersistError::Codec { path: display(path), reason })?;
    writer.flush().map_err(|source| io_error(path, source))
}

fn read_record<T: DeserializeOwned>(path: &Path, format: OutputFormat) -> Result<T, PersistError> {
    let file = File::open(path).map_err(|source| io_error(path, source))?;
    let reader = BufReader::new(file);
    let decoded = match format {
        OutputFormat::Bincode => bincode::deserialize_from(reader).map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::from_reader(reader).map_err(|e| e.to_string()),
        OutputFormat::MessagePack => rmp_serde::from_read(reader).map_err(|e| e.to_string()),
    };
    decoded.map_err(|reason| PersistError::Codec { path: display(path), reason })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn io_error(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io { path: display(path), source }
}

fn malformed(path: &Path, reason: &str) -> PersistError {
    PersistError::Malformed { path: display(path), reason: reason.to_string() }
}
