use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{check_range, AuthoringError};
use crate::evaluation::Population;
use crate::schema::Schema;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Params {
    /// Schema document emitted fragments are validated against, if any.
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
    /// Where the campaign document is written.
    pub campaign_file: PathBuf,
    /// Where the demographics document is written.
    pub demographics_file: PathBuf,
    /// Calendar year of simulation day 0.
    pub base_year: f64,
    pub simulation_timestep_days: f64,
    /// Scale factor applied to exact-count targets, the simulated population relative
    /// to the real one.
    pub x_base_population: f64,
    /// The random seed for the reference evaluator.
    pub seed: u64,
}

fn validate_inputs(parameters: &Params) -> Result<(), AuthoringError> {
    if parameters.simulation_timestep_days.is_nan() || parameters.simulation_timestep_days <= 0.0 {
        return Err(AuthoringError::configuration(format!(
            "The simulation timestep must be positive, got {}.",
            parameters.simulation_timestep_days
        )));
    }
    if parameters.x_base_population.is_nan() || parameters.x_base_population <= 0.0 {
        return Err(AuthoringError::configuration(format!(
            "x_base_population must be positive, got {}.",
            parameters.x_base_population
        )));
    }
    check_range("base_year", parameters.base_year, 0.0, 10_000.0)?;
    if parameters.campaign_file == parameters.demographics_file {
        return Err(AuthoringError::configuration(format!(
            "The campaign and demographics documents must be written to different files, both are {}.",
            parameters.campaign_file.display()
        )));
    }
    Ok(())
}

impl Params {
    /// Reads and validates a JSON parameter file.
    ///
    /// # Errors
    /// If the file cannot be read or parsed, or a value is invalid.
    pub fn from_file(path: &Path) -> Result<Self, AuthoringError> {
        let reader = BufReader::new(File::open(path)?);
        let parameters: Params = serde_json::from_reader(reader)?;
        validate_inputs(&parameters)?;
        log::debug!("loaded parameters from {}", path.display());
        Ok(parameters)
    }

    /// Loads the schema named by `schema_file`, if one is set.
    ///
    /// # Errors
    /// If the schema file cannot be read or parsed.
    pub fn load_schema(&self) -> Result<Option<Schema>, AuthoringError> {
        self.schema_file
            .as_deref()
            .map(Schema::from_file)
            .transpose()
    }

    /// An empty population on this parameter set's clock.
    ///
    /// # Errors
    /// If the timestep is not positive.
    pub fn population(&self) -> Result<Population, AuthoringError> {
        Population::new(self.base_year, self.simulation_timestep_days)
    }
}
