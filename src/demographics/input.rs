use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::AuthoringError;

/// A row of the population file `node_id,name,population[,latitude,longitude]`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub node_id: u32,
    pub name: String,
    pub population: u32,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A row of a fertility file: births per 1000 women of `age` in `year`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FertilityRecord {
    pub year: f64,
    pub age: f64,
    pub rate: f64,
}

/// A row of a mortality file: annual probability of death for ages in
/// `[age_min, age_max)` in `year`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MortalityRecord {
    pub year: f64,
    pub age_min: f64,
    pub age_max: f64,
    pub rate: f64,
}

/// Reads every row of a headed CSV file into `T`.
pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AuthoringError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut raw_record = csv::ByteRecord::new();
    let headers = reader.byte_headers()?.clone();

    let mut records = Vec::new();
    while reader.read_byte_record(&mut raw_record)? {
        records.push(raw_record.deserialize(Some(&headers))?);
    }
    log::debug!("read {} record(s) from {}", records.len(), path.display());
    Ok(records)
}
