//! Age-by-year rate tables for fertility and natural mortality.

use std::path::Path;

use serde_json::{json, Value};

use super::input::{read_records, FertilityRecord, MortalityRecord};
use crate::error::{check_non_negative, check_range, AuthoringError, Warning};
use crate::evaluation::DAYS_PER_YEAR;
use crate::utils::{get_lower_index, least_squares_slope, linear_interpolation};

/// A rate defined on an age × year grid, read with bilinear interpolation and
/// held constant beyond the edges of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeYearTable {
    ages: Vec<f64>,
    years: Vec<f64>,
    /// Indexed `[age][year]`.
    values: Vec<Vec<f64>>,
    result_scale_factor: f64,
    result_units: String,
}

fn sorted_unique(mut xs: Vec<f64>) -> Vec<f64> {
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs
}

fn position(xs: &[f64], x: f64) -> usize {
    xs.binary_search_by(|v| v.total_cmp(&x)).unwrap_or_default()
}

/// Lays `(age, year, value)` cells out on a grid.
fn grid(cells: &[(f64, f64, f64)], what: &str) -> Result<(Vec<f64>, Vec<f64>, Vec<Vec<f64>>), AuthoringError> {
    if cells.is_empty() {
        return Err(AuthoringError::configuration(format!("the {what} table has no rows")));
    }
    let ages = sorted_unique(cells.iter().map(|c| c.0).collect());
    let years = sorted_unique(cells.iter().map(|c| c.1).collect());
    let mut values: Vec<Vec<Option<f64>>> = vec![vec![None; years.len()]; ages.len()];
    for &(age, year, value) in cells {
        let slot = &mut values[position(&ages, age)][position(&years, year)];
        if slot.is_some() {
            return Err(AuthoringError::configuration(format!(
                "the {what} table has more than one rate for age {age} in {year}"
            )));
        }
        *slot = Some(value);
    }
    let mut complete = Vec::with_capacity(ages.len());
    for (i, row) in values.into_iter().enumerate() {
        let mut filled = Vec::with_capacity(years.len());
        for (j, value) in row.into_iter().enumerate() {
            filled.push(value.ok_or_else(|| {
                AuthoringError::configuration(format!(
                    "the {what} table has no rate for age {} in {}",
                    ages[i], years[j]
                ))
            })?);
        }
        complete.push(filled);
    }
    Ok((ages, years, complete))
}

/// The index below `x` on `xs` and the interpolation weight towards the next one.
fn bracket(xs: &[f64], x: f64) -> (usize, f64) {
    if xs.len() < 2 || x <= xs[0] {
        return (0, 0.0);
    }
    let (_, i) = get_lower_index(xs, x);
    if x >= xs[xs.len() - 1] {
        return (i, 1.0);
    }
    (i, linear_interpolation(xs[i], xs[i + 1], 0.0, 1.0, x))
}

impl AgeYearTable {
    /// Reads a fertility file with columns `year,age,rate`, rates in births per
    /// 1000 women per year.
    ///
    /// # Errors
    /// - If the file cannot be read or a row cannot be parsed
    /// - If a rate is negative
    /// - If the rows do not form a complete age × year grid
    pub fn fertility_from_csv(path: &Path) -> Result<Self, AuthoringError> {
        let records: Vec<FertilityRecord> = read_records(path)?;
        Self::fertility_from_records(&records)
    }

    /// # Errors
    /// See [`AgeYearTable::fertility_from_csv`].
    pub fn fertility_from_records(records: &[FertilityRecord]) -> Result<Self, AuthoringError> {
        let mut cells = Vec::with_capacity(records.len());
        for record in records {
            check_non_negative("fertility rate", record.rate)?;
            cells.push((record.age, record.year, record.rate));
        }
        let (ages, years, values) = grid(&cells, "fertility")?;
        Ok(AgeYearTable {
            ages,
            years,
            values,
            result_scale_factor: 1.0 / 1000.0 / DAYS_PER_YEAR,
            result_units: "births per 1000 individuals per year".to_string(),
        })
    }

    /// Reads a mortality file with columns `year,age_min,age_max,rate` and, when
    /// `options` asks for a prediction horizon, extends it with a Lee-Carter
    /// projection. Predicted rates above 1 are capped and reported as warnings.
    ///
    /// # Errors
    /// - If the file cannot be read or a row cannot be parsed
    /// - If a rate is outside (0, 1] or an age band is empty
    /// - If the rows do not form a complete age × year grid
    /// - If fewer than two years fall in the fit window
    pub fn mortality_from_csv(
        path: &Path,
        options: &MortalityOptions,
    ) -> Result<(Self, Vec<Warning>), AuthoringError> {
        let records: Vec<MortalityRecord> = read_records(path)?;
        Self::mortality_from_records(&records, options)
    }

    /// # Errors
    /// See [`AgeYearTable::mortality_from_csv`].
    pub fn mortality_from_records(
        records: &[MortalityRecord],
        options: &MortalityOptions,
    ) -> Result<(Self, Vec<Warning>), AuthoringError> {
        let mut cells = Vec::with_capacity(records.len());
        for record in records {
            check_range("mortality rate", record.rate, f64::MIN_POSITIVE, 1.0)?;
            if record.age_max <= record.age_min {
                return Err(AuthoringError::configuration(format!(
                    "mortality age band [{}, {}) is empty",
                    record.age_min, record.age_max
                )));
            }
            let age = match options.age_reference {
                AgeReference::Midpoint => f64::midpoint(record.age_min, record.age_max),
                AgeReference::LowerBound => record.age_min,
            };
            cells.push((age, record.year, record.rate));
        }
        let (ages, mut years, mut values) = grid(&cells, "mortality")?;
        let mut warnings = Vec::new();

        let last_year = years[years.len() - 1];
        if let Some(horizon) = options.prediction_horizon.filter(|&h| h > last_year) {
            let (from, to) = options.fit_window.unwrap_or((years[0], last_year));
            let fit: Vec<usize> = (0..years.len())
                .filter(|&j| years[j] >= from && years[j] <= to)
                .collect();
            if fit.len() < 2 {
                return Err(AuthoringError::configuration(format!(
                    "the mortality fit window [{from}, {to}] must contain at least two years, it contains {}",
                    fit.len()
                )));
            }
            let log_rates: Vec<Vec<f64>> = values
                .iter()
                .map(|row| fit.iter().map(|&j| row[j].ln()).collect())
                .collect();
            let model = LeeCarter::fit(&log_rates)?;
            #[allow(clippy::cast_precision_loss)]
            let step = (years[fit[fit.len() - 1]] - years[fit[0]]) / (fit.len() - 1) as f64;
            let fit_end = years[fit[fit.len() - 1]];

            let mut year = last_year + step;
            while year <= horizon + 1e-9 {
                let steps_ahead = (year - fit_end) / step;
                for (x, row) in values.iter_mut().enumerate() {
                    let mut rate = model.predict(x, steps_ahead);
                    if rate > 1.0 {
                        warnings.push(Warning::new(
                            "Mortality",
                            format!("predicted rate {rate} for age {} in {year} was capped at 1", ages[x]),
                        ));
                        rate = 1.0;
                    }
                    row.push(rate);
                }
                years.push(year);
                year += step;
            }
            log::debug!(
                "extended mortality table from {last_year} to {} with drift {}",
                years[years.len() - 1],
                model.drift
            );
        }

        Ok((
            AgeYearTable {
                ages,
                years,
                values,
                result_scale_factor: options.result_scale_factor,
                result_units: "annual death rate for an individual".to_string(),
            },
            warnings,
        ))
    }

    #[must_use]
    pub fn ages(&self) -> &[f64] {
        &self.ages
    }

    #[must_use]
    pub fn years(&self) -> &[f64] {
        &self.years
    }

    /// The tabulated rate, before the result scale factor is applied.
    #[must_use]
    pub fn evaluate(&self, age: f64, year: f64) -> f64 {
        let (i, u) = bracket(&self.ages, age);
        let (j, v) = bracket(&self.years, year);
        let i1 = usize::min(i + 1, self.ages.len() - 1);
        let j1 = usize::min(j + 1, self.years.len() - 1);
        let low = linear_interpolation(0.0, 1.0, self.values[i][j], self.values[i][j1], v);
        let high = linear_interpolation(0.0, 1.0, self.values[i1][j], self.values[i1][j1], v);
        linear_interpolation(0.0, 1.0, low, high, u)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "NumDistributionAxes": 2,
            "AxisNames": ["age", "year"],
            "AxisUnits": ["years", "simulation_year"],
            "AxisScaleFactors": [DAYS_PER_YEAR, 1],
            "NumPopulationGroups": [self.ages.len(), self.years.len()],
            "PopulationGroups": [self.ages, self.years],
            "ResultScaleFactor": self.result_scale_factor,
            "ResultUnits": self.result_units,
            "ResultValues": self.values,
        })
    }
}

/// Which point of an age band labels it on the age axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgeReference {
    #[default]
    Midpoint,
    LowerBound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortalityOptions {
    /// Inclusive range of data years the projection is fitted on; all years when unset.
    pub fit_window: Option<(f64, f64)>,
    pub age_reference: AgeReference,
    /// Last year to project to; no projection when unset.
    pub prediction_horizon: Option<f64>,
    pub result_scale_factor: f64,
}

impl Default for MortalityOptions {
    fn default() -> Self {
        MortalityOptions {
            fit_window: None,
            age_reference: AgeReference::Midpoint,
            prediction_horizon: None,
            result_scale_factor: 1.0 / DAYS_PER_YEAR,
        }
    }
}

/// `ln m(x, t) = a_x + b_x k_t` with a random-walk-with-drift period index.
#[derive(Debug, Clone, PartialEq)]
pub struct LeeCarter {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub k: Vec<f64>,
    /// Change in `k` per fitted period.
    pub drift: f64,
}

impl LeeCarter {
    /// Fits log rates indexed `[age][period]`.
    ///
    /// # Errors
    /// If there are no ages, fewer than two periods or rows of unequal length.
    pub fn fit(log_rates: &[Vec<f64>]) -> Result<Self, AuthoringError> {
        let periods = log_rates.first().map_or(0, Vec::len);
        if periods < 2 {
            return Err(AuthoringError::configuration(format!(
                "Lee-Carter needs at least two periods of rates, got {periods}"
            )));
        }
        if let Some(row) = log_rates.iter().find(|row| row.len() != periods) {
            return Err(AuthoringError::configuration(format!(
                "Lee-Carter rates must have {periods} periods at every age, found a row with {}",
                row.len()
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let a: Vec<f64> = log_rates
            .iter()
            .map(|row| row.iter().sum::<f64>() / periods as f64)
            .collect();
        let k: Vec<f64> = (0..periods)
            .map(|t| log_rates.iter().zip(&a).map(|(row, a_x)| row[t] - a_x).sum())
            .collect();
        let b = log_rates
            .iter()
            .zip(&a)
            .map(|(row, a_x)| {
                let centered: Vec<f64> = row.iter().map(|m| m - a_x).collect();
                least_squares_slope(&k, &centered)
            })
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let drift = (k[periods - 1] - k[0]) / (periods - 1) as f64;
        Ok(LeeCarter { a, b, k, drift })
    }

    /// The rate for age index `x`, `periods_ahead` periods after the last fitted one.
    #[must_use]
    pub fn predict(&self, x: usize, periods_ahead: f64) -> f64 {
        let k = self.k[self.k.len() - 1] + self.drift * periods_ahead;
        (self.a[x] + self.b[x] * k).exp()
    }
}
