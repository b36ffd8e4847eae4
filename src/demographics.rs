//! Participant demographics and the anonymised birthday.
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::layout::subject_label;

/// Sex as coded in the demographics sheet (MNE `subject_info` convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Unknown,
    Male,
    Female,
}

impl Sex {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Sex::Unknown),
            1 => Ok(Sex::Male),
            2 => Ok(Sex::Female),
            other => bail!("invalid sex code {other} (expected 0, 1 or 2)"),
        }
    }

    /// Value of the `sex` column in `participants.tsv`.
    pub fn bids(self) -> &'static str {
        match self {
            Sex::Unknown => "n/a",
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demographics {
    pub age: u32,
    pub sex: Sex,
}

#[derive(Debug, Deserialize)]
struct Row {
    subject_id: String,
    age: u32,
    sex: i32,
}

/// Demographics row of `subject` from a tab-separated sheet with columns
/// `subject_id` (`sub-001`), `age`, `sex`.
pub fn read_demographics(path: &Path, subject: u32) -> Result<Demographics> {
    let label = subject_label(subject);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    for row in rdr.deserialize::<Row>() {
        let row = row.with_context(|| format!("parse {}", path.display()))?;
        if row.subject_id == label {
            return Ok(Demographics { age: row.age, sex: Sex::from_code(row.sex)? });
        }
    }
    Err(anyhow!("{label} not found in {}", path.display()))
}

/// Birthday `age` years before the measurement, on the same day of year.
/// 29 February maps to 28 February when the birth year is not a leap year.
pub fn approx_birthday(meas_date: NaiveDate, age: u32) -> Result<NaiveDate> {
    let year = meas_date.year() - age as i32;
    NaiveDate::from_ymd_opt(year, meas_date.month(), meas_date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, meas_date.month(), meas_date.day() - 1))
        .ok_or_else(|| anyhow!("cannot derive a birthday from {meas_date} and age {age}"))
}
