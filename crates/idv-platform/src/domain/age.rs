//! Age Calculator

use chrono::{Datelike, NaiveDate, Utc};
use idv_common::DateOfBirth;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgeError {
    #[error("date of birth is missing its {0}")]
    MissingField(&'static str),

    #[error("date of birth {year:04}-{month:02}-{day:02} is not a calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("date of birth {0} is after the reference date {1}")]
    BornAfterReference(NaiveDate, NaiveDate),
}

/// Calendar age at `reference`: the year difference, minus one when the
/// birthday has not yet come around this year.
pub fn compute_age(dob: &DateOfBirth, reference: NaiveDate) -> Result<u32, AgeError> {
    let year = dob.year.ok_or(AgeError::MissingField("year"))?;
    let month = dob.month.ok_or(AgeError::MissingField("month"))?;
    let day = dob.day.ok_or(AgeError::MissingField("day"))?;

    let birth = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(AgeError::InvalidDate { year, month, day })?;
    if birth > reference {
        return Err(AgeError::BornAfterReference(birth, reference));
    }

    let mut age = reference.year() - birth.year();
    if (reference.month(), reference.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    // birth <= reference keeps this non-negative
    Ok(age as u32)
}

/// Source of the reference date used for age computation
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Current UTC date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Always returns the same date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_around_birthday() {
        let dob = DateOfBirth::new(2000, 6, 15);
        assert_eq!(compute_age(&dob, date(2024, 6, 14)), Ok(23));
        assert_eq!(compute_age(&dob, date(2024, 6, 15)), Ok(24));
        assert_eq!(compute_age(&dob, date(2024, 6, 16)), Ok(24));
    }

    #[test]
    fn test_earlier_month_later_day() {
        // Reference month before birth month, day after birth day
        let dob = DateOfBirth::new(1990, 9, 3);
        assert_eq!(compute_age(&dob, date(2020, 8, 30)), Ok(29));
        assert_eq!(compute_age(&dob, date(2020, 12, 1)), Ok(30));
    }

    #[test]
    fn test_leap_day_birthday() {
        let dob = DateOfBirth::new(2004, 2, 29);
        assert_eq!(compute_age(&dob, date(2023, 2, 28)), Ok(18));
        assert_eq!(compute_age(&dob, date(2023, 3, 1)), Ok(19));
        assert_eq!(compute_age(&dob, date(2024, 2, 29)), Ok(20));
    }

    #[test]
    fn test_born_today() {
        let dob = DateOfBirth::new(2024, 6, 15);
        assert_eq!(compute_age(&dob, date(2024, 6, 15)), Ok(0));
    }

    #[test]
    fn test_missing_parts() {
        let reference = date(2024, 1, 1);
        let missing_year = DateOfBirth { year: None, month: Some(1), day: Some(1) };
        let missing_month = DateOfBirth { year: Some(2000), month: None, day: Some(1) };
        let missing_day = DateOfBirth { year: Some(2000), month: Some(1), day: None };

        assert_eq!(compute_age(&missing_year, reference), Err(AgeError::MissingField("year")));
        assert_eq!(compute_age(&missing_month, reference), Err(AgeError::MissingField("month")));
        assert_eq!(compute_age(&missing_day, reference), Err(AgeError::MissingField("day")));
        assert_eq!(
            compute_age(&DateOfBirth::default(), reference),
            Err(AgeError::MissingField("year"))
        );
    }

    #[test]
    fn test_impossible_dates() {
        let reference = date(2024, 1, 1);
        assert!(matches!(
            compute_age(&DateOfBirth::new(2000, 13, 1), reference),
            Err(AgeError::InvalidDate { .. })
        ));
        assert!(matches!(
            compute_age(&DateOfBirth::new(2001, 2, 29), reference),
            Err(AgeError::InvalidDate { .. })
        ));
        assert!(matches!(
            compute_age(&DateOfBirth::new(2030, 1, 1), reference),
            Err(AgeError::BornAfterReference(_, _))
        ));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(date(2024, 6, 15));
        assert_eq!(clock.today(), date(2024, 6, 15));
    }
}
