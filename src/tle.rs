//! Two-Line Element (TLE) set parsing.
//!
//! Reads the NORAD fixed-column format, with or without a leading name
//! line, and turns each set into [`MeanElements`] for the catalog sampler.
//!
//! ```
//! use cassia::tle::Tle;
//!
//! let line1 = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9009";
//! let line2 = "2 25544  51.6400 208.5000 0007417  68.0000 292.1000 15.49560000400004";
//!
//! let tle = Tle::parse(line1, line2).unwrap();
//! assert_eq!(tle.norad_id, 25544);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

use crate::constants::*;
use crate::elements::MeanElements;

const LINE_LEN: usize = 69;

/// TLE parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TleError {
    #[error("Line {line} must start with '{line}', got '{found}'")]
    WrongLineNumber { line: u8, found: char },

    #[error("Line {line} must be 69 ASCII characters, got {len}")]
    BadLength { line: u8, len: usize },

    #[error("NORAD IDs don't match between lines: {0} vs {1}")]
    NoradIdMismatch(u32, u32),

    #[error("Checksum failed on line {line}: expected {expected}, computed {computed}")]
    ChecksumFailed { line: u8, expected: u8, computed: u8 },

    #[error("Failed to parse field '{field}' from '{text}'")]
    Field { field: &'static str, text: String },

    #[error("No TLEs found in input")]
    Empty,
}

/// A parsed Two-Line Element set (the fields the screening pipeline uses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tle {
    /// Satellite name (from line 0, if present).
    pub name: Option<String>,
    /// NORAD catalog number.
    pub norad_id: u32,
    /// International designator.
    pub intl_designator: String,
    /// Epoch year (four digits).
    pub epoch_year: u16,
    /// Epoch day of year (fractional, 1-based).
    pub epoch_day: f64,
    /// B* drag term (1/Earth radii).
    pub bstar: f64,
    /// Inclination (degrees).
    pub inclination_deg: f64,
    /// Right ascension of ascending node (degrees).
    pub raan_deg: f64,
    /// Eccentricity.
    pub eccentricity: f64,
    /// Argument of perigee (degrees).
    pub arg_perigee_deg: f64,
    /// Mean anomaly (degrees).
    pub mean_anomaly_deg: f64,
    /// Mean motion (revolutions per day).
    pub mean_motion_rev_day: f64,
}

/// Fixed-column view over one validated TLE line.
struct Columns<'a>(&'a str);

impl<'a> Columns<'a> {
    fn text(&self, cols: Range<usize>) -> &'a str {
        self.0[cols].trim()
    }

    fn float(&self, field: &'static str, cols: Range<usize>) -> Result<f64, TleError> {
        let text = self.text(cols);
        text.parse().map_err(|_| TleError::Field { field, text: text.to_string() })
    }

    fn int(&self, field: &'static str, cols: Range<usize>) -> Result<u32, TleError> {
        let text = self.text(cols);
        text.parse().map_err(|_| TleError::Field { field, text: text.to_string() })
    }
}

impl Tle {
    /// Parse a TLE from two lines (without satellite name).
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TleError> {
        Self::parse_named(None, line1, line2)
    }

    /// Parse a TLE from three lines (satellite name on line 0).
    pub fn parse_3line(line0: &str, line1: &str, line2: &str) -> Result<Self, TleError> {
        Self::parse_named(Some(line0.trim().to_string()), line1, line2)
    }

    fn parse_named(name: Option<String>, line1: &str, line2: &str) -> Result<Self, TleError> {
        let l1 = Columns(checked_line(line1, 1)?);
        let l2 = Columns(checked_line(line2, 2)?);

        let norad_1 = l1.int("norad_id (line 1)", 2..7)?;
        let norad_2 = l2.int("norad_id (line 2)", 2..7)?;
        if norad_1 != norad_2 {
            return Err(TleError::NoradIdMismatch(norad_1, norad_2));
        }

        let year_2d = l1.int("epoch_year", 18..20)? as u16;
        // NORAD convention: 57-99 → 1900s, 00-56 → 2000s
        let epoch_year = if year_2d >= 57 { 1900 + year_2d } else { 2000 + year_2d };

        // Eccentricity carries an implied leading decimal point
        let ecc_digits = l2.text(26..33);
        let eccentricity = format!("0.{ecc_digits}")
            .parse()
            .map_err(|_| TleError::Field { field: "eccentricity", text: ecc_digits.to_string() })?;

        Ok(Tle {
            name,
            norad_id: norad_1,
            intl_designator: l1.text(9..17).to_string(),
            epoch_year,
            epoch_day: l1.float("epoch_day", 20..32)?,
            bstar: parse_implied_decimal(l1.text(53..61))?,
            inclination_deg: l2.float("inclination", 8..16)?,
            raan_deg: l2.float("raan", 17..25)?,
            eccentricity,
            arg_perigee_deg: l2.float("arg_perigee", 34..42)?,
            mean_anomaly_deg: l2.float("mean_anomaly", 43..51)?,
            mean_motion_rev_day: l2.float("mean_motion", 52..63)?,
        })
    }

    /// Parse a block of text containing any mix of 2-line and 3-line sets.
    ///
    /// Lines that belong to neither shape are skipped.
    pub fn parse_batch(input: &str) -> Result<Vec<Self>, TleError> {
        let lines: Vec<&str> = input
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();

        let mut tles = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let starts = |k: usize, c: char| lines.get(i + k).is_some_and(|l| l.starts_with(c));
            if starts(0, '1') && starts(1, '2') {
                tles.push(Tle::parse(lines[i], lines[i + 1])?);
                i += 2;
            } else if starts(1, '1') && starts(2, '2') {
                tles.push(Tle::parse_3line(lines[i], lines[i + 1], lines[i + 2])?);
                i += 3;
            } else {
                i += 1;
            }
        }

        if tles.is_empty() {
            return Err(TleError::Empty);
        }
        Ok(tles)
    }

    /// Semi-major axis from mean motion via Kepler's third law (km).
    pub fn semi_major_axis(&self) -> f64 {
        let n_rad_s = self.mean_motion_rev_day * TAU / SOLAR_DAY;
        (MU_EARTH / n_rad_s.powi(2)).cbrt()
    }

    /// Altitude above the equatorial radius, assuming a circular orbit (km).
    pub fn altitude(&self) -> f64 {
        self.semi_major_axis() - R_EARTH
    }

    /// TLE epoch as seconds since J2000 (2000-01-01 12:00).
    pub fn epoch_j2000_seconds(&self) -> f64 {
        let days = days_from_j2000_to_jan1(self.epoch_year as i32) as f64 + self.epoch_day - 1.0;
        // J2000 is at noon; day-of-year counts from midnight
        (days - 0.5) * SOLAR_DAY
    }

    /// Mean elements at the TLE epoch.
    pub fn to_mean_elements(&self) -> MeanElements {
        MeanElements::from_degrees(
            self.semi_major_axis(),
            self.eccentricity,
            self.inclination_deg,
            self.raan_deg,
            self.arg_perigee_deg,
            self.mean_anomaly_deg,
            self.epoch_j2000_seconds(),
        )
    }
}

impl std::fmt::Display for Tle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (NORAD {}) {:.1} km, {:.1}° inc",
            self.name.as_deref().unwrap_or("UNKNOWN"),
            self.norad_id,
            self.altitude(),
            self.inclination_deg,
        )
    }
}

/// Validate length, line number and checksum; return the 69 data columns.
fn checked_line(line: &str, number: u8) -> Result<&str, TleError> {
    let line = line.trim_end();
    if !line.is_ascii() || line.len() < LINE_LEN {
        return Err(TleError::BadLength { line: number, len: line.chars().count() });
    }
    let line = &line[..LINE_LEN];

    let first = line.as_bytes()[0] as char;
    if first != char::from(b'0' + number) {
        return Err(TleError::WrongLineNumber { line: number, found: first });
    }

    let expected = match line.as_bytes()[LINE_LEN - 1] {
        b @ b'0'..=b'9' => b - b'0',
        _ => 0,
    };
    let computed = checksum(&line[..LINE_LEN - 1]);
    if expected != computed {
        return Err(TleError::ChecksumFailed { line: number, expected, computed });
    }
    Ok(line)
}

/// Mod-10 sum of digits, with '-' counting as 1.
fn checksum(data: &str) -> u8 {
    let sum: u32 = data
        .bytes()
        .map(|b| match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Parse the "implied decimal" exponent notation: "10270-3" → 0.10270e-3.
fn parse_implied_decimal(s: &str) -> Result<f64, TleError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    let bad = || TleError::Field { field: "implied_decimal", text: s.to_string() };

    let (sign, body) = match s.as_bytes()[0] {
        b'-' => ("-", &s[1..]),
        b'+' => ("", &s[1..]),
        _ => ("", s),
    };
    let (mantissa, exponent) = match body.rfind(['+', '-']) {
        Some(pos) if pos > 0 => (&body[..pos], &body[pos..]),
        _ => (body, "+0"),
    };
    if mantissa.is_empty() || !mantissa.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    format!("{sign}0.{mantissa}e{exponent}").parse().map_err(|_| bad())
}

/// Whole days from 2000-01-01 to January 1 of `year` (Gregorian).
fn days_from_j2000_to_jan1(year: i32) -> i64 {
    let is_leap = |y: i32| (y % 4 == 0 && y % 100 != 0) || y % 400 == 0;
    let days_in = |y: i32| if is_leap(y) { 366 } else { 365 };
    if year >= 2000 {
        (2000..year).map(days_in).sum()
    } else {
        -(year..2000).map(days_in).sum::<i64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ISS_LINE1: &str =
        "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9009";
    const ISS_LINE2: &str =
        "2 25544  51.6400 208.5000 0007417  68.0000 292.1000 15.49560000400004";
    const HST_LINE1: &str =
        "1 20580U 90037B   24001.50000000  .00000764  00000-0  34340-4 0  9991";
    const HST_LINE2: &str =
        "2 20580  28.4700 100.2000 0002500 300.0000  60.0000 15.09000000400006";

    #[test]
    fn test_parse_iss() {
        let tle = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(tle.norad_id, 25544);
        assert_eq!(tle.intl_designator, "98067A");
        assert_eq!(tle.epoch_year, 2024);
        assert_relative_eq!(tle.epoch_day, 1.5, epsilon = 1e-8);
        assert_relative_eq!(tle.inclination_deg, 51.64, epsilon = 1e-4);
        assert_relative_eq!(tle.raan_deg, 208.5, epsilon = 1e-4);
        assert_relative_eq!(tle.eccentricity, 0.0007417, epsilon = 1e-10);
        assert_relative_eq!(tle.mean_anomaly_deg, 292.1, epsilon = 1e-4);
        assert_relative_eq!(tle.mean_motion_rev_day, 15.4956, epsilon = 1e-6);
        assert_relative_eq!(tle.bstar, 0.10270e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_iss_altitude() {
        let alt = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap().altitude();
        assert!(alt > 400.0 && alt < 430.0, "ISS altitude={alt} km");
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let corrupted = ISS_LINE1.replace("9009", "9003");
        match Tle::parse(&corrupted, ISS_LINE2) {
            Err(TleError::ChecksumFailed { line: 1, expected: 3, computed: 9 }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_swapped_lines_rejected() {
        let err = Tle::parse(ISS_LINE2, ISS_LINE1).unwrap_err();
        assert_eq!(err, TleError::WrongLineNumber { line: 1, found: '2' });
    }

    #[test]
    fn test_short_line_rejected() {
        let err = Tle::parse(&ISS_LINE1[..40], ISS_LINE2).unwrap_err();
        assert_eq!(err, TleError::BadLength { line: 1, len: 40 });
    }

    #[test]
    fn test_mismatched_norad_ids() {
        let err = Tle::parse(ISS_LINE1, HST_LINE2).unwrap_err();
        assert_eq!(err, TleError::NoradIdMismatch(25544, 20580));
    }

    #[test]
    fn test_parse_batch_mixed_formats() {
        let input = format!("ISS (ZARYA)\n{ISS_LINE1}\n{ISS_LINE2}\n\n{HST_LINE1}\n{HST_LINE2}\n");
        let tles = Tle::parse_batch(&input).unwrap();
        assert_eq!(tles.len(), 2);
        assert_eq!(tles[0].name.as_deref(), Some("ISS (ZARYA)"));
        assert_eq!(tles[1].name, None);
        assert_eq!(tles[1].norad_id, 20580);
    }

    #[test]
    fn test_parse_batch_empty() {
        assert_eq!(Tle::parse_batch("\n  \nnot a tle\n").unwrap_err(), TleError::Empty);
    }

    #[test]
    fn test_implied_decimal() {
        assert_relative_eq!(parse_implied_decimal("10270-3").unwrap(), 0.10270e-3, epsilon = 1e-15);
        assert_relative_eq!(parse_implied_decimal("-11606-4").unwrap(), -0.11606e-4, epsilon = 1e-15);
        assert_eq!(parse_implied_decimal("00000-0").unwrap(), 0.0);
        assert_eq!(parse_implied_decimal("").unwrap(), 0.0);
        assert!(parse_implied_decimal("12a45-3").is_err());
    }

    #[test]
    fn test_epoch_conversion() {
        // 2000-01-01 12:00 is J2000 itself
        assert_eq!(days_from_j2000_to_jan1(2000), 0);
        assert_eq!(days_from_j2000_to_jan1(2001), 366);
        assert_eq!(days_from_j2000_to_jan1(1999), -365);
        assert_eq!(days_from_j2000_to_jan1(2024), 8766);

        let tle = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap();
        // 2024 day 1.5 = 2024-01-01 12:00, exactly 8766 days after J2000
        assert_relative_eq!(tle.epoch_j2000_seconds(), 8766.0 * SOLAR_DAY, epsilon = 1e-3);
    }

    #[test]
    fn test_to_mean_elements() {
        let mean = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap().to_mean_elements();
        assert_relative_eq!(mean.i * RAD2DEG, 51.64, epsilon = 1e-9);
        assert!(mean.a > R_EARTH + 400.0 && mean.a < R_EARTH + 430.0);
        assert_relative_eq!(mean.epoch, 8766.0 * SOLAR_DAY, epsilon = 1e-3);
    }
}
