//! Distance line parser
//!
//! The sensor firmware prints one reading per line:
//!
//! ```text
//! Distance:<integer>cm
//! ```
//!
//! Whitespace around the value and a missing unit suffix are tolerated.
//! Anything else (boot banners, garbled partial lines, negative or
//! fractional values) is rejected. Rejected lines are expected on a live
//! serial stream and are never fatal.

use thiserror::Error;

/// Prefix every reading line starts with.
pub const DISTANCE_PREFIX: &str = "Distance:";

/// Unit literal stripped from the end of the value.
pub const UNIT_SUFFIX: &str = "cm";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line does not start with \"Distance:\"")]
    MissingPrefix,

    #[error("distance value is empty")]
    EmptyValue,

    #[error("invalid distance value {0:?}")]
    InvalidValue(String),
}

/// Converts sensor lines into distance readings (cm).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingParser;

impl ReadingParser {
    /// Parse one line into a non-negative distance in centimeters.
    pub fn parse(line: &str) -> Result<f64, ParseError> {
        let value = line
            .trim()
            .strip_prefix(DISTANCE_PREFIX)
            .ok_or(ParseError::MissingPrefix)?
            .trim();
        let value = value.strip_suffix(UNIT_SUFFIX).unwrap_or(value).trim();

        if value.is_empty() {
            return Err(ParseError::EmptyValue);
        }

        value
            .parse::<u32>()
            .map(f64::from)
            .map_err(|_| ParseError::InvalidValue(value.to_string()))
    }
}

/// Render a reading the way the sensor firmware prints it.
pub fn format_reading(distance_cm: u32) -> String {
    format!("{DISTANCE_PREFIX}{distance_cm}{UNIT_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_canonical_line() {
        assert_eq!(ReadingParser::parse("Distance:12cm"), Ok(12.0));
        assert_eq!(ReadingParser::parse("Distance:0cm"), Ok(0.0));
    }

    #[test]
    fn test_tolerates_whitespace_and_missing_unit() {
        assert_eq!(ReadingParser::parse("  Distance: 17 cm \r"), Ok(17.0));
        assert_eq!(ReadingParser::parse("Distance:25"), Ok(25.0));
    }

    #[test]
    fn test_rejects_missing_value() {
        assert_eq!(ReadingParser::parse("Distance:cm"), Err(ParseError::EmptyValue));
        assert_eq!(ReadingParser::parse("Distance:"), Err(ParseError::EmptyValue));
    }

    #[test]
    fn test_rejects_other_lines() {
        assert_eq!(ReadingParser::parse("Sensor ready"), Err(ParseError::MissingPrefix));
        assert_eq!(ReadingParser::parse("distance:12cm"), Err(ParseError::MissingPrefix));
        assert_eq!(ReadingParser::parse(""), Err(ParseError::MissingPrefix));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(matches!(
            ReadingParser::parse("Distance:-4cm"),
            Err(ParseError::InvalidValue(_))
        ));
        assert!(matches!(
            ReadingParser::parse("Distance:12.5cm"),
            Err(ParseError::InvalidValue(_))
        ));
        assert!(matches!(
            ReadingParser::parse("Distance:1x2cm"),
            Err(ParseError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_format_reading_parses_back() {
        let line = format_reading(42);
        assert_eq!(line, "Distance:42cm");
        assert_eq!(ReadingParser::parse(&line), Ok(42.0));
    }
}
