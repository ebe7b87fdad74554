//! Sections 0 and 1 of a GRIB2 message.
//!
//! Only the fixed-layout header octets are read here. The reference time is
//! taken straight from the identification section so callers can compare it
//! with the cycle they asked for.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Length of the indicator section, which is fixed.
const INDICATOR_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Not a GRIB file: {0}")]
    NotGrib(String),

    #[error("Unsupported GRIB edition {0}")]
    UnsupportedEdition(u8),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },
}

/// Section 0: Indicator Section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section (the parts used here)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
}

/// Parse Section 0 (Indicator) from the start of a message.
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, HeaderError> {
    if data.len() < INDICATOR_LEN {
        return Err(HeaderError::NotGrib(format!(
            "{} bytes is too short for an indicator section",
            data.len()
        )));
    }

    if &data[0..4] != b"GRIB" {
        return Err(HeaderError::NotGrib("missing 'GRIB' magic".to_string()));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(HeaderError::UnsupportedEdition(edition));
    }

    let mut length = [0u8; 8];
    length.copy_from_slice(&data[8..16]);

    Ok(Indicator {
        discipline,
        edition,
        message_length: u64::from_be_bytes(length),
    })
}

/// Parse Section 1 (Identification) of the first message in `data`.
pub fn parse_identification(data: &[u8]) -> Result<Identification, HeaderError> {
    parse_indicator(data)?;

    if data.len() < INDICATOR_LEN + 21 {
        return Err(HeaderError::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let section_number = data[INDICATOR_LEN + 4];
    if section_number != 1 {
        return Err(HeaderError::InvalidSection {
            section: 1,
            reason: format!("expected section 1, found {}", section_number),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec = &data[INDICATOR_LEN + 5..];

    let center = u16::from_be_bytes([sec[0], sec[1]]);
    let sub_center = u16::from_be_bytes([sec[2], sec[3]]);
    let significance_of_reference_time = sec[6];

    let year = u16::from_be_bytes([sec[7], sec[8]]);
    let (month, day, hour, minute, second) = (sec[9], sec[10], sec[11], sec[12], sec[13]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| HeaderError::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Indicator plus a 21-byte identification section.
    pub(crate) fn header_bytes(year: u16, month: u8, day: u8, hour: u8) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"GRIB");
        data.extend_from_slice(&[0, 0, 0, 2]);
        data.extend_from_slice(&1234u64.to_be_bytes());

        data.extend_from_slice(&21u32.to_be_bytes());
        data.push(1);
        data.extend_from_slice(&7u16.to_be_bytes()); // NCEP
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&[2, 1, 1]);
        data.extend_from_slice(&year.to_be_bytes());
        data.extend_from_slice(&[month, day, hour, 0, 0]);
        data.extend_from_slice(&[0, 1]);
        data
    }

    #[test]
    fn test_parse_indicator() {
        let data = header_bytes(2024, 1, 10, 12);
        let indicator = parse_indicator(&data).unwrap();
        assert_eq!(indicator.edition, 2);
        assert_eq!(indicator.discipline, 0);
        assert_eq!(indicator.message_length, 1234);
    }

    #[test]
    fn test_parse_reference_time() {
        let data = header_bytes(2024, 1, 10, 12);
        let id = parse_identification(&data).unwrap();
        assert_eq!(id.center, 7);
        assert_eq!(id.reference_time, Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_rejects_non_grib() {
        let err = parse_indicator(b"<html>404 Not Found</html>").unwrap_err();
        assert!(matches!(err, HeaderError::NotGrib(_)));

        let err = parse_indicator(b"GRIB").unwrap_err();
        assert!(matches!(err, HeaderError::NotGrib(_)));
    }

    #[test]
    fn test_rejects_edition_1() {
        let mut data = header_bytes(2024, 1, 10, 12);
        data[7] = 1;
        assert_eq!(parse_indicator(&data).unwrap_err(), HeaderError::UnsupportedEdition(1));
    }

    #[test]
    fn test_rejects_invalid_date() {
        let data = header_bytes(2024, 13, 10, 12);
        let err = parse_identification(&data).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidSection { section: 1, .. }));
    }

    #[test]
    fn test_rejects_truncated_identification() {
        let data = header_bytes(2024, 1, 10, 12);
        let err = parse_identification(&data[..24]).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidSection { section: 1, .. }));
    }
}
