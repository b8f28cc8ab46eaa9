//! Single-line text encoding of a scenario layout.
//!
//! Layouts travel as `shape:v1:<columns>x<rows>:<payload>` where the payload
//! is unpadded base64 over a JSON document listing origins, destinations and
//! obstacles.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use shapeshifter_core::{CellCoord, Scenario};
use thiserror::Error;

const LAYOUT_DOMAIN: &str = "shape";
const LAYOUT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded layout payload.
pub(crate) const LAYOUT_HEADER: &str = "shape:v1";
const FIELD_DELIMITER: char = ':';

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct LayoutPayload {
    origins: Vec<CellCoord>,
    destinations: Vec<CellCoord>,
    #[serde(default)]
    obstacles: Vec<CellCoord>,
}

/// Errors that can occur while encoding or decoding layout strings.
#[derive(Debug, Error)]
pub(crate) enum LayoutTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("layout string was empty")]
    EmptyPayload,
    /// A required segment was missing.
    #[error("layout string is missing the {0}")]
    MissingSegment(&'static str),
    /// The prefix segment did not name a shapeshifter layout.
    #[error("layout prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The layout used an unsupported version identifier.
    #[error("layout version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode layout payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The payload JSON could not be produced or parsed.
    #[error("could not process layout payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Encodes the scenario into a single-line string suitable for sharing.
pub(crate) fn encode(scenario: &Scenario) -> Result<String, LayoutTransferError> {
    let payload = LayoutPayload {
        origins: scenario.origins.clone(),
        destinations: scenario.destinations.clone(),
        obstacles: scenario.obstacles.clone(),
    };
    let json = serde_json::to_vec(&payload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{LAYOUT_HEADER}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
        scenario.columns, scenario.rows
    ))
}

/// Decodes a scenario from its string representation.
///
/// The result is not validated; callers hand it to the world which rejects
/// inconsistent layouts.
pub(crate) fn decode(value: &str) -> Result<Scenario, LayoutTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LayoutTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts
        .next()
        .ok_or(LayoutTransferError::MissingSegment("prefix"))?;
    let version = parts
        .next()
        .ok_or(LayoutTransferError::MissingSegment("version"))?;
    let dimensions = parts
        .next()
        .ok_or(LayoutTransferError::MissingSegment("grid dimensions"))?;
    let payload = parts
        .next()
        .ok_or(LayoutTransferError::MissingSegment("payload"))?;

    if domain != LAYOUT_DOMAIN {
        return Err(LayoutTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != LAYOUT_VERSION {
        return Err(LayoutTransferError::UnsupportedVersion(version.to_owned()));
    }

    let (columns, rows) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    let decoded: LayoutPayload = serde_json::from_slice(&bytes)?;

    Ok(Scenario {
        columns,
        rows,
        origins: decoded.origins,
        destinations: decoded.destinations,
        obstacles: decoded.obstacles,
    })
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), LayoutTransferError> {
    let invalid = || LayoutTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_survives_transfer() {
        let scenario = Scenario {
            columns: 12,
            rows: 8,
            origins: vec![CellCoord::new(0, 7), CellCoord::new(1, 7)],
            destinations: vec![CellCoord::new(5, 2), CellCoord::new(6, 2)],
            obstacles: vec![CellCoord::new(3, 4)],
        };

        let encoded = encode(&scenario).expect("layout encodes");
        assert!(encoded.starts_with(&format!("{LAYOUT_HEADER}:12x8:")));

        let decoded = decode(&encoded).expect("layout decodes");
        assert_eq!(decoded, scenario);
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let error = decode("grid:v1:4x4:e30").unwrap_err();
        assert!(matches!(error, LayoutTransferError::InvalidPrefix(prefix) if prefix == "grid"));
    }

    #[test]
    fn malformed_dimensions_are_rejected() {
        for dimensions in ["4", "0x3", "ax3"] {
            let error = decode(&format!("shape:v1:{dimensions}:e30")).unwrap_err();
            assert!(matches!(error, LayoutTransferError::InvalidDimensions(_)));
        }
    }

    #[test]
    fn truncated_strings_report_the_missing_segment() {
        assert!(matches!(decode("   "), Err(LayoutTransferError::EmptyPayload)));
        assert!(matches!(
            decode("shape:v1:4x4"),
            Err(LayoutTransferError::MissingSegment("payload"))
        ));
    }
}
