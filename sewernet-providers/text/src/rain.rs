//! Rainfall and diameter-list readers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use sewernet_core::{DiameterCatalog, RainfallSample, RainfallSeries};
use tracing::{debug, instrument};

use crate::{errors::TextProviderError, table::Table};

/// Reads an observed rainfall series.
///
/// The first column holds RFC 3339 timestamps; every further column is one
/// rain zone with intensities in mm/min. The time step is inferred from the
/// spacing of the first two rows.
///
/// # Errors
/// Returns [`TextProviderError::InvalidTimestamp`] or
/// [`TextProviderError::InvalidNumber`] for malformed fields, and
/// [`TextProviderError::Model`] when the series is not strictly increasing
/// and uniformly spaced.
///
/// # Examples
/// ```
/// use std::io::Cursor;
/// use sewernet_providers_text::read_rainfall;
///
/// let raw = "\
/// time                 north south
/// 2024-05-01T10:05:00Z 0.8   0.4
/// 2024-05-01T10:10:00Z 0.2   0.1
/// ";
/// let series = read_rainfall(Cursor::new(raw))?;
/// assert_eq!(series.zones(), 2);
/// assert_eq!(series.time_step(), 5.0);
/// # Ok::<(), sewernet_providers_text::TextProviderError>(())
/// ```
#[instrument(name = "providers.text.rainfall", err, skip(reader))]
pub fn read_rainfall(reader: impl BufRead) -> Result<RainfallSeries, TextProviderError> {
    let table = Table::read(reader)?;
    let samples = table
        .rows
        .iter()
        .map(|row| {
            let raw = row.field(0);
            let time = DateTime::parse_from_rfc3339(raw)
                .map_err(|source| TextProviderError::InvalidTimestamp {
                    line: row.line,
                    value: raw.to_owned(),
                    source,
                })?
                .with_timezone(&Utc);
            let intensities = (1..table.columns().len())
                .map(|index| row.number(&table, index))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RainfallSample::new(time, intensities))
        })
        .collect::<Result<Vec<_>, TextProviderError>>()?;
    let series = RainfallSeries::from_samples(samples)?;
    debug!(steps = series.len(), zones = series.zones(), "rainfall read");
    Ok(series)
}

/// Opens and reads the rainfall table at `path`.
///
/// # Errors
/// See [`read_rainfall`].
pub fn open_rainfall(path: impl AsRef<Path>) -> Result<RainfallSeries, TextProviderError> {
    read_rainfall(BufReader::new(File::open(path)?))
}

/// Reads a list of commercial sizes in metres.
///
/// Sizes may be spread over any number of lines; `#` starts a comment line.
///
/// # Errors
/// Returns [`TextProviderError::InvalidNumber`] for a non-numeric entry and
/// [`TextProviderError::Model`] for an empty list or a non-positive size.
///
/// # Examples
/// ```
/// use std::io::Cursor;
/// use sewernet_providers_text::read_diameters;
///
/// let catalog = read_diameters(Cursor::new("# PVC\n0.3 0.2\n0.4\n"))?;
/// assert_eq!(catalog.sizes(), &[0.2, 0.3, 0.4]);
/// # Ok::<(), sewernet_providers_text::TextProviderError>(())
/// ```
pub fn read_diameters(reader: impl BufRead) -> Result<DiameterCatalog, TextProviderError> {
    let mut sizes = Vec::new();
    for (offset, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }
        for raw in trimmed.split(|c: char| c == ',' || c.is_whitespace()) {
            if raw.is_empty() {
                continue;
            }
            let size = raw
                .parse::<f64>()
                .map_err(|_| TextProviderError::InvalidNumber {
                    line: offset + 1,
                    column: "diameter".to_owned(),
                    value: raw.to_owned(),
                })?;
            sizes.push(size);
        }
    }
    Ok(DiameterCatalog::new(sizes)?)
}

/// Opens and reads the diameter list at `path`.
///
/// # Errors
/// See [`read_diameters`].
pub fn open_diameters(path: impl AsRef<Path>) -> Result<DiameterCatalog, TextProviderError> {
    read_diameters(BufReader::new(File::open(path)?))
}
