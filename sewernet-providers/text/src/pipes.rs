//! Pipe table reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sewernet_core::{Coordinate, DrainTarget, PipeAttributes, PipeId, PipeRecord, SectionType};
use tracing::{debug, instrument};

use crate::{
    errors::TextProviderError,
    table::{Row, Table},
};

/// Columns every pipe table must carry.
pub const REQUIRED_COLUMNS: [&str; 15] = [
    "id",
    "x1",
    "y1",
    "x2",
    "y2",
    "length",
    "elev_start",
    "elev_end",
    "area",
    "runoff",
    "ks",
    "min_slope",
    "section",
    "residence_time",
    "avg_slope",
];

/// Pipe records read from a delimited table.
///
/// Besides [`REQUIRED_COLUMNS`], a table may carry `drain_to` (0 for the
/// outlet), `diameter` in metres, and `rain_zone`.
///
/// # Examples
/// ```
/// use std::io::Cursor;
/// use sewernet_providers_text::PipeTable;
///
/// let raw = "\
/// id x1 y1 x2 y2 length elev_start elev_end area runoff ks min_slope section residence_time avg_slope
/// 1  0  0  100 0 100   10.0       9.0      1.5  0.6    75 0.002     circular 5 0.01
/// ";
/// let table = PipeTable::try_from_reader("demo", Cursor::new(raw))?;
/// assert_eq!(table.len(), 1);
/// assert!(!table.declares_targets());
/// # Ok::<(), sewernet_providers_text::TextProviderError>(())
/// ```
#[derive(Clone, Debug)]
pub struct PipeTable {
    name: String,
    records: Vec<PipeRecord>,
    declared: bool,
}

struct Columns {
    required: [usize; 15],
    drain_to: Option<usize>,
    diameter: Option<usize>,
    rain_zone: Option<usize>,
}

impl PipeTable {
    /// Reads a table from `reader`.
    ///
    /// # Errors
    /// Returns [`TextProviderError`] for I/O failures, missing columns,
    /// malformed fields, or rows rejected by the pipe model.
    #[instrument(name = "providers.text.pipes", err, skip(reader), fields(name = %name.as_ref()))]
    pub fn try_from_reader(
        name: impl AsRef<str>,
        reader: impl BufRead,
    ) -> Result<Self, TextProviderError> {
        let table = Table::read(reader)?;
        let mut required = [0; 15];
        for (slot, column) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = table.require(column)?;
        }
        let columns = Columns {
            required,
            drain_to: table.optional("drain_to"),
            diameter: table.optional("diameter"),
            rain_zone: table.optional("rain_zone"),
        };
        let records = table
            .rows
            .iter()
            .map(|row| parse_row(&table, row, &columns))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(pipes = records.len(), "pipe table read");
        Ok(Self {
            name: name.as_ref().to_owned(),
            records,
            declared: columns.drain_to.is_some(),
        })
    }

    /// Opens and reads the table at `path`.
    ///
    /// # Errors
    /// See [`Self::try_from_reader`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TextProviderError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::try_from_reader(path.display().to_string(), BufReader::new(file))
    }

    /// Name the table was read under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no pipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the table carried a `drain_to` column.
    #[must_use]
    pub fn declares_targets(&self) -> bool {
        self.declared
    }

    /// Records in table order.
    #[must_use]
    pub fn records(&self) -> &[PipeRecord] {
        &self.records
    }

    /// Returns the records, consuming the table.
    #[must_use]
    pub fn into_records(self) -> Vec<PipeRecord> {
        self.records
    }
}

fn parse_row(table: &Table, row: &Row, columns: &Columns) -> Result<PipeRecord, TextProviderError> {
    let [id, x1, y1, x2, y2, length, elev_start, elev_end, area, runoff, ks, min_slope, section, residence, avg_slope] =
        columns.required;
    let number = |index| row.number(table, index);
    let record_error = |source| TextProviderError::Record {
        line: row.line,
        source,
    };
    let pipe = PipeId::new(row.integer(table, id)?).map_err(record_error)?;
    let section = row
        .field(section)
        .parse::<SectionType>()
        .map_err(|reason| TextProviderError::InvalidSection {
            line: row.line,
            reason,
        })?;
    let rain_zone = match columns.rain_zone {
        Some(index) => row.integer(table, index)? as usize,
        None => 0,
    };
    let attributes = PipeAttributes {
        length: number(length)?,
        initial_elevation: number(elev_start)?,
        final_elevation: number(elev_end)?,
        drain_area: number(area)?,
        runoff_coefficient: number(runoff)?,
        ks: number(ks)?,
        minimum_slope: number(min_slope)?,
        section,
        average_residence_time: number(residence)?,
        average_slope: number(avg_slope)?,
        diameter: row.maybe_number(table, columns.diameter)?,
        rain_zone,
    };
    attributes.validate(pipe).map_err(record_error)?;
    let mut record = PipeRecord::new(
        pipe,
        Coordinate::new(number(x1)?, number(y1)?),
        Coordinate::new(number(x2)?, number(y2)?),
        attributes,
    );
    if let Some(index) = columns.drain_to {
        record = record.with_drain_target(DrainTarget::from(row.integer(table, index)?));
    }
    Ok(record)
}
