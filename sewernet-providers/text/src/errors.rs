use sewernet_core::ConfigError;
use thiserror::Error;

/// Failure while reading a pipe, rainfall, or diameter table.
///
/// Line numbers are one-based and count every line of the input, including
/// comments and blank lines.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TextProviderError {
    /// The input holds no header row.
    #[error("input contains no header row")]
    EmptyInput,
    /// A required column is absent from the header.
    #[error("required column `{column}` not found{}", suggestion_hint(.suggestion.as_deref()))]
    MissingColumn {
        /// Column that was expected.
        column: &'static str,
        /// Closest header name, when one is similar enough.
        suggestion: Option<String>,
    },
    /// A column name appears twice in the header.
    #[error("column `{column}` appears more than once in the header")]
    DuplicateColumn {
        /// Repeated column.
        column: String,
    },
    /// A row has a different number of fields than the header.
    #[error("line {line}: expected {expected} field(s) but found {actual}")]
    RowLength {
        /// Offending line.
        line: usize,
        /// Number of header columns.
        expected: usize,
        /// Number of fields on the line.
        actual: usize,
    },
    /// A field could not be parsed as a number.
    #[error("line {line}: column `{column}` holds `{value}`, which is not a number")]
    InvalidNumber {
        /// Offending line.
        line: usize,
        /// Column of the field.
        column: String,
        /// Raw field text.
        value: String,
    },
    /// A field could not be parsed as a section type.
    #[error("line {line}: {reason}")]
    InvalidSection {
        /// Offending line.
        line: usize,
        /// Parser message.
        reason: String,
    },
    /// A timestamp is not RFC 3339.
    #[error("line {line}: `{value}` is not an RFC 3339 timestamp")]
    InvalidTimestamp {
        /// Offending line.
        line: usize,
        /// Raw field text.
        value: String,
        /// Parser failure.
        #[source]
        source: chrono::ParseError,
    },
    /// A row was rejected by the core model.
    #[error("line {line}: {source}")]
    Record {
        /// Offending line.
        line: usize,
        /// Model validation failure.
        #[source]
        source: ConfigError,
    },
    /// The assembled series or catalog was rejected by the core model.
    #[error(transparent)]
    Model(#[from] ConfigError),
    /// Reading the input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn suggestion_hint(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |name| format!(" (did you mean `{name}`?)"))
}
