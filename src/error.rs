use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// A required field was missing or could not be parsed.
    #[error("malformed record at line {line}: {field} {reason}")]
    MalformedRecord {
        line: usize,
        field: &'static str,
        reason: String,
    },

    /// A rate or aggregate was requested over zero qualifying rows.
    #[error("empty population: {what}")]
    EmptyPopulation { what: &'static str },
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
