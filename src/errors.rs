/// Error type that can be returned by fallible operations in this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error reading a CSV file; could wrap IO or parsing errors
    #[error("Error processing CSV")]
    Load(#[from] csv::Error),
    /// A request could not be built or sent, or its response could not be read
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    /// The remote service answered with a status other than the one the call expects.
    /// Nothing is retried.
    #[error("Unexpected response with code {status}:\n{body}")]
    UnexpectedStatus {
        /// HTTP status code received
        status: u16,
        /// Response body, as text
        body: String,
    },
    /// A response body was not the JSON document the call expects
    #[error("Malformed response from the remote service")]
    Json(#[from] serde_json::Error),
    /// A CSV row has fewer columns than required
    #[error("Row on line {line} has {found} columns, expected at least {expected}")]
    ShortRow {
        /// 1-based line of the row in its file
        line: u64,
        /// Minimum number of columns
        expected: usize,
        /// Number of columns found
        found: usize,
    },
    /// A name in an attendance export does not match any student.
    /// Only returned under [`UnresolvedPolicy::Abort`](crate::types::UnresolvedPolicy::Abort).
    #[error("Student {0:?} could not be found")]
    UnknownStudent(String),
    /// A form-data row names a month that has no entry in the month-length table
    #[error("Unknown month {0:?}")]
    UnknownMonth(String),
}
