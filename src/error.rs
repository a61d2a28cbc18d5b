use thiserror::Error;

/// Everything that can go wrong talking to the spreadsheet backend or
/// reshaping its rows. Handlers collapse all of these into a 500 with a
/// static message, so the variants only matter for the log line.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sheets api returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to obtain access token: {0}")]
    Token(String),

    #[error("expense row has {found} cells, expected {expected}")]
    ShortRow { found: usize, expected: usize },

    #[error("cell {column} is not a valid {kind}: {value:?}")]
    BadCell {
        column: &'static str,
        kind: &'static str,
        value: String,
    },
}
