use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutreachError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A registry page request failed. `params` is the query string that was sent
    /// and `body` whatever the server answered, kept for diagnosis.
    #[error("Registry request failed (status {status:?}) for [{params}]: {body}")]
    Registry {
        status: Option<u16>,
        params: String,
        body: String,
    },

    #[error("Ledger unavailable: {0}")]
    Ledger(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl From<rusqlite::Error> for OutreachError {
    fn from(err: rusqlite::Error) -> Self {
        OutreachError::Ledger(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OutreachError>;
