use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: Token missing. Run `hrconsole login` first.")]
    MissingCredential,

    #[error("{0}")]
    Server(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ConsoleError::Validation(msg.into())
    }
}
