use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required field: {field}")]
    Validation { field: &'static str },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Search engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed identifier: {0}")]
    MalformedId(String),

    #[error("Batch sent {sent} queries but received {received} responses")]
    BatchMismatch { sent: usize, received: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for conditions a dashboard should render as "no data".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for failures that should surface as operational errors.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Engine { .. } | Self::BatchMismatch { .. } | Self::Io(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
