use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate source URL: {0}")]
    Duplicate(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Content too short: {len} chars")]
    ContentTooShort { len: usize },

    #[error("Search error: {0}")]
    Search(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Scraping is already running")]
    AlreadyRunning,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Connection("socket closed".to_string()).is_transient());
        assert!(!Error::Duplicate("http://a".to_string()).is_transient());
        assert!(!Error::Validation("title is empty".to_string()).is_transient());
        assert!(!Error::Storage("corrupt page".to_string()).is_transient());
        assert!(!Error::AlreadyRunning.is_transient());
    }
}
