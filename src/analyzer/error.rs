use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Git error: {0}")]
    GitError(#[from] git2::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unable to read {path}: {source}")]
    FileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{provider} provider unavailable for {path}: {message}")]
    ProviderUnavailable {
        provider: &'static str,
        path: String,
        message: String,
    },

    #[error("Analysis error: {0}")]
    AnalysisError(String),
}
