use axum::extract::multipart::MultipartError;
use phodong_core::PhotoError;

/// Startup failures. Everything after startup is contained inside the session.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server: {0}")]
    Serve(#[source] std::io::Error),
}

/// Why an uploaded photo could not be used.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("multipart: {0}")]
    Multipart(#[from] MultipartError),
    #[error("no `photo` field in upload")]
    MissingPhoto,
    #[error("{0}")]
    Photo(#[from] PhotoError),
    #[error("photo worker: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
