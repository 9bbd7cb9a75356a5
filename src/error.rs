use std::net::Ipv4Addr;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("Not an allowed extension ({content_type})")]
    DisallowedType { content_type: String },

    #[error("IPv4 address {0} is in a reserved or private-use range")]
    ReservedAddress(Ipv4Addr),

    #[error("a semaphore needs at least one permit")]
    NoPermits,

    #[error("worker: {0}")]
    Worker(String),

    #[error("unit {unit} exited with {status}")]
    UnitExit { unit: usize, status: ExitStatus },

    #[error("background thread panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Turn the payload of a panicked thread into an error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Error::Panicked(message)
    }
}
