use tenantd_trace::error::TraceableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("std::io::Error")]
    StdIo(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("SerializationError: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    Kube(#[source] kube::Error),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("Kube Library Error: {0}")]
    KubeLibrary(#[source] crate::error::Error),

    #[error("Ipam Error: {0}")]
    Ipam(#[source] tenantd_ipam::Error),

    #[error("Address pool {0} is exhausted")]
    PoolExhausted(String),

    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Metrics Error: {0}")]
    Metrics(#[source] prometheus::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load")]
    FailedToLoad,
    #[error("invalid pool: {0}")]
    InvalidPool(String),
    #[error("invalid prefix length: {0}")]
    InvalidPrefixLength(u8),
}

impl TraceableError for &Error {
    fn metric_label(&self) -> String {
        (*self).metric_label()
    }
}

impl TraceableError for Error {
    fn metric_label(&self) -> String {
        match self {
            Error::StdIo(_) => "io",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Kube(_) => "kube",
            Error::Finalizer(_) => "finalizer",
            Error::KubeLibrary(_) => "kube_library",
            Error::Ipam(_) => "ipam",
            Error::PoolExhausted(_) => "pool_exhausted",
            Error::InvalidCidr(_) => "invalid_cidr",
            Error::Metrics(_) => "metrics",
        }
        .to_string()
    }
}
