use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} has no namespace")]
    MissingNamespace(String),
}
