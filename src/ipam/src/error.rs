use ipnet::IpNet;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No free subnet of /{prefix_len} in {range}")]
    NoFreeSubnet { range: IpNet, prefix_len: u8 },

    #[error("Invalid subnet size /{prefix_len} for {range}")]
    InvalidSubnetSize { range: IpNet, prefix_len: u8 },

    #[error("Cannot split {network} into {count} subnets")]
    InvalidSplit { network: IpNet, count: usize },

    #[error("Failed to collect reserved subnets: {0}")]
    Collect(#[source] BoxError),

    #[error("Failed to persist subnet {subnet}: {cause}")]
    Persist {
        subnet: IpNet,
        #[source]
        cause: BoxError,
    },
}

impl Error {
    /// The pool has no room left for the requested size.
    /// Retrying will not help until subnets are released or the pool grows.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::NoFreeSubnet { .. })
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Collect(_) | Error::Persist { .. })
    }

    /// The error returned by a callback, if this error wraps one.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Collect(e) => Some(e.as_ref()),
            Error::Persist { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("conflict")]
    struct Conflict;

    #[test]
    fn works_cause_downcast() {
        let err = Error::Persist {
            subnet: IpNet::from_str("10.0.0.0/24").unwrap(),
            cause: Box::new(Conflict),
        };
        assert!(err.is_store_error());
        assert!(!err.is_exhausted());
        let cause = err.cause().unwrap();
        assert_eq!(cause.downcast_ref::<Conflict>(), Some(&Conflict));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn works_exhausted_has_no_cause() {
        let err = Error::NoFreeSubnet {
            range: IpNet::from_str("10.0.0.0/24").unwrap(),
            prefix_len: 25,
        };
        assert!(err.is_exhausted());
        assert!(!err.is_store_error());
        assert!(err.cause().is_none());
        assert_eq!(err.to_string(), "No free subnet of /25 in 10.0.0.0/24");
    }
}
