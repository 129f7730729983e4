use std::future::Future;

use async_trait::async_trait;
use ipnet::IpNet;
use tokio::sync::Mutex;

use super::{cidr::is_canonical, error::Error, free::find_free_subnet};

/// Access to the store that owns the reserved subnets of a pool.
///
/// The allocator keeps no state of its own. It reads the reserved set with
/// `collect` on every allocation and hands the chosen subnet to `persist`.
#[async_trait]
pub trait Callbacks: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn collect(&self) -> Result<Vec<IpNet>, Self::Error>;

    async fn persist(&self, subnet: IpNet) -> Result<(), Self::Error>;
}

/// Callbacks made of two async closures.
pub struct FnCallbacks<C, P> {
    collect: C,
    persist: P,
}

impl<C, P> FnCallbacks<C, P> {
    pub fn new(collect: C, persist: P) -> FnCallbacks<C, P> {
        FnCallbacks { collect, persist }
    }
}

#[async_trait]
impl<C, CF, P, PF, E> Callbacks for FnCallbacks<C, P>
where
    C: Fn() -> CF + Send + Sync,
    CF: Future<Output = Result<Vec<IpNet>, E>> + Send,
    P: Fn(IpNet) -> PF + Send + Sync,
    PF: Future<Output = Result<(), E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    async fn collect(&self) -> Result<Vec<IpNet>, E> {
        (self.collect)().await
    }

    async fn persist(&self, subnet: IpNet) -> Result<(), E> {
        (self.persist)(subnet).await
    }
}

/// Serializes subnet allocations made in this process.
///
/// Create one per process and share it with every reconciler through an `Arc`.
/// The lock is held across `collect`, the search and `persist`, so two
/// allocations on the same instance never see the same reserved set.
/// Separate instances, including ones in other processes, are not
/// coordinated with each other; the store has to reject conflicting writes
/// or only one instance may be active.
///
/// Dropping the future returned by `allocate` cancels it and releases the lock.
#[derive(Debug, Default)]
pub struct SubnetAllocator {
    lock: Mutex<()>,
}

impl SubnetAllocator {
    pub fn new() -> SubnetAllocator {
        SubnetAllocator {
            lock: Mutex::new(()),
        }
    }

    #[tracing::instrument(skip_all, fields(range = %range, prefix_len = prefix_len))]
    pub async fn allocate<C>(&self, range: IpNet, prefix_len: u8, callbacks: &C) -> Result<IpNet, Error>
    where
        C: Callbacks + ?Sized,
    {
        if !is_canonical(&range) {
            return Err(Error::InvalidConfig(format!(
                "range {range} has host bits set, expected {}",
                range.trunc()
            )));
        }
        if prefix_len < range.prefix_len() || prefix_len > range.max_prefix_len() {
            return Err(Error::InvalidSubnetSize { range, prefix_len });
        }

        let _guard = self.lock.lock().await;
        tracing::debug!("acquired allocation lock");

        let reserved = callbacks.collect().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to collect reserved subnets");
            Error::Collect(Box::new(e))
        })?;
        tracing::debug!(reserved = reserved.len(), "collected reserved subnets");

        let subnet = match find_free_subnet(&range, prefix_len, &reserved) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "no subnet available");
                return Err(e);
            }
        };
        tracing::debug!(subnet = %subnet, "found free subnet");

        callbacks.persist(subnet).await.map_err(|e| {
            tracing::warn!(subnet = %subnet, error = %e, "failed to persist subnet");
            Error::Persist {
                subnet,
                cause: Box::new(e),
            }
        })?;

        tracing::info!(subnet = %subnet, "allocated subnet");
        Ok(subnet)
    }
}
