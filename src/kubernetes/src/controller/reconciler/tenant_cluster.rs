use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use ipnet::IpNet;
use kube::{
    api::{ListParams, PostParams},
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event},
        watcher::Config,
    },
    Api, Client, ResourceExt,
};
use tenantd_ipam::{cidr, Callbacks, SubnetAllocator};
use tenantd_trace::telemetry::get_trace_id;

use crate::{
    context::{error_policy, ContextWith, Ctx, State},
    controller::error::Error,
    crd::tenant_cluster::{
        NetworkStatus, TenantCluster, TenantClusterStatus, ZoneSubnet, TENANT_CLUSTER_FINALIZER,
    },
    util::{get_namespace, get_namespaced_name},
};

/// The pool tenant networks come from and the allocator serializing access to it.
#[derive(Debug, Clone)]
pub struct NetworkPool {
    pub allocator: Arc<SubnetAllocator>,
    pub pool: IpNet,
    pub prefix_len: u8,
}

impl NetworkPool {
    pub fn new(allocator: Arc<SubnetAllocator>, pool: IpNet, prefix_len: u8) -> NetworkPool {
        NetworkPool {
            allocator,
            pool,
            prefix_len,
        }
    }
}

/// Decides whether a cluster still needs a network.
#[async_trait]
pub trait AllocationChecker: Send + Sync {
    /// Returns the latest state of the cluster when it has no network yet.
    async fn needs_allocation(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TenantCluster>, Error>;
}

pub struct ApiChecker {
    client: Client,
}

impl ApiChecker {
    pub fn new(client: Client) -> ApiChecker {
        ApiChecker { client }
    }
}

#[async_trait]
impl AllocationChecker for ApiChecker {
    async fn needs_allocation(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TenantCluster>, Error> {
        // The object handed to the reconciler may come from a stale cache.
        let api = Api::<TenantCluster>::namespaced(self.client.clone(), namespace);
        let tc = api.get_opt(name).await.map_err(Error::Kube)?;
        Ok(tc.filter(|tc| tc.allocated_network().is_none()))
    }
}

/// Reserved subnets are the networks of every TenantCluster in the pool.
/// A new subnet is stored in the status of the cluster it was allocated for.
pub struct ClusterNetworkStore {
    all: Api<TenantCluster>,
    api: Api<TenantCluster>,
    cluster: TenantCluster,
    pool: IpNet,
}

impl ClusterNetworkStore {
    pub fn new(client: Client, cluster: TenantCluster, pool: IpNet) -> Result<ClusterNetworkStore, Error> {
        let ns = get_namespace(&cluster).map_err(Error::KubeLibrary)?;
        Ok(ClusterNetworkStore {
            all: Api::all(client.clone()),
            api: Api::namespaced(client, &ns),
            cluster,
            pool,
        })
    }
}

#[async_trait]
impl Callbacks for ClusterNetworkStore {
    type Error = Error;

    async fn collect(&self) -> Result<Vec<IpNet>, Error> {
        let clusters = self
            .all
            .list(&ListParams::default())
            .await
            .map_err(Error::Kube)?;
        let networks: Vec<IpNet> = clusters
            .iter()
            .filter_map(|tc| tc.allocated_network())
            .collect();
        Ok(cidr::filter(&networks, |n| cidr::overlaps(&self.pool, n)))
    }

    async fn persist(&self, subnet: IpNet) -> Result<(), Error> {
        write_network_status(&self.api, &self.cluster, subnet).await
    }
}

// The object keeps the resourceVersion it was read with, so a concurrent
// update of the same cluster is rejected by the API server.
async fn write_network_status(
    api: &Api<TenantCluster>,
    tc: &TenantCluster,
    network: IpNet,
) -> Result<(), Error> {
    let subnets = zone_subnets(&network, tc.zones())?;
    let mut new_tc = tc.clone();
    new_tc.status = Some(TenantClusterStatus {
        network: Some(NetworkStatus {
            cidr: network.to_string(),
            subnets: (!subnets.is_empty()).then_some(subnets),
        }),
    });
    api.replace_status(
        &tc.name_any(),
        &PostParams::default(),
        serde_json::to_vec(&new_tc).map_err(Error::Serialization)?,
    )
    .await
    .map_err(Error::Kube)?;
    Ok(())
}

/// Divides a tenant network between availability zones.
/// The network is split into the next power of two of the zone count and the
/// remaining subnets are left unused.
pub fn zone_subnets(network: &IpNet, zones: &[String]) -> Result<Vec<ZoneSubnet>, Error> {
    if zones.is_empty() {
        return Ok(Vec::new());
    }
    let subnets = cidr::split(network, zones.len().next_power_of_two()).map_err(Error::Ipam)?;
    Ok(zones
        .iter()
        .zip(subnets)
        .map(|(zone, subnet)| ZoneSubnet {
            zone: zone.clone(),
            cidr: subnet.to_string(),
        })
        .collect())
}

#[tracing::instrument(skip_all, fields(trace_id))]
pub async fn reconciler(
    tc: Arc<TenantCluster>,
    ctx: Arc<ContextWith<NetworkPool>>,
) -> Result<Action, Error> {
    let trace_id = get_trace_id();
    tracing::Span::current().record("trace_id", &tracing::field::display(&trace_id));
    let _timer = ctx.metrics().count_and_measure();
    ctx.metrics().reconciliation(tc.as_ref());
    ctx.record_event().await;

    let ns = get_namespace(tc.as_ref()).map_err(Error::KubeLibrary)?;
    let tenant_clusters = Api::<TenantCluster>::namespaced(ctx.client().clone(), &ns);

    finalizer(
        &tenant_clusters,
        TENANT_CLUSTER_FINALIZER,
        tc,
        |event| async {
            match event {
                Event::Apply(tc) => reconcile(&tenant_clusters, &tc, ctx.clone()).await,
                Event::Cleanup(tc) => cleanup(&tenant_clusters, &tc, ctx.clone()).await,
            }
        },
    )
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

#[tracing::instrument(skip_all)]
async fn reconcile(
    api: &Api<TenantCluster>,
    tc: &TenantCluster,
    ctx: Arc<ContextWith<NetworkPool>>,
) -> Result<Action, Error> {
    tracing::info!(name = get_namespaced_name(tc), "reconcile TenantCluster");

    let requeue = Action::requeue(Duration::from_secs(ctx.interval()));
    let network_pool = &ctx.component;

    if let Some(pinned) = tc.pinned_cidr() {
        let network = IpNet::from_str(pinned).map_err(|_| Error::InvalidCidr(pinned.to_string()))?;
        if !cidr::is_canonical(&network) {
            tracing::error!(name = tc.name_any(), cidr = pinned, "pinned network has host bits set");
            return Err(Error::InvalidCidr(pinned.to_string()));
        }
        if tc.status_cidr() != Some(pinned) {
            if cidr::overlaps(&network_pool.pool, &network) {
                let clusters = Api::<TenantCluster>::all(ctx.client().clone())
                    .list(&ListParams::default())
                    .await
                    .map_err(Error::Kube)?;
                for other in overlapping_clusters(tc, &network, &clusters.items) {
                    tracing::warn!(name = tc.name_any(), cidr = pinned, other = %other, "pinned network overlaps another TenantCluster");
                }
            }
            tracing::info!(name = tc.name_any(), cidr = pinned, "use pinned network");
            write_network_status(api, tc, network).await?;
        }
        return Ok(requeue);
    }

    let ns = get_namespace(tc).map_err(Error::KubeLibrary)?;
    let checker = ApiChecker::new(ctx.client().clone());
    let latest = match checker.needs_allocation(&ns, &tc.name_any()).await? {
        Some(latest) => latest,
        None => {
            tracing::debug!(name = tc.name_any(), "network is already allocated");
            return Ok(requeue);
        }
    };

    let store = ClusterNetworkStore::new(ctx.client().clone(), latest, network_pool.pool)?;
    let pool_label = network_pool.pool.to_string();
    match network_pool
        .allocator
        .allocate(network_pool.pool, network_pool.prefix_len, &store)
        .await
    {
        Ok(network) => {
            tracing::info!(name = tc.name_any(), cidr = %network, "allocated network");
            ctx.metrics().allocated_networks_inc(&pool_label);
            Ok(requeue)
        }
        Err(e) if e.is_exhausted() => {
            tracing::error!(name = tc.name_any(), pool = pool_label, error = %e, "address pool is exhausted");
            ctx.metrics().pool_exhausted_inc(&pool_label);
            Err(Error::PoolExhausted(pool_label))
        }
        Err(e) => Err(Error::Ipam(e)),
    }
}

/// Namespaced names of the other clusters whose network overlaps `network`.
pub fn overlapping_clusters(
    tc: &TenantCluster,
    network: &IpNet,
    clusters: &[TenantCluster],
) -> Vec<String> {
    let name = get_namespaced_name(tc);
    clusters
        .iter()
        .filter(|other| get_namespaced_name(*other) != name)
        .filter(|other| {
            other
                .allocated_network()
                .map_or(false, |n| cidr::overlaps(network, &n))
        })
        .map(get_namespaced_name)
        .collect()
}

/// Number of networks allocated from `pool`.
/// Pinned networks and clusters being deleted are not counted.
pub fn count_allocated(clusters: &[TenantCluster], pool: &IpNet) -> i64 {
    clusters
        .iter()
        .filter(|tc| tc.metadata.deletion_timestamp.is_none())
        .filter(|tc| tc.pinned_cidr().is_none())
        .filter_map(|tc| tc.allocated_network())
        .filter(|n| cidr::overlaps(pool, n))
        .count() as i64
}

// The network is released implicitly: a deleted cluster no longer shows up
// in the reserved set. Cleanup may run more than once, so the gauge is
// recomputed instead of decremented.
#[tracing::instrument(skip_all)]
async fn cleanup(
    _api: &Api<TenantCluster>,
    tc: &TenantCluster,
    ctx: Arc<ContextWith<NetworkPool>>,
) -> Result<Action, Error> {
    tracing::info!(name = get_namespaced_name(tc), "clean up TenantCluster");

    let clusters = Api::<TenantCluster>::all(ctx.client().clone())
        .list(&ListParams::default())
        .await
        .map_err(Error::Kube)?;
    let pool = &ctx.component.pool;
    ctx.metrics()
        .allocated_networks_set(&pool.to_string(), count_allocated(&clusters.items, pool));

    if let Some(network) = tc.status_cidr() {
        tracing::info!(name = tc.name_any(), cidr = network, "release network");
    }

    Ok(Action::await_change())
}

pub async fn run(state: State, interval: u64, network_pool: NetworkPool) {
    let client = Client::try_default()
        .await
        .expect("Failed to create kube client");

    let tenant_clusters = Api::<TenantCluster>::all(client.clone());
    if let Err(e) = tenant_clusters.list(&ListParams::default().limit(1)).await {
        tracing::error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        tracing::info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    // Networks allocated before a restart are counted again.
    if let Ok(clusters) = tenant_clusters.list(&ListParams::default()).await {
        state.metrics_handle().allocated_networks_set(
            &network_pool.pool.to_string(),
            count_allocated(&clusters.items, &network_pool.pool),
        );
    }

    tracing::info!(pool = %network_pool.pool, prefix_len = network_pool.prefix_len, "Start TenantCluster reconciler");

    Controller::new(tenant_clusters, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(
            reconciler,
            error_policy::<TenantCluster, Error, ContextWith<NetworkPool>>,
            state.to_context_with(client, interval, network_pool),
        )
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
