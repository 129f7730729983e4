use std::str::FromStr;

use ipnet::IpNet;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const TENANT_CLUSTER_FINALIZER: &str = "tenantcluster.tenantd.dev/finalizer";

#[derive(CustomResource, Debug, Serialize, Deserialize, Default, Clone, JsonSchema)]
#[kube(
    group = "tenantd.dev",
    version = "v1alpha1",
    kind = "TenantCluster",
    namespaced
)]
#[kube(status = "TenantClusterStatus")]
#[kube(
    printcolumn = r#"{"name":"CIDR", "type":"string", "description":"Network of the tenant cluster", "jsonPath":".status.network.cidr"}"#,
    printcolumn = r#"{"name":"AGE", "type":"date", "description":"Date from created", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterSpec {
    pub availability_zones: Option<Vec<String>>,
    pub network: Option<NetworkSpec>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    // Set to use this network instead of allocating one from the pool.
    pub cidr: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterStatus {
    pub network: Option<NetworkStatus>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub cidr: String,
    pub subnets: Option<Vec<ZoneSubnet>>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSubnet {
    pub zone: String,
    pub cidr: String,
}

impl TenantCluster {
    pub fn pinned_cidr(&self) -> Option<&str> {
        self.spec
            .network
            .as_ref()
            .and_then(|n| n.cidr.as_deref())
    }

    pub fn status_cidr(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.network.as_ref())
            .map(|n| n.cidr.as_str())
    }

    pub fn zones(&self) -> &[String] {
        self.spec.availability_zones.as_deref().unwrap_or_default()
    }

    /// Network this cluster holds, from status first and then from spec.
    /// Values that don't parse are skipped.
    pub fn allocated_network(&self) -> Option<IpNet> {
        [self.status_cidr(), self.pinned_cidr()]
            .into_iter()
            .flatten()
            .find_map(|cidr| match IpNet::from_str(cidr) {
                Ok(n) => Some(n.trunc()),
                Err(e) => {
                    tracing::warn!(name = self.name_any(), cidr, error = %e, "ignore invalid network");
                    None
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;
    use rstest::rstest;

    fn cluster(pinned: Option<&str>, status: Option<&str>) -> TenantCluster {
        TenantCluster {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: TenantClusterSpec {
                availability_zones: None,
                network: pinned.map(|c| NetworkSpec {
                    cidr: Some(c.to_string()),
                }),
            },
            status: status.map(|c| TenantClusterStatus {
                network: Some(NetworkStatus {
                    cidr: c.to_string(),
                    subnets: None,
                }),
            }),
        }
    }

    #[rstest(
        pinned,
        status,
        expected,
        case(None, None, None),
        case(None, Some("10.100.1.0/24"), Some("10.100.1.0/24")),
        case(Some("10.200.0.0/24"), None, Some("10.200.0.0/24")),
        case(Some("10.200.0.0/24"), Some("10.100.1.0/24"), Some("10.100.1.0/24")),
        case(None, Some("garbage"), None),
        case(Some("10.200.0.0/24"), Some("garbage"), Some("10.200.0.0/24")),
        case(None, Some("10.100.1.7/24"), Some("10.100.1.0/24")),
    )]
    fn works_allocated_network(pinned: Option<&str>, status: Option<&str>, expected: Option<&str>) {
        let tc = cluster(pinned, status);
        assert_eq!(
            tc.allocated_network(),
            expected.map(|e| IpNet::from_str(e).unwrap())
        );
    }

    #[test]
    fn works_zones_default_empty() {
        let tc = cluster(None, None);
        assert!(tc.zones().is_empty());
    }
}
