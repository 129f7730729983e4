use kube::CustomResourceExt;
use tenantd_kubernetes::crd;

fn main() -> anyhow::Result<()> {
    print!(
        "{}",
        serde_yaml::to_string(&crd::tenant_cluster::TenantCluster::crd())?
    );
    Ok(())
}
