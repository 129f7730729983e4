use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Patch, PatchParams},
    core::ObjectMeta,
    Api, Client, CustomResourceExt, ResourceExt,
};
use tenantd_kubernetes::crd::tenant_cluster::{
    TenantCluster, TenantClusterSpec, TENANT_CLUSTER_FINALIZER,
};

// Make sure kind binary is in here
const KIND_BIN: &str = "../../bin/kind";
const KIND_CLUSTER_NAME: &str = "tenantd-integration";
const KIND_CLUSTER_IMAGE: &str = "kindest/node";
const KIND_CLUSTER_IMAGE_VERSION_ENV: &str = "KIND_NODE_VERSION";

pub fn setup_kind() {
    cleanup_kind_no_output();
    let mut binding = std::process::Command::new(KIND_BIN);
    binding.args(["create", "cluster", "--name", KIND_CLUSTER_NAME]);
    if let Ok(v) = std::env::var(KIND_CLUSTER_IMAGE_VERSION_ENV) {
        binding.args(["--image", &format!("{}:{}", KIND_CLUSTER_IMAGE, v)]);
    };

    let out = binding.output().expect("failed to create kind cluster");
    output_result(out);

    std::thread::sleep(std::time::Duration::from_secs(2));
}

pub fn cleanup_kind() {
    let out = std::process::Command::new(KIND_BIN)
        .args(["delete", "cluster", "--name", KIND_CLUSTER_NAME])
        .output()
        .expect("failed to delete kind cluster");
    output_result(out);
}

fn cleanup_kind_no_output() {
    let _ = std::process::Command::new(KIND_BIN)
        .args(["delete", "cluster", "--name", KIND_CLUSTER_NAME])
        .output();
}

pub async fn install_crd(client: Client) {
    let crd_api = Api::<CustomResourceDefinition>::all(client);
    let crd = TenantCluster::crd();
    crd_api
        .patch(
            &crd.name_any(),
            &PatchParams::apply("tenantd-integration").force(),
            &Patch::Apply(crd),
        )
        .await
        .expect("failed to install crd");

    // Wait for the API server to serve the new kind.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
}

fn output_result(out: std::process::Output) {
    if out.status.success() {
        println!("STDOUT");
        println!("{}", String::from_utf8_lossy(&out.stdout));
    } else {
        println!("STDERR: exit status is {}", out.status);
        println!("{}", String::from_utf8_lossy(&out.stderr));
    }
}

pub fn test_tenant_cluster(name: &str, zones: &[&str]) -> TenantCluster {
    TenantCluster {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            finalizers: Some(vec![TENANT_CLUSTER_FINALIZER.to_string()]),
            ..Default::default()
        },
        spec: TenantClusterSpec {
            availability_zones: (!zones.is_empty())
                .then(|| zones.iter().map(|z| z.to_string()).collect()),
            network: None,
        },
        status: None,
    }
}

pub fn network_of(tc: &TenantCluster) -> Option<String> {
    tc.status_cidr().map(String::from)
}
