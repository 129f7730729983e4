// #[cfg(test)]
pub mod reconciler {
    use std::sync::Arc;

    use http::{Request, Response};
    use hyper::Body;
    use kube::{core::ObjectMeta, discovery::ApiResource, Client, Resource, ResourceExt};
    use prometheus::Registry;
    use serde::Serialize;

    use crate::{
        context::{Context, ContextWith},
        controller::metrics::Metrics,
        crd::tenant_cluster::{
            NetworkStatus, TenantCluster, TenantClusterSpec, TenantClusterStatus,
            TENANT_CLUSTER_FINALIZER,
        },
    };

    pub type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
    pub struct ApiServerVerifier(pub ApiServerHandle);

    pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("timeout on mock apiserver")
            .expect("scenario succeeded")
    }

    impl Context {
        pub fn test() -> (Arc<Self>, ApiServerVerifier, Registry) {
            let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
            let mock_client = Client::new(mock_service, "default");
            let registry = Registry::default();
            let ctx = Self {
                client: mock_client,
                metrics: Metrics::default().register(&registry).unwrap(),
                diagnostics: Arc::default(),
                interval: 30,
            };
            (Arc::new(ctx), ApiServerVerifier(handle), registry)
        }
    }

    impl<T: Clone> ContextWith<T> {
        pub fn test(component: T) -> (Arc<Self>, ApiServerVerifier, Registry) {
            let (ctx, verifier, registry) = Context::test();
            let ctx_with = Self {
                inner: Arc::unwrap_or_clone(ctx),
                component,
            };
            (Arc::new(ctx_with), verifier, registry)
        }
    }

    fn base_uri<T: Resource<DynamicType = ()>>() -> String {
        let api_resource = ApiResource::erase::<T>(&());
        if api_resource.group.is_empty() {
            format!("/api/{}", api_resource.api_version)
        } else {
            format!("/apis/{}", api_resource.api_version)
        }
    }

    fn collection_uri<T: Resource<DynamicType = ()>>(res: &T) -> String {
        let api_resource = ApiResource::erase::<T>(&());
        match res.namespace() {
            Some(ns) => format!(
                "{}/namespaces/{}/{}",
                base_uri::<T>(),
                ns,
                api_resource.plural
            ),
            None => format!("{}/{}", base_uri::<T>(), api_resource.plural),
        }
    }

    pub fn get_uri<T: Resource<DynamicType = ()>>(res: &T) -> String {
        format!("{}/{}", collection_uri(res), res.name_any())
    }

    pub fn put_uri<T: Resource<DynamicType = ()>>(res: &T, subresource: Option<&str>) -> String {
        let sub = match subresource {
            Some(s) => format!("/{s}"),
            None => String::new(),
        };
        format!("{}{}?", get_uri(res), sub)
    }

    fn list_uri<T: Resource<DynamicType = ()>>(res: &T) -> String {
        format!("{}?", collection_uri(res))
    }

    fn patch_uri<T: Resource<DynamicType = ()>>(res: &T) -> String {
        format!("{}?", get_uri(res))
    }

    pub fn assert_resource_request<T: Resource<DynamicType = ()>>(
        request: &Request<Body>,
        res: &T,
        subresource: Option<&str>,
        list: bool,
        label_selector: Option<String>,
        method: http::Method,
    ) {
        assert_eq!(request.method(), method);
        let uri = match method {
            http::Method::GET => {
                if list {
                    list_uri(res)
                } else {
                    get_uri(res)
                }
            }
            http::Method::PUT => put_uri(res, subresource),
            http::Method::PATCH => patch_uri(res),
            _ => panic!("unimplemented method"),
        };
        let uri = if let Some(selector) = label_selector {
            format!("{uri}{}", selector)
        } else {
            uri
        };
        assert_eq!(request.uri().to_string(), uri);
    }

    pub fn api_server_response_not_found<T: Resource<DynamicType = ()>>(res: &T) -> String {
        let api_resource = ApiResource::erase::<T>(&());
        format!(
            r#"{{
  "kind": "Status",
  "apiVersion": "v1",
  "metadata": {{}},
  "status": "Failure",
  "message": "{}.{} \"{}\" not found",
  "reason": "NotFound",
  "details": {{
    "name": "{}",
    "group": "{}",
    "kind": "{}"
  }},
  "code": 404
}}"#,
            api_resource.plural,
            api_resource.group,
            res.name_any(),
            res.name_any(),
            api_resource.group,
            api_resource.plural,
        )
    }

    pub fn api_server_response_conflict<T: Resource<DynamicType = ()>>(res: &T) -> String {
        let api_resource = ApiResource::erase::<T>(&());
        format!(
            r#"{{
  "kind": "Status",
  "apiVersion": "v1",
  "metadata": {{}},
  "status": "Failure",
  "message": "Operation cannot be fulfilled on {}.{} \"{}\": the object has been modified; please apply your changes to the latest version and try again",
  "reason": "Conflict",
  "details": {{
    "name": "{}",
    "group": "{}",
    "kind": "{}"
  }},
  "code": 409
}}"#,
            api_resource.plural,
            api_resource.group,
            res.name_any(),
            res.name_any(),
            api_resource.group,
            api_resource.plural,
        )
    }

    pub fn api_server_response_internal_error() -> String {
        r#"{
  "kind": "Status",
  "apiVersion": "v1",
  "metadata": {},
  "status": "Failure",
  "message": "etcdserver: request timed out",
  "reason": "InternalError",
  "code": 500
}"#
        .to_string()
    }

    pub fn api_server_response_resource<T: Resource<DynamicType = ()> + Serialize>(
        res: &T,
    ) -> Vec<u8> {
        serde_json::to_vec(res).unwrap()
    }

    pub fn test_tenant_cluster(name: &str) -> TenantCluster {
        TenantCluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                finalizers: Some(vec![TENANT_CLUSTER_FINALIZER.to_string()]),
                resource_version: Some("1".to_string()),
                ..Default::default()
            },
            spec: TenantClusterSpec::default(),
            status: None,
        }
    }

    pub fn test_tenant_cluster_with_network(name: &str, cidr: &str) -> TenantCluster {
        let mut tc = test_tenant_cluster(name);
        tc.status = Some(TenantClusterStatus {
            network: Some(NetworkStatus {
                cidr: cidr.to_string(),
                subnets: None,
            }),
        });
        tc
    }
}

pub mod test_trace {
    use tenantd_trace::init::{prepare_tracing, TraceConfig};

    pub fn test_trace() {
        prepare_tracing(TraceConfig {
            level: "debug".to_string(),
            format: "plain".to_string(),
            file: None,
        });
    }
}
