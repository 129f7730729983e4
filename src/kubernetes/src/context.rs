use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
pub use kube::{
    runtime::{controller::Action, events::Reporter},
    Client, Resource,
};
use serde::Serialize;
use tokio::sync::RwLock;

use tenantd_trace::error::TraceableError;

use crate::controller::{error::Error, metrics::Metrics};

pub trait Ctx {
    fn metrics(&self) -> &Metrics;
    fn client(&self) -> &Client;
    fn interval(&self) -> u64;
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    // Kubernetes client
    pub client: Client,
    // Reconcile interval
    pub interval: u64,
    // Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    // Prometheus metrics
    pub metrics: Metrics,
}

impl Ctx for Context {
    fn client(&self) -> &Client {
        &self.client
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn interval(&self) -> u64 {
        self.interval
    }
}

pub struct ContextWith<T: Clone> {
    pub(crate) inner: Context,
    pub component: T,
}

impl<T: Clone> Ctx for ContextWith<T> {
    fn client(&self) -> &Client {
        &self.inner.client
    }

    fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    fn interval(&self) -> u64 {
        self.inner.interval
    }
}

impl<T: Clone> ContextWith<T> {
    pub async fn record_event(&self) {
        self.inner.diagnostics.write().await.last_event = Utc::now();
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    pub registry: prometheus::Registry,
    metrics: Metrics,
}

impl State {
    pub fn new(component: &str) -> Result<State, Error> {
        let registry = prometheus::Registry::default();
        let metrics = Metrics::default()
            .register(&registry)
            .map_err(Error::Metrics)?;
        Ok(State {
            diagnostics: Arc::new(RwLock::new(Diagnostics::new(component.to_string()))),
            registry,
            metrics,
        })
    }

    /// Collectors shared with every context created from this state
    pub fn metrics_handle(&self) -> &Metrics {
        &self.metrics
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client, interval: u64) -> Arc<Context> {
        Arc::new(Context {
            client,
            interval,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }

    pub fn to_context_with<T: Clone>(
        &self,
        client: Client,
        interval: u64,
        component: T,
    ) -> Arc<ContextWith<T>> {
        Arc::new(ContextWith {
            inner: Context {
                client,
                interval,
                diagnostics: self.diagnostics.clone(),
                metrics: self.metrics.clone(),
            },
            component,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}

impl Diagnostics {
    pub fn new(component: String) -> Self {
        Self {
            last_event: Utc::now(),
            reporter: component.into(),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "tenantd".into(),
        }
    }
}

#[tracing::instrument(skip_all)]
pub fn error_policy<T: Resource<DynamicType = ()>, E: TraceableError, C: Ctx>(
    resource: Arc<T>,
    error: &E,
    ctx: Arc<C>,
) -> Action {
    tracing::warn!("reconcile failed: {:?}", error);
    ctx.metrics().reconcile_failure(resource.as_ref(), error);
    Action::requeue(Duration::from_secs(10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn works_state_exports_registered_metrics() {
        let state = State::new("tenantd-test").unwrap();
        state.metrics_handle().pool_exhausted_inc("10.100.0.0/16");

        let names: Vec<String> = state
            .metrics()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"tenantd_controller_pool_exhausted_total".to_string()));
    }

    #[test]
    fn works_states_have_separate_registries() {
        let a = State::new("a").unwrap();
        let b = State::new("b").unwrap();
        a.metrics_handle().allocated_networks_set("10.100.0.0/16", 2);
        assert_eq!(
            b.metrics_handle()
                .allocated_networks
                .with_label_values(&["10.100.0.0/16"])
                .get(),
            0
        );
    }
}
