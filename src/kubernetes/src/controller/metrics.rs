use kube::Resource;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, IntGaugeVec, Registry};
use tokio::time::Instant;

use tenantd_trace::error::TraceableError;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub reconciliations: IntCounterVec,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub allocated_networks: IntGaugeVec,
    pub pool_exhausted: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "tenantd_controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds"
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &[],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!(
                "tenantd_controller_reconciliation_errors_total",
                "Total count of reconciliation errors",
            ),
            &["resource", "instance", "error"],
        )
        .unwrap();
        let reconciliations = IntCounterVec::new(
            opts!(
                "tenantd_controller_reconciliation_total",
                "Total count of reconciliations",
            ),
            &["resource", "instance"],
        )
        .unwrap();
        let allocated_networks = IntGaugeVec::new(
            opts!(
                "tenantd_controller_allocated_networks",
                "The number of tenant networks allocated by this controller"
            ),
            &["pool"],
        )
        .unwrap();
        let pool_exhausted = IntCounterVec::new(
            opts!(
                "tenantd_controller_pool_exhausted_total",
                "Total count of allocations failed because the pool had no free subnet"
            ),
            &["pool"],
        )
        .unwrap();

        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            allocated_networks,
            pool_exhausted,
        }
    }
}

impl Metrics {
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.allocated_networks.clone()))?;
        registry.register(Box::new(self.pool_exhausted.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure<T: Resource<DynamicType = ()>, E: TraceableError>(
        &self,
        resource: &T,
        error: &E,
    ) {
        let object_ref = resource.object_ref(&());
        self.failures
            .with_label_values(&[
                &object_ref.kind.unwrap_or_default(),
                &object_ref.name.unwrap_or_default(),
                &error.metric_label(),
            ])
            .inc()
    }

    pub fn reconciliation<T: Resource<DynamicType = ()>>(&self, resource: &T) {
        let object_ref = resource.object_ref(&());
        self.reconciliations
            .with_label_values(&[
                &object_ref.kind.unwrap_or_default(),
                &object_ref.name.unwrap_or_default(),
            ])
            .inc()
    }

    pub fn allocated_networks_inc(&self, pool: &str) {
        self.allocated_networks.with_label_values(&[pool]).inc()
    }

    pub fn allocated_networks_set(&self, pool: &str, val: i64) {
        self.allocated_networks.with_label_values(&[pool]).set(val)
    }

    pub fn pool_exhausted_inc(&self, pool: &str) {
        self.pool_exhausted.with_label_values(&[pool]).inc()
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.with_label_values(&[]).observe(duration);
    }
}
