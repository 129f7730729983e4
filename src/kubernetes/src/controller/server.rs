use std::sync::Arc;

use actix_web::{
    get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use prometheus::{Encoder, TextEncoder};
use tenantd_ipam::SubnetAllocator;
use tenantd_trace::init::{prepare_tracing, TraceConfig};

use crate::context::State;

use super::{
    config::Config,
    error::Error,
    reconciler::{self, tenant_cluster::NetworkPool},
};

pub fn start(config: Config, trace: TraceConfig) -> Result<(), Error> {
    prepare_tracing(trace);

    let controller = Controller::new(config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::StdIo)?
        .block_on(run(controller))
}

#[tracing::instrument(skip_all)]
async fn run(c: Controller) -> Result<(), Error> {
    // Initiatilize Kubernetes controller state
    let state = State::new("tenantd-controller")?;

    let server_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(server_state.clone()))
            .service(index)
            .service(health)
            .service(ready)
            .service(metrics_)
            .wrap(
                middleware::Logger::default()
                    .exclude("/healthz")
                    .exclude("/readyz"),
            )
    })
    .bind(format!("0.0.0.0:{}", c.http_port))
    .map_err(Error::StdIo)?
    .shutdown_timeout(5);

    // One allocator per process so that every reconcile shares its lock.
    let network_pool = NetworkPool::new(Arc::new(SubnetAllocator::new()), c.pool, c.prefix_len);

    tracing::info!("Start TenantCluster reconciler");
    let tenant_cluster_state = state.clone();
    tokio::spawn(async move {
        reconciler::tenant_cluster::run(tenant_cluster_state, c.requeue_interval, network_pool)
            .await;
    });

    server.run().await.map_err(Error::StdIo)
}

pub struct Controller {
    http_port: u32,
    requeue_interval: u64,
    pool: ipnet::IpNet,
    prefix_len: u8,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, Error> {
        let (pool, prefix_len) = config.network.validate()?;
        tracing::info!(%pool, prefix_len, "tenant network pool");
        Ok(Self {
            http_port: config.http_port,
            requeue_interval: config.requeue_interval,
            pool,
            prefix_len,
        })
    }
}

#[get("/healthz")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/readyz")]
async fn ready(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("ready")
}

#[get("/metrics")]
async fn metrics_(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok().body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}
