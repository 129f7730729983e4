use clap::Parser;

#[derive(Debug, Clone, Parser)]
pub struct ControllerCmd {
    #[arg(short = 'f', long, help = "Config file path for Kubernetes controller")]
    pub file: Option<String>,

    #[arg(long = "http-port", help = "HTTP server serving port")]
    pub http_port: Option<u32>,

    #[arg(
        long = "requeue-interval",
        help = "Interval in seconds to reconcile an allocated TenantCluster again"
    )]
    pub requeue_interval: Option<u64>,

    #[arg(long, help = "Pool every tenant network is allocated from (exp. 10.100.0.0/16)")]
    pub pool: Option<String>,

    #[arg(long = "prefix-len", help = "Prefix length of a tenant network")]
    pub prefix_len: Option<u8>,
}
