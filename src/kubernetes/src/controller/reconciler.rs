pub mod tenant_cluster;
