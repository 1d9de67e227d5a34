//! Bootstraps from a set of cluster seed nodes and runs a scatter/gather
//! `mget` across however many slots the keys land on. Run against a local
//! Redis Cluster with:
//!
//!   cargo run --example cluster_scatter_gather -- 127.0.0.1:7000 127.0.0.1:7001

use std::env;
use std::time::Duration;

use naiad_redis::cluster::ClusterClient;
use naiad_redis::monitor::Monitor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let seeds: Vec<String> = env::args().skip(1).collect();
    let seeds = if seeds.is_empty() { vec!["127.0.0.1:7000".to_string()] } else { seeds };

    let monitor = Monitor::new();
    let client = ClusterClient::connect(seeds, Duration::from_secs(2), Duration::from_secs(30), monitor).await?;

    println!("routing table covers {} nodes", client.node_count().await);

    for i in 0..8 {
        client.set(&format!("demo:key:{i}"), &format!("value-{i}")).await?;
    }

    let keys: Vec<String> = (0..8).map(|i| format!("demo:key:{i}")).collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

    let result = client.mget(&key_refs).await;
    println!("fetched {} values across slot groups", result.values.len());
    for (key, value) in &result.values {
        println!("  {key} = {value:?}");
    }
    for (key, error) in &result.errors {
        println!("  {key} failed: {error}");
    }

    client.close().await?;
    Ok(())
}
