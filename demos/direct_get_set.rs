//! Connects to a single Redis server and runs a handful of GET/SET/EXPIRE
//! calls. Run against a local `redis-server` with:
//!
//!   cargo run --example direct_get_set -- 127.0.0.1:6379

use std::env;
use std::time::Duration;

use naiad_redis::direct_client::DirectClient;
use naiad_redis::monitor::Monitor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let host = env::args().nth(1).unwrap_or_else(|| "127.0.0.1:6379".to_string());
    let monitor = Monitor::new();
    let client = DirectClient::connect(&host, Duration::from_secs(2), Duration::from_secs(30), monitor).await?;

    client.set("demo:greeting", "hello from naiad-redis").await?;
    let value = client.get("demo:greeting").await?;
    println!("demo:greeting = {value:?}");

    client.expire("demo:greeting", 60).await?;
    println!("ttl = {:?}", client.ttl("demo:greeting").await?);

    client.incr("demo:counter").await?;
    client.incr("demo:counter").await?;
    println!("demo:counter = {:?}", client.get("demo:counter").await?);

    client.delete(&["demo:greeting", "demo:counter"]).await?;
    client.close().await;
    Ok(())
}
