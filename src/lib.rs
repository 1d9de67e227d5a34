//! naiad-redis: a multi-topology Redis client.
//!
//! The RESP wire codec ([`resp`]) and the multiplexed socket channel
//! ([`channel`]) sit at the bottom. [`direct_client`] wraps one socket
//! with command-execution, error classification, and a pluggable value
//! codec ([`codec`]). Everything above that is a different way of
//! routing to one or more [`direct_client::DirectClient`]s:
//!
//! - [`client_list`] — a list of direct clients with background rescue
//!   reconnection.
//! - [`hash_ring`] — consistent-hash placement across a client list.
//! - [`master_slave`] — read/write split across one master and its
//!   replicas.
//! - [`cluster`] — full Redis Cluster support: slot locator, node
//!   router with MOVED/ASK handling, and a scatter/gather client.
//! - [`pubsub`] — dedicated subscribe and publish connections.
//! - [`lock`] — single-instance and Redlock distributed locking.
//!
//! [`async_exec`] bounds fan-out concurrency, [`monitor`] collects
//! runtime counters, and [`config`] loads and validates the
//! configuration for all of the above.

pub mod async_exec;
pub mod channel;
pub mod client_list;
pub mod cluster;
pub mod codec;
pub mod commands;
pub mod config;
pub mod direct_client;
pub mod error;
pub mod exec;
pub mod hash_ring;
pub mod lock;
pub mod master_slave;
pub mod monitor;
pub mod pubsub;
pub mod resp;
pub mod utils;

pub use async_exec::BoundedExecutor;
pub use client_list::ClientList;
pub use cluster::ClusterClient;
pub use codec::{ObjectCodec, StringCodec, ValueCodec};
pub use config::Config;
pub use direct_client::DirectClient;
pub use error::{CoreError, CoreResult};
pub use hash_ring::HashRing;
pub use lock::{LockHandle, Redlock, SingleLock};
pub use master_slave::MasterSlaveClient;
pub use monitor::Monitor;
pub use pubsub::{PublishClient, SubscribeClient, SubscribeEvent};
