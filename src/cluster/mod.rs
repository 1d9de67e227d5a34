//! Redis Cluster support: slot computation (Module H), redirect parsing,
//! node routing (Module I), and the scatter/gather client (Module J).

pub mod client;
pub mod redirect;
pub mod router;
pub mod slot;

pub use client::ClusterClient;
pub use router::NodeRouter;
