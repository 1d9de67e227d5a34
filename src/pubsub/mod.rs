//! Publish/subscribe: a dedicated subscribe connection with its own
//! event-dispatch reader loop (Module L), and a thin auto-reconnecting
//! publish wrapper (Module M).

pub mod publish;
pub mod subscribe;

pub use publish::PublishClient;
pub use subscribe::{SubscribeClient, SubscribeEvent};
