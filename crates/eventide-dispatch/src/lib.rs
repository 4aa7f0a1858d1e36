//! The Action Dispatcher (C3) and its concrete transports: a Kafka-backed `BusPort` and a
//! `reqwest`-backed `HttpPort` for the WEBHOOK and HTTP action types.

pub mod dispatcher;
pub mod http_client;
pub mod kafka_bus;

pub use dispatcher::ActionDispatcher;
pub use http_client::ReqwestHttpClient;
pub use kafka_bus::{KafkaBus, KafkaBusConfig};
