pub mod aggregator;
pub mod capture;
pub mod config;
pub mod core;
pub mod direction;
pub mod export;
pub mod flow;
pub mod geo;
pub mod stats;

pub use aggregator::Aggregator;
pub use config::Config;
pub use export::FlowRecord;
pub use self::core::{FlowKey, PacketEvent, Protocol};
