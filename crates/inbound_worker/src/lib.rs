pub mod domain;
pub mod inbound_worker;
pub mod nats;

pub use domain::*;
pub use inbound_worker::*;
pub use nats::*;
