mod ack_handle;
mod dead_letter_producer;
mod intake_processor;
mod intake_publisher;
mod lane_consumer;
mod lane_publisher;

pub use ack_handle::*;
pub use dead_letter_producer::*;
pub use intake_processor::*;
pub use intake_publisher::*;
pub use lane_consumer::*;
pub use lane_publisher::*;
