mod object_store;
mod payload_store;

pub use object_store::*;
pub use payload_store::*;
