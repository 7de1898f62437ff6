mod circuit_breaker;
mod governor;
mod retry;

pub use circuit_breaker::*;
pub use governor::*;
pub use retry::*;
