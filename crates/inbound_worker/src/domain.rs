mod batch_accumulator;
mod entity_factory;
mod flush;
mod ingestion;
mod mapping_engine;
mod ports;
mod priority_router;
mod processing;
mod reprocessing;
mod upload;

pub use batch_accumulator::*;
pub use entity_factory::*;
pub use flush::*;
pub use ingestion::*;
pub use mapping_engine::*;
pub use ports::*;
pub use priority_router::*;
pub use processing::*;
pub use reprocessing::*;
pub use upload::*;
