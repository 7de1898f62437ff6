mod document_type;
mod envelope;
mod interface;
mod mapping_rule;
mod priority;
mod record;
mod result;
mod stored_payload;

pub use document_type::*;
pub use envelope::*;
pub use interface::*;
pub use mapping_rule::*;
pub use priority::*;
pub use record::*;
pub use result::*;
pub use stored_payload::*;
