mod client;
mod document_repository;
mod interface_repository;
mod mapping_rule_repository;
mod payload_repository;

pub use client::*;
pub use document_repository::*;
pub use interface_repository::*;
pub use mapping_rule_repository::*;
pub use payload_repository::*;
