//! Entity store: models, trait, Neo4j client, and test mock

pub mod client;
mod impl_entity_store;
pub mod models;
pub mod traits;

pub use client::Neo4jClient;
pub use models::*;
pub use traits::EntityStore;

#[cfg(test)]
pub(crate) mod mock;
