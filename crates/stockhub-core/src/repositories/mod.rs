//! Repository traits (ports) and in-memory adapters

pub mod tenant_repository;
pub mod entity_store;
pub mod rate_counter;
pub mod memory;

pub use tenant_repository::TenantRepository;
pub use entity_store::{ChangeBatch, EntityStore, RowWrite, StoredRow, WriteGuard};
pub use rate_counter::{RateCounter, RateWindowKey};
pub use memory::{InMemoryEntityStore, InMemoryRateCounter, InMemoryTenantRepository};
