//! PostgreSQL repository implementations

pub mod tenant_repo_impl;
pub mod entity_store_impl;

pub use tenant_repo_impl::PgTenantRepository;
pub use entity_store_impl::PgEntityStore;
