//! Request middleware. Order matters: tenant resolution runs before rate limiting.

pub mod rate_limit;
pub mod tenant_context;

pub use rate_limit::rate_limit;
pub use tenant_context::tenant_context;
