//! # StockHub Core
//! 
//! Domain entities, repository ports, and the tenancy engine: tenant
//! resolution, the per-request tenant context, the isolation gate every
//! tenant-scoped read and write passes through, quota enforcement, and the
//! audit recorder.

pub mod domain;
pub mod services;
pub mod repositories;
pub mod tenancy;
pub mod error;

// Re-export domain entities
pub use domain::*;
pub use error::{DomainError, QuotaRejection};
