//! # Tenancy engine
//!
//! Request → [`TenantResolver`] → [`TenantContext`] (inside a
//! [`RequestContext`]) → every data operation through the
//! [`IsolationGate`]; [`QuotaEnforcer`] guards creations and request rate;
//! [`AuditRecorder`] runs inside each unit-of-work save.

pub mod context;
pub mod query;
pub mod audit;
pub mod gate;
pub mod resolver;
pub mod quota;

pub use context::{Actor, RequestContext, RequestMetadata, TenantContext};
pub use query::{FieldFilter, FilterOp, Query, ScopedQuery, SortDirection, SortOrder};
pub use audit::{AuditRecorder, Change};
pub use gate::{IsolationGate, UnitOfWork};
pub use resolver::{CredentialClaims, ResolutionRequest, ResolutionSource, ResolvedTenant, TenantResolver};
pub use quota::{QuotaDecision, QuotaEnforcer, RateLimitStatus};
