//! # StockHub Core - Domain Module
//! 
//! Domain entities for the StockHub tenancy engine.

pub mod entity;
pub mod tenant;
pub mod catalog;
pub mod sales;
pub mod stock;
pub mod access;
pub mod audit_log;
pub mod usage;

// Re-export all entities and enums
pub use entity::{EntityKind, LinkRecord, TenantScoped};
pub use tenant::{Limit, ResourceLimits, SubscriptionTier, Tenant, TenantId};
pub use catalog::{Category, Product, Supplier};
pub use sales::{Customer, Order, OrderStatus, OrderType};
pub use stock::{MovementReason, StockMovement};
pub use access::{Role, TenantRole, TenantUser, UserRole};
pub use audit_log::{AuditAction, AuditLogEntry};
pub use usage::{ResourceKind, UsageSnapshot};
