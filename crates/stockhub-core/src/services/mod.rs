//! Domain services (business logic)

pub mod subscription_service;
pub mod inventory_service;

pub use subscription_service::{NewTenant, SubscriptionService};
pub use inventory_service::{InventoryService, ProductChanges};
