// ============================================================================
// StockHub Core - Inventory Service
// File: crates/stockhub-core/src/services/inventory_service.rs
// Description: Products, tenant users, role assignments and stock movements
// ============================================================================

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use stockhub_shared::Pagination;

use crate::domain::{
    MovementReason, Product, ResourceKind, Role, StockMovement, TenantUser, UserRole,
};
use crate::error::DomainError;
use crate::tenancy::{IsolationGate, Query, QuotaEnforcer, RequestContext, SortDirection};

/// Partial product update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub reorder_level: Option<i32>,
    pub available: Option<bool>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
}

impl ProductChanges {
    fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(sku) = self.sku {
            product.sku = Some(sku.trim().to_uppercase());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(cost_price) = self.cost_price {
            product.cost_price = Some(cost_price);
        }
        if let Some(level) = self.reorder_level {
            product.reorder_level = Some(level);
        }
        if let Some(available) = self.available {
            product.available = available;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(supplier_id) = self.supplier_id {
            product.supplier_id = Some(supplier_id);
        }
    }
}

pub struct InventoryService {
    gate: Arc<IsolationGate>,
    quota: Arc<QuotaEnforcer>,
}

impl InventoryService {
    pub fn new(gate: Arc<IsolationGate>, quota: Arc<QuotaEnforcer>) -> Self {
        Self { gate, quota }
    }

    pub async fn create_product(&self, ctx: &RequestContext, product: Product) -> Result<Product, DomainError> {
        let tenant_id = ctx.tenant_id()?;
        let decision = self
            .quota
            .ensure_within_quota(tenant_id, ResourceKind::Product)
            .await?;

        let mut uow = self.gate.unit_of_work(ctx)?;
        let product = uow.add(product)?;
        uow.limit_rows::<Product>(ResourceKind::Product, decision.limit);
        uow.save().await?;
        info!(tenant_id = %tenant_id, product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, ctx: &RequestContext, id: Uuid) -> Result<Product, DomainError> {
        self.gate.get(ctx, id).await
    }

    /// Newest first. `search` matches the product name.
    pub async fn list_products(
        &self,
        ctx: &RequestContext,
        search: Option<&str>,
        page: Pagination,
    ) -> Result<Vec<Product>, DomainError> {
        let mut query = Query::<Product>::new()
            .order_by("created_at", SortDirection::Desc)
            .paginate(page);
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.contains("name", term);
        }
        self.gate.find(ctx, query).await
    }

    pub async fn update_product(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, DomainError> {
        let mut product: Product = self.gate.get(ctx, id).await?;
        changes.apply(&mut product);
        validator::Validate::validate(&product)?;
        self.gate.update(ctx, product).await
    }

    pub async fn delete_product(&self, ctx: &RequestContext, id: Uuid) -> Result<(), DomainError> {
        self.gate.soft_delete::<Product>(ctx, id).await?;
        info!(tenant_id = %ctx.tenant_id()?, product_id = %id, "Product deleted");
        Ok(())
    }

    /// Apply a stock change and record the movement in one save.
    pub async fn record_stock_movement(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
        quantity_change: i32,
        reason: MovementReason,
        notes: Option<String>,
    ) -> Result<StockMovement, DomainError> {
        let mut product: Product = self.gate.get(ctx, product_id).await?;
        let before = product.stock;
        let after = before
            .checked_add(quantity_change)
            .filter(|q| *q >= 0)
            .ok_or_else(|| {
                DomainError::ValidationError(format!(
                    "Stock for {} cannot go from {} by {}",
                    product_id, before, quantity_change
                ))
            })?;
        product.stock = after;

        let mut movement = StockMovement::new(product_id, before, quantity_change, reason);
        movement.notes = notes;

        let mut uow = self.gate.unit_of_work(ctx)?;
        let product = uow.update(product).await?;
        let movement = uow.add(movement)?;
        uow.save().await?;

        if product.is_below_reorder_level() {
            warn!(
                tenant_id = %ctx.tenant_id()?,
                product_id = %product.id,
                stock = product.stock,
                "Product below reorder level"
            );
        }
        Ok(movement)
    }

    /// Quota and email uniqueness are checked up front and again inside the
    /// commit.
    pub async fn add_user(&self, ctx: &RequestContext, user: TenantUser) -> Result<TenantUser, DomainError> {
        let tenant_id = ctx.tenant_id()?;
        let decision = self
            .quota
            .ensure_within_quota(tenant_id, ResourceKind::User)
            .await?;

        let taken = self
            .gate
            .count(ctx, Query::<TenantUser>::new().eq("email", &user.email))
            .await?;
        if taken > 0 {
            return Err(DomainError::ValidationError(format!(
                "User already exists: {}",
                user.email
            )));
        }

        let mut uow = self.gate.unit_of_work(ctx)?;
        let user = uow.add(user)?;
        uow.limit_rows::<TenantUser>(ResourceKind::User, decision.limit);
        uow.require_unique::<TenantUser>("email", &user.email)?;
        uow.save().await?;
        info!(tenant_id = %tenant_id, user_id = %user.id, "Tenant user added");
        Ok(user)
    }

    pub async fn remove_user(&self, ctx: &RequestContext, user_id: Uuid) -> Result<(), DomainError> {
        let assignments = self
            .gate
            .find(ctx, Query::<UserRole>::new().eq("user_id", user_id))
            .await?;

        let mut uow = self.gate.unit_of_work(ctx)?;
        uow.delete::<TenantUser>(user_id).await?;
        for assignment in &assignments {
            uow.unlink::<UserRole>(assignment.id).await?;
        }
        uow.save().await?;
        Ok(())
    }

    pub async fn create_role(&self, ctx: &RequestContext, role: Role) -> Result<Role, DomainError> {
        self.gate.insert(ctx, role).await
    }

    /// Both sides must be visible to the current tenant.
    pub async fn assign_role(&self, ctx: &RequestContext, user_id: Uuid, role_id: Uuid) -> Result<UserRole, DomainError> {
        self.gate.get::<TenantUser>(ctx, user_id).await?;
        self.gate.get::<Role>(ctx, role_id).await?;

        let existing = self
            .gate
            .find(
                ctx,
                Query::<UserRole>::new().eq("user_id", user_id).eq("role_id", role_id),
            )
            .await?;
        if let Some(assignment) = existing.into_iter().next() {
            return Ok(assignment);
        }

        self.gate.insert(ctx, UserRole::new(user_id, role_id)).await
    }

    pub async fn revoke_role(&self, ctx: &RequestContext, assignment_id: Uuid) -> Result<(), DomainError> {
        self.gate.hard_delete_link::<UserRole>(ctx, assignment_id).await
    }
}
