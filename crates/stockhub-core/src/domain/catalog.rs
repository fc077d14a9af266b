// ============================================================================
// StockHub Core - Catalog Entities
// File: crates/stockhub-core/src/domain/catalog.rs
// Description: Product, category and supplier
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use stockhub_shared::{new_id, AuditFields, EntityId};

use super::entity::{impl_tenant_scoped, EntityKind};
use super::TenantId;

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description too long"))]
    pub description: Option<String>,

    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub stock: i32,
    pub reorder_level: Option<i32>,
    pub available: bool,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Product {
    pub fn new(name: String, sku: Option<String>, price: Decimal) -> Result<Self, validator::ValidationErrors> {
        let product = Self {
            id: new_id(),
            tenant_id: None,
            name: name.trim().to_string(),
            description: None,
            sku: sku.map(|s| s.trim().to_uppercase()),
            barcode: None,
            price,
            cost_price: None,
            stock: 0,
            reorder_level: None,
            available: true,
            category_id: None,
            supplier_id: None,
            audit: AuditFields::default(),
        };

        product.validate()?;
        Ok(product)
    }

    pub fn is_below_reorder_level(&self) -> bool {
        self.reorder_level.is_some_and(|level| self.stock <= level)
    }
}

impl_tenant_scoped!(Product, EntityKind::Product);

/// Category entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Category {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 1, max = 100, message = "Category name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description too long"))]
    pub description: Option<String>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Category {
    pub fn new(name: String, description: Option<String>) -> Result<Self, validator::ValidationErrors> {
        let category = Self {
            id: new_id(),
            tenant_id: None,
            name: name.trim().to_string(),
            description,
            audit: AuditFields::default(),
        };
        category.validate()?;
        Ok(category)
    }
}

impl_tenant_scoped!(Category, EntityKind::Category);

/// Supplier entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Supplier {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 1, max = 200, message = "Supplier name must be between 1 and 200 characters"))]
    pub name: String,

    pub contact_name: Option<String>,

    #[validate(email(message = "Supplier email is invalid"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Supplier {
    pub fn new(name: String, email: Option<String>) -> Result<Self, validator::ValidationErrors> {
        let supplier = Self {
            id: new_id(),
            tenant_id: None,
            name: name.trim().to_string(),
            contact_name: None,
            email,
            phone: None,
            city: None,
            country: None,
            audit: AuditFields::default(),
        };
        supplier.validate()?;
        Ok(supplier)
    }
}

impl_tenant_scoped!(Supplier, EntityKind::Supplier);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::TenantScoped;
    use rust_decimal::Decimal;

    #[test]
    fn test_new_product_is_unstamped() {
        let product = Product::new("Widget".to_string(), Some("wd-1".to_string()), Decimal::new(1000, 2)).unwrap();
        assert!(product.tenant_id().is_none());
        assert_eq!(product.sku.as_deref(), Some("WD-1"));
        assert!(!product.is_deleted());
    }

    #[test]
    fn test_product_audit_fields_are_flattened() {
        let product = Product::new("Widget".to_string(), None, Decimal::new(1000, 2)).unwrap();
        let value = serde_json::to_value(&product).unwrap();
        assert!(value.get("modified_at").is_some());
        assert!(value.get("audit").is_none());
        assert_eq!(value["price"], serde_json::json!("10.00"));
    }

    #[test]
    fn test_reorder_level() {
        let mut product = Product::new("Widget".to_string(), None, Decimal::ONE).unwrap();
        assert!(!product.is_below_reorder_level());
        product.reorder_level = Some(5);
        product.stock = 5;
        assert!(product.is_below_reorder_level());
    }

    #[test]
    fn test_supplier_email_validation() {
        assert!(Supplier::new("Bolt Co".to_string(), Some("bad".to_string())).is_err());
        assert!(Supplier::new("Bolt Co".to_string(), Some("sales@bolt.co".to_string())).is_ok());
    }
}
