// ============================================================================
// StockHub Core - Sales Entities
// File: crates/stockhub-core/src/domain/sales.rs
// Description: Customer and order
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use stockhub_shared::{new_id, AuditFields, EntityId};

use super::entity::{impl_tenant_scoped, EntityKind};
use super::TenantId;

/// Customer entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Customer {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 1, max = 200, message = "Customer name must be between 1 and 200 characters"))]
    pub name: String,

    #[validate(email(message = "Customer email is invalid"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub country: Option<String>,
    pub credit_limit: Decimal,
    pub is_active: bool,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Customer {
    pub fn new(name: String, email: Option<String>) -> Result<Self, validator::ValidationErrors> {
        let customer = Self {
            id: new_id(),
            tenant_id: None,
            name: name.trim().to_string(),
            email: email.map(|e| e.trim().to_lowercase()),
            phone: None,
            company_name: None,
            billing_address: None,
            shipping_address: None,
            country: None,
            credit_limit: Decimal::ZERO,
            is_active: true,
            audit: AuditFields::default(),
        };
        customer.validate()?;
        Ok(customer)
    }
}

impl_tenant_scoped!(Customer, EntityKind::Customer);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Sales,
    Purchase,
    Return,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    Confirmed,
    Shipped,
    Completed,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 1, max = 50, message = "Order number must be between 1 and 50 characters"))]
    pub order_number: String,

    pub order_type: OrderType,
    pub status: OrderStatus,
    pub customer_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub order_date: DateTime<Utc>,
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Order {
    pub fn new(order_number: String, order_type: OrderType) -> Result<Self, validator::ValidationErrors> {
        let order = Self {
            id: new_id(),
            tenant_id: None,
            order_number: order_number.trim().to_string(),
            order_type,
            status: OrderStatus::default(),
            customer_id: None,
            supplier_id: None,
            order_date: Utc::now(),
            sub_total: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            notes: None,
            audit: AuditFields::default(),
        };
        order.validate()?;
        Ok(order)
    }

    pub fn set_amounts(&mut self, sub_total: Decimal, tax_amount: Decimal) {
        self.sub_total = sub_total;
        self.tax_amount = tax_amount;
        self.total_amount = sub_total + tax_amount;
    }
}

impl_tenant_scoped!(Order, EntityKind::Order);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_totals() {
        let mut order = Order::new("SO-1001".to_string(), OrderType::Sales).unwrap();
        order.set_amounts(Decimal::new(10000, 2), Decimal::new(1100, 2));
        assert_eq!(order.total_amount, Decimal::new(11100, 2));
        assert_eq!(order.status, OrderStatus::Draft);
    }

    #[test]
    fn test_customer_email_normalized() {
        let customer = Customer::new("Jo".to_string(), Some(" Jo@Shop.io ".to_string())).unwrap();
        assert_eq!(customer.email.as_deref(), Some("jo@shop.io"));
    }
}
