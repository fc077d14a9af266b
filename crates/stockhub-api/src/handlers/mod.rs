//! HTTP handlers

pub mod audit;
pub mod auth;
pub mod health;
pub mod products;
pub mod tenants;
