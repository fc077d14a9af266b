//! # StockHub Security
//! 
//! Bearer credentials: JWT carrying the actor (`sub`) and tenant-identity claims.

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtService};
