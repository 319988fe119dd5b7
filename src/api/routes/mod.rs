//! API Routes
//!
//! Route handlers organized by functionality.

pub mod datasource;
pub mod health;
pub mod recordings;
