//! # Local Records
//!
//! Repository seams for the tenant configuration and rotation reminder
//! records, with in-memory implementations.

pub mod memory;
pub mod repository;

pub use memory::{InMemoryRotationReminderRepository, InMemoryTenantConfigRepository};
pub use repository::{RotationReminderRepository, TenantConfigRepository};
