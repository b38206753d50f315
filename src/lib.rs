//! Rentora - payment reconciliation service for a property-rental backend
//!
//! This library provides the payment side of the rental platform: provider
//! checkout (preference) creation, webhook notification parsing and signature
//! verification, and the reconciliation engine that applies authoritative
//! provider payment status to locally tracked payment intents and their
//! owning reservations and consultancies.

pub mod config;
pub mod db;
pub mod error;
pub mod gateways;
pub mod handlers;
pub mod models;
pub mod payments;
