//! # enohub-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EntityRepository`: CRUD for entities
//!   - `DeviceRepository`: CRUD for devices, keyed by `(integration, unique_id)`
//!   - `EventPublisher`: publish domain events
//! - Define the **integration port** protocol adapters implement
//!   (`Integration`) and the registry context they are handed
//!   (`IntegrationContext`)
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `enohub-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
