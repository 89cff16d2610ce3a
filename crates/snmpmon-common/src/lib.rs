//! Data model shared by the snmpmon crates.
//!
//! Everything the engine emits to the monitoring backend (resources,
//! services, time series, inventory) and everything it receives from the
//! monitoring profile (metric definitions) lives in [`types`].

pub mod types;
