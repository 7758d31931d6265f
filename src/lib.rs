//! Inventory Sync - versioned catalog snapshots with rotating archives
//!
//! Periodically mirrors a paginated shop catalog into a per-category
//! directory of timestamped, deduplicated product snapshots, derives a
//! normalized inventory for the frontend and rolls everything into
//! size-capped zip archives under a cross-process lock.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_utils;
