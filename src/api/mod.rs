// =============================================================================
// HTTP surface
// =============================================================================

pub mod auth;
pub mod rest;
