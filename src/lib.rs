pub mod crawlers;
pub mod domain;
pub mod models;
pub mod processing;
pub mod repository;

/// Number of recommendations returned when the caller does not ask for a
/// specific count.
pub const DEFAULT_TOP_K: usize = 10;

/// Origin that relative catalog links are resolved against.
pub const DEFAULT_BASE_URL: &str = "https://www.shl.com";
