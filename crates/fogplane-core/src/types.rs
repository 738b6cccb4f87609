//! Identifiers shared across fogplane crates.

/// Authenticated user id, resolved by the CLI or API before reaching the core.
pub type UserId = u64;

/// UUID of a microservice (user or network).
pub type MicroserviceUuid = String;

/// UUID of a fog node.
pub type FogUuid = String;

/// Integer id of a catalog item.
pub type CatalogItemId = u64;
