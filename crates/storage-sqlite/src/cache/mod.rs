//! SQLite storage for cached cloud entities.

pub mod model;
pub mod repository;

pub use model::{
    CachedDeviceDB, CachedEventDB, CachedIncidentDB, CachedOrganizationDB, CachedUserDB,
};
pub use repository::CacheRepository;
