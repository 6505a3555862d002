pub mod db;
pub mod dialect;
pub mod entities;
pub mod error;
pub mod executor;
pub mod loader;
pub mod record;
pub mod schema;
