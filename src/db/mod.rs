//! Credential store for the attendance server.
//!
//! Holds the `User` record and the `UserStore` trait the auth core talks to,
//! with a Postgres implementation and an in-memory one.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryUserStore;
pub use models::{PublicUser, Role, User};
pub use operations::PgUserStore;
pub use store::UserStore;
