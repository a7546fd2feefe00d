// handlers/protected/mod.rs - handlers behind the JWT middleware
//
// `crud` serves every entity generically; the other modules add the
// workflow endpoints and the entities whose writes touch more than one row.

pub mod attendance;
pub mod auth;
pub mod crud;
pub mod products;
pub mod resources;
pub mod sales_outlets;
pub mod settings;
pub mod stats;
pub mod tickets;
pub mod transactions;
pub mod users;
