// handlers/mod.rs - two security tiers
//
// Public (no auth): /health, /api/auth/login
// Protected (JWT auth): every other /api/* route

pub mod protected;
pub mod public;
