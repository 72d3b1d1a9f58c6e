//! Route handlers. Everything under `/api/1` runs behind the auth chain.

pub mod auth;
pub mod health;
