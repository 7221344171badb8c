//! API handlers module

pub mod health;
pub mod papers;
pub mod reviews;
pub mod users;
