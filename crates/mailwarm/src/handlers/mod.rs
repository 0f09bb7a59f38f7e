//! Admin API handlers.

pub mod health;
pub mod inboxes;
pub mod peers;
pub mod run;
