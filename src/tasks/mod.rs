//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache cleanup: drops age-expired cached results when a max age is configured

mod cleanup;

pub use cleanup::spawn_cleanup_task;
