//! Domain model for the notification store.

pub mod notification;
pub mod template;
