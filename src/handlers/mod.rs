pub mod events;
pub mod health;

pub use events::events_handler;
pub use health::{health_handler, ready_handler};
