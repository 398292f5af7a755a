//! Durable event queue shared by producers and the sync engine.

pub mod event_queue;


pub use event_queue::{EventQueue, EventStamper, DEFAULT_CAPACITY, QUEUE_FILE};
