//! Entities stored by the database layer

pub mod message;

pub use message::ChatMessage;
