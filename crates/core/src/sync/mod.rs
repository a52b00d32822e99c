pub mod engine;
pub mod genres;

pub use engine::{EmojiOutcome, QueueOutcome, SyncEngine};
