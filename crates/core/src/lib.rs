pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod status;
pub mod sync;

pub use domain::genre::GenreMapping;
pub use domain::playback::{PlaybackSnapshot, PresenceStatus, TokenGrant};
pub use domain::user::{UserIdentity, UserRecord};
pub use errors::{ProviderError, PublishError, StoreError};
pub use ports::{GenreMappingStore, PlaybackProvider, PresencePublisher, UserStore};
pub use sync::{EmojiOutcome, QueueOutcome, SyncEngine};

pub use chrono;
