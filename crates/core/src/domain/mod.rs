pub mod genre;
pub mod playback;
pub mod user;
