//! Sidecar rendering: the `<CODE>.nfo` document and `poster.jpg`.

pub mod error;
mod nfo;
mod poster;

pub use crate::nfo::NfoRenderer;
pub use crate::poster::poster_from_fanart;

pub const NFO_EXTENSION: &str = "nfo";
pub const POSTER_FILE: &str = "poster.jpg";
pub const FANART_FILE: &str = "fanart.jpg";
