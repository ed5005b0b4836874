//! Identifier extraction and metadata parsing.
//!
//! - [`identify()`] turns a video's file stem and parent directory name into
//!   a [`Code`](models::Code), or explains why it can't.
//! - [`javbus`] and [`javdb`] turn detail pages into
//!   [`Metadata`](models::Metadata). Parsing is pure: it depends only on the
//!   document bytes and the URL they came from.

mod consts;
pub mod error;
mod identify;
pub mod javbus;
pub mod javdb;
pub mod models;
mod text;

pub use crate::identify::{Unidentified, candidates, identify};
pub use crate::models::{Code, Metadata};
