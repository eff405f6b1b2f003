//! board-speaker-rs: reads bulletin-board threads aloud.
//!
//! Raw board records are parsed into posts, their markup is transcoded into
//! speakable text and a display fragment, and new posts are spoken through
//! a local Kokoro voice or handed to a Bouyomi-chan relay.

pub mod api;
pub mod board;
pub mod config;
pub mod history;
pub mod reader;
pub mod speech;
