//! Adapter implementations for port traits.
//!
//! - `live/`: Gemini, `OpenAI`, locator fetching, HTTP object store
//! - `recording/`: wrap a live generator and write a cassette
//! - `replaying/`: serve generator results from a cassette

pub mod live;
pub mod recording;
pub mod replaying;
