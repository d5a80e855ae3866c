//! Live adapters that talk to real services.

pub mod gemini;
pub mod http_object_store;
pub mod locator_source;
pub mod openai;
pub mod unconfigured;
