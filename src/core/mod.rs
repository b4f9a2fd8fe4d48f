// Core modules implementing the registry, message model, and request decoding.
pub mod decode;
pub mod error;
pub mod message;
pub mod registry;
