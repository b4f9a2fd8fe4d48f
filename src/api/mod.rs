//! Purpose: Define the stable public Rust API boundary for rscpq.
//! Exports: Core types and operations needed by the CLI and tests.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path library users should rely on.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::decode::RequestDecoder;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::message::{Message, RscpValue, message_json, messages_json};
pub use crate::core::registry::{DataType, Registry, Tag};
