//! Relational store helpers.
//!
//! - Column lists derived from struct annotations
//! - Scalar codec types for timestamps and raw JSON
//! - Database-specific connection pools and an instrumented session
//! - Event receivers reporting statement timings and errors

pub mod codec;
pub mod columns;
pub mod events;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod session;
pub mod types;

pub use codec::{Codec, DriverValue, StorageCodec, TextCodec, decode_text_into};
pub use columns::{Columns, FieldDescriptor, FieldKind, SKIP_COLUMN, collect_columns};
pub use events::{
    Color, EventReceiver, Kvs, NullEventReceiver, SimpleEventReceiver, TracingEventReceiver,
};
pub use pool::{DatabaseType, DbPool};
pub use redops_derive::Columns;
pub use session::Session;
pub use types::{JsonText, TimeStamp};
