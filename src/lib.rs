//! Bit-exact codec for ISO 8583 (1987) financial transaction messages.
//!
//! Converts between a typed, field-indexed [`Message`] and its wire form:
//! MTI, primary/secondary/tertiary presence bitmaps, and the ordered
//! stream of present fields. Three orthogonal concerns compose per field:
//! bitmap-driven presence, the content encoding (ASCII, left- or
//! right-aligned BCD, raw binary), and, for variable-length kinds, a
//! separate length-prefix encoding. Alphanumeric text crosses the wire as
//! Windows-1252.
//!
//! Messages are encoded and decoded against a [`Schema`] of field
//! descriptors; a [`Parser`] registry maps MTIs to message prototypes so
//! incoming bytes can be dispatched without out-of-band configuration.
//!
//! ```
//! use iso8583_codec::{FieldKind, FieldSpec, Message, Schema};
//!
//! let schema = Schema::new()
//!     .with(FieldSpec::new(2, FieldKind::LlNumeric, 19))?
//!     .with(FieldSpec::new(3, FieldKind::Numeric, 6))?;
//!
//! let mut message = Message::new("0100", schema.clone());
//! message.set_text(2, "4276555555555555")?;
//! message.set_text(3, "000000")?;
//! let wire = message.encode()?;
//!
//! let mut loaded = Message::new("", schema);
//! loaded.decode(&wire)?;
//! assert_eq!(loaded.get_text(2), Some("4276555555555555"));
//! # Ok::<(), iso8583_codec::Iso8583Error>(())
//! ```

pub mod bitmap;
pub mod codec;
pub mod error;
pub mod field;
pub mod message;
pub mod parser;
pub mod schema;

pub use bitmap::{Bitmap, BitmapStyle, MAX_FIELD};
pub use error::{Iso8583Error, Result};
pub use field::{Encoding, FieldKind, FieldSpec, FieldValue};
pub use message::Message;
pub use parser::Parser;
pub use schema::{Schema, SchemaEntry};
