//! Error types for ISO 8583 encoding and decoding.

use thiserror::Error;

use crate::field::FieldKind;

/// Codec error types.
///
/// The rendered messages are part of the wire-level contract: upstream
/// systems pattern-match on them in logs, so the literals must not change.
#[derive(Debug, Error)]
pub enum Iso8583Error {
    /// Encoding was attempted on a message with an empty MTI.
    #[error("MTI is required")]
    MtiRequired,

    /// The MTI is not exactly four decimal digits.
    #[error("MTI is invalid")]
    MtiInvalid,

    /// A template was registered under a malformed MTI.
    #[error("MTI must be a 4 digit numeric field")]
    MtiNotFourDigits,

    /// The input ended before a complete MTI could be read.
    #[error("bad MTI raw data")]
    BadMtiRaw,

    /// The MTI encoding token or selection is not a supported one.
    #[error("invalid encode type")]
    InvalidEncodeType,

    /// The input ended before a complete field body could be read.
    #[error("bad raw data")]
    BadRawData,

    /// A fixed-length field descriptor has no declared length.
    #[error("missing length")]
    MissingLength,

    /// The field's content encoder is not one this kind supports.
    #[error("invalid encoder")]
    InvalidEncoder,

    /// The field's length-prefix encoder is not a supported one.
    #[error("invalid length encoder")]
    InvalidLengthEncoder,

    /// The value length does not fit the width of the length prefix.
    #[error("invalid length head")]
    InvalidLengthHead,

    /// A digit field carried non-digit bytes through a BCD conversion.
    #[error("value of field must be numeric")]
    ValueNotNumeric,

    #[error("length of value is longer than definition; type={kind}, def_len={def_len}, len={len}")]
    ValueTooLong {
        kind: FieldKind,
        def_len: usize,
        len: usize,
    },

    /// A length prefix was read but is not a decimal integer. Carries the
    /// literal prefix bytes for diagnosis.
    #[error("parse length head failed: {0}")]
    ParseLengthHead(String),

    /// The bitmap marks a field the schema does not describe.
    #[error("field {0} not defined")]
    FieldNotDefined(u32),

    /// A field-level error, tagged with the field number it occurred in.
    #[error("field {number}: {source}")]
    Field {
        number: u32,
        #[source]
        source: Box<Iso8583Error>,
    },

    #[error("no template registered for MTI: {0}")]
    TemplateNotFound(String),

    #[error("template already registered for MTI: {0}")]
    TemplateExists(String),

    /// Schema-description bug: the descriptors themselves are wrong, not the
    /// wire data.
    #[error("Critical error:{0}")]
    Critical(String),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Iso8583Error>;

impl Iso8583Error {
    /// Tag an error with the field number it occurred in. Critical errors
    /// surface verbatim and are never wrapped.
    pub(crate) fn in_field(self, number: u32) -> Iso8583Error {
        match self {
            err @ Iso8583Error::Critical(_) => err,
            err => Iso8583Error::Field {
                number,
                source: Box::new(err),
            },
        }
    }

    /// True for schema-description errors that indicate a programming bug
    /// rather than malformed wire data.
    pub fn is_critical(&self) -> bool {
        matches!(self, Iso8583Error::Critical(_))
    }
}
