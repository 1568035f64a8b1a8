//! Field descriptors and the per-kind wire codecs.
//!
//! A [`FieldSpec`] is the static description of one data element: its
//! number, kind, declared length, and the encoder pair (content + length
//! prefix). Encoding and decoding of a single field happens here; the
//! bitmap-driven walk over a whole message lives in [`crate::message`].

use std::fmt;

use crate::codec;
use crate::error::{Iso8583Error, Result};

/// Primary encodings for field content, length prefixes, and the MTI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Printable ASCII; text fields go through Windows-1252.
    #[default]
    Ascii,
    /// Left-aligned BCD; odd digit counts pad a trailing zero nibble.
    Bcd,
    /// Right-aligned BCD; odd digit counts pad a leading zero nibble.
    Rbcd,
}

impl Encoding {
    /// Parse a schema-metadata encoder token. Unrecognized tokens yield
    /// `None` and are rejected at the first encode/decode touching the
    /// field.
    pub fn from_token(token: &str) -> Option<Encoding> {
        match token {
            "ascii" => Some(Encoding::Ascii),
            "bcd" => Some(Encoding::Bcd),
            "rbcd" => Some(Encoding::Rbcd),
            _ => None,
        }
    }
}

/// The eight field kinds of the 1987 wire grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed-length digit string.
    Numeric,
    /// Fixed-length text, space-padded to its declared length.
    Alphanumeric,
    /// Fixed-length raw bytes.
    Binary,
    /// Digit string with a 2-digit length prefix.
    LlNumeric,
    /// Digit string with a 3-digit length prefix.
    LllNumeric,
    /// Bytes with a 2-digit length prefix.
    LlVar,
    /// Bytes with a 3-digit length prefix.
    LllVar,
    /// Bytes with an 8-digit length prefix.
    L8Var,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // These names appear inside error messages that upstream systems
        // match on.
        let name = match self {
            FieldKind::Numeric => "Numeric",
            FieldKind::Alphanumeric => "Alphanumeric",
            FieldKind::Binary => "Binary",
            FieldKind::LlNumeric => "Llnumeric",
            FieldKind::LllNumeric => "Lllnumeric",
            FieldKind::LlVar => "Llvar",
            FieldKind::LllVar => "Lllvar",
            FieldKind::L8Var => "L8var",
        };
        f.write_str(name)
    }
}

impl FieldKind {
    /// True for the kinds that carry a length prefix.
    pub fn is_variable(&self) -> bool {
        !matches!(
            self,
            FieldKind::Numeric | FieldKind::Alphanumeric | FieldKind::Binary
        )
    }

    /// True for kinds whose value is text, false for raw-byte kinds.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            FieldKind::Numeric
                | FieldKind::Alphanumeric
                | FieldKind::LlNumeric
                | FieldKind::LllNumeric
        )
    }

    /// Width of the ASCII length prefix in digits.
    fn head_digits(&self) -> usize {
        match self {
            FieldKind::LlNumeric | FieldKind::LlVar => 2,
            FieldKind::LllNumeric | FieldKind::LllVar => 3,
            FieldKind::L8Var => 8,
            _ => 0,
        }
    }

    /// Width of a BCD length prefix in bytes.
    fn head_bcd_bytes(&self) -> usize {
        (self.head_digits() + 1) / 2
    }

    /// Largest value length the prefix can express.
    fn head_ceiling(&self) -> usize {
        match self.head_digits() {
            2 => 99,
            3 => 999,
            _ => 99_999_999,
        }
    }
}

/// A field value: text for the numeric and alphanumeric families, raw
/// bytes for binary and the variable byte kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Empty values are treated as absent from the bitmap.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Bytes(b) => b.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        FieldValue::Bytes(b)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(b: &[u8]) -> Self {
        FieldValue::Bytes(b.to_vec())
    }
}

/// Static description of one data element.
///
/// `content` and `length_head` are `None` when the schema metadata carried
/// a token the loader did not recognize; the error surfaces at the first
/// encode or decode touching the field, not at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field number, 2..=192 excluding 65 (1 and 65 announce bitmaps).
    pub number: u32,
    pub kind: FieldKind,
    /// Exact length for fixed kinds, optional cap for variable kinds.
    pub max_length: Option<usize>,
    pub content: Option<Encoding>,
    pub length_head: Option<Encoding>,
}

impl FieldSpec {
    /// Descriptor with ASCII content and ASCII length prefix.
    pub fn new(number: u32, kind: FieldKind, max_length: impl Into<Option<usize>>) -> Self {
        Self {
            number,
            kind,
            max_length: max_length.into(),
            content: Some(Encoding::Ascii),
            length_head: Some(Encoding::Ascii),
        }
    }

    pub fn with_content(mut self, encoding: Encoding) -> Self {
        self.content = Some(encoding);
        self
    }

    pub fn with_length_head(mut self, encoding: Encoding) -> Self {
        self.length_head = Some(encoding);
        self
    }

    /// Encode `value` to its wire form.
    pub fn encode(&self, value: &FieldValue) -> Result<Vec<u8>> {
        match self.kind {
            FieldKind::Numeric => self.encode_fixed_numeric(self.expect_text(value)?),
            FieldKind::Alphanumeric => self.encode_alphanumeric(self.expect_text(value)?),
            FieldKind::Binary => self.encode_binary(self.expect_bytes(value)?),
            FieldKind::LlNumeric | FieldKind::LllNumeric => {
                self.encode_var_numeric(self.expect_text(value)?)
            }
            FieldKind::LlVar | FieldKind::LllVar | FieldKind::L8Var => {
                self.encode_var_bytes(self.expect_bytes(value)?)
            }
        }
    }

    /// Decode one field from the head of `raw`. Returns the value and the
    /// number of bytes consumed.
    pub fn decode(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        match self.kind {
            FieldKind::Numeric => self.decode_fixed_numeric(raw),
            FieldKind::Alphanumeric => self.decode_alphanumeric(raw),
            FieldKind::Binary => self.decode_binary(raw),
            FieldKind::LlNumeric | FieldKind::LllNumeric => self.decode_var_numeric(raw),
            FieldKind::LlVar | FieldKind::LllVar | FieldKind::L8Var => self.decode_var_bytes(raw),
        }
    }

    fn expect_text<'a>(&self, value: &'a FieldValue) -> Result<&'a str> {
        value.as_text().ok_or_else(|| {
            Iso8583Error::Critical(format!("wrong value kind for field {}", self.number))
        })
    }

    fn expect_bytes<'a>(&self, value: &'a FieldValue) -> Result<&'a [u8]> {
        value.as_bytes().ok_or_else(|| {
            Iso8583Error::Critical(format!("wrong value kind for field {}", self.number))
        })
    }

    fn declared_length(&self) -> Result<usize> {
        self.max_length.ok_or(Iso8583Error::MissingLength)
    }

    fn too_long(&self, len: usize, def_len: usize) -> Iso8583Error {
        Iso8583Error::ValueTooLong {
            kind: self.kind,
            def_len,
            len,
        }
    }

    fn encode_fixed_numeric(&self, digits: &str) -> Result<Vec<u8>> {
        let max = self.declared_length()?;
        match self.content {
            Some(Encoding::Ascii) => {
                if digits.len() > max {
                    return Err(self.too_long(digits.len(), max));
                }
                Ok(format!("{digits:0>max$}").into_bytes())
            }
            // BCD packs two digits per byte, so the cap is on packed width
            Some(Encoding::Bcd) => {
                if (digits.len() + 1) / 2 > (max + 1) / 2 {
                    return Err(self.too_long(digits.len(), max));
                }
                codec::lbcd(pad_digits(digits, max).as_bytes())
            }
            Some(Encoding::Rbcd) => {
                if (digits.len() + 1) / 2 > (max + 1) / 2 {
                    return Err(self.too_long(digits.len(), max));
                }
                codec::rbcd(pad_digits(digits, max).as_bytes())
            }
            None => Err(Iso8583Error::InvalidEncoder),
        }
    }

    fn decode_fixed_numeric(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        let max = self.declared_length()?;
        match self.content {
            Some(Encoding::Ascii) => {
                if raw.len() < max {
                    return Err(Iso8583Error::BadRawData);
                }
                let text = String::from_utf8_lossy(&raw[..max]).into_owned();
                Ok((FieldValue::Text(text), max))
            }
            Some(Encoding::Bcd) => {
                let packed = (max + 1) / 2;
                if raw.len() < packed {
                    return Err(Iso8583Error::BadRawData);
                }
                let digits = codec::bcdl_to_ascii(&raw[..packed], max)?;
                Ok((FieldValue::Text(ascii_digits(digits)), packed))
            }
            Some(Encoding::Rbcd) => {
                let packed = (max + 1) / 2;
                if raw.len() < packed {
                    return Err(Iso8583Error::BadRawData);
                }
                let digits = codec::bcdr_to_ascii(&raw[..packed], max)?;
                Ok((FieldValue::Text(ascii_digits(digits)), packed))
            }
            None => Err(Iso8583Error::InvalidEncoder),
        }
    }

    fn encode_alphanumeric(&self, text: &str) -> Result<Vec<u8>> {
        let max = self.declared_length()?;
        let wire = codec::utf8_to_windows1252(text);
        if wire.len() > max {
            return Err(self.too_long(wire.len(), max));
        }
        // value is right-justified: pad on the left with spaces
        let mut out = vec![b' '; max - wire.len()];
        out.extend_from_slice(&wire);
        Ok(out)
    }

    fn decode_alphanumeric(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        let max = self.declared_length()?;
        if raw.len() < max {
            return Err(Iso8583Error::BadRawData);
        }
        // padding is preserved verbatim
        let text = codec::windows1252_to_utf8(&raw[..max]);
        Ok((FieldValue::Text(text), max))
    }

    fn encode_binary(&self, data: &[u8]) -> Result<Vec<u8>> {
        let max = self.declared_length()?;
        if data.len() > max {
            return Err(self.too_long(data.len(), max));
        }
        Ok(data.to_vec())
    }

    fn decode_binary(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        let max = self.declared_length()?;
        if raw.len() < max {
            return Err(Iso8583Error::BadRawData);
        }
        Ok((FieldValue::Bytes(raw[..max].to_vec()), max))
    }

    fn encode_var_numeric(&self, digits: &str) -> Result<Vec<u8>> {
        if let Some(max) = self.max_length {
            if digits.len() > max {
                return Err(self.too_long(digits.len(), max));
            }
        }
        let body = match self.content {
            Some(Encoding::Ascii) => digits.as_bytes().to_vec(),
            Some(Encoding::Bcd) => codec::lbcd(digits.as_bytes())?,
            Some(Encoding::Rbcd) => codec::rbcd(digits.as_bytes())?,
            None => return Err(Iso8583Error::InvalidEncoder),
        };
        // the prefix counts digits, not packed bytes
        let mut out = self.encode_head(digits.len())?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decode_var_numeric(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        let (count, mut read) = self.decode_head(raw)?;
        match self.content {
            Some(Encoding::Ascii) => {
                if raw.len() < read + count {
                    return Err(Iso8583Error::BadRawData);
                }
                let text = String::from_utf8_lossy(&raw[read..read + count]).into_owned();
                read += count;
                Ok((FieldValue::Text(text), read))
            }
            Some(Encoding::Bcd) => {
                let packed = (count + 1) / 2;
                if raw.len() < read + packed {
                    return Err(Iso8583Error::BadRawData);
                }
                let digits = codec::bcdl_to_ascii(&raw[read..read + packed], count)?;
                read += packed;
                Ok((FieldValue::Text(ascii_digits(digits)), read))
            }
            Some(Encoding::Rbcd) => {
                let packed = (count + 1) / 2;
                if raw.len() < read + packed {
                    return Err(Iso8583Error::BadRawData);
                }
                let digits = codec::bcdr_to_ascii(&raw[read..read + packed], count)?;
                read += packed;
                Ok((FieldValue::Text(ascii_digits(digits)), read))
            }
            None => Err(Iso8583Error::InvalidEncoder),
        }
    }

    fn encode_var_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let wire = codec::bytes_to_windows1252(data);
        if let Some(max) = self.max_length {
            if wire.len() > max {
                return Err(self.too_long(wire.len(), max));
            }
        }
        if self.content != Some(Encoding::Ascii) {
            return Err(Iso8583Error::InvalidEncoder);
        }
        let mut out = self.encode_head(wire.len())?;
        out.extend_from_slice(&wire);
        Ok(out)
    }

    fn decode_var_bytes(&self, raw: &[u8]) -> Result<(FieldValue, usize)> {
        let (count, read) = self.decode_head(raw)?;
        if self.content != Some(Encoding::Ascii) {
            return Err(Iso8583Error::InvalidEncoder);
        }
        if raw.len() < read + count {
            return Err(Iso8583Error::BadRawData);
        }
        let text = codec::windows1252_to_utf8(&raw[read..read + count]);
        Ok((FieldValue::Bytes(text.into_bytes()), read + count))
    }

    /// Emit the length prefix for a value of `count` digits/bytes.
    fn encode_head(&self, count: usize) -> Result<Vec<u8>> {
        if count > self.kind.head_ceiling() {
            return Err(Iso8583Error::InvalidLengthHead);
        }
        let text = match self.kind.head_digits() {
            2 => format!("{count:02}"),
            3 => format!("{count:03}"),
            _ => format!("{count:08}"),
        };
        match self.length_head {
            Some(Encoding::Ascii) => Ok(text.into_bytes()),
            // both BCD alignments pack the head right-aligned
            Some(Encoding::Bcd) | Some(Encoding::Rbcd) => codec::rbcd(text.as_bytes()),
            None => Err(Iso8583Error::InvalidLengthEncoder),
        }
    }

    /// Parse the length prefix. Returns the announced value length and the
    /// number of prefix bytes consumed.
    fn decode_head(&self, raw: &[u8]) -> Result<(usize, usize)> {
        match self.length_head {
            Some(Encoding::Ascii) => {
                let width = self.kind.head_digits();
                if raw.len() < width {
                    return Err(Iso8583Error::BadRawData);
                }
                let head = &raw[..width];
                let count = std::str::from_utf8(head)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Iso8583Error::ParseLengthHead(
                            String::from_utf8_lossy(head).into_owned(),
                        )
                    })?;
                Ok((count, width))
            }
            Some(Encoding::Bcd) | Some(Encoding::Rbcd) => {
                let width = self.kind.head_bcd_bytes();
                if raw.len() < width {
                    return Err(Iso8583Error::BadRawData);
                }
                let head = &raw[..width];
                let count = codec::bcdr_to_ascii(head, self.kind.head_digits())
                    .ok()
                    .and_then(|digits| ascii_digits(digits).parse::<usize>().ok())
                    .ok_or_else(|| {
                        Iso8583Error::ParseLengthHead(
                            String::from_utf8_lossy(head).into_owned(),
                        )
                    })?;
                Ok((count, width))
            }
            None => Err(Iso8583Error::InvalidLengthEncoder),
        }
    }
}

fn pad_digits(digits: &str, width: usize) -> String {
    format!("{digits:0>width$}")
}

fn ascii_digits(bytes: Vec<u8>) -> String {
    // the BCD unpackers only ever emit b'0'..=b'9'
    String::from_utf8_lossy(&bytes).into_owned()
}
