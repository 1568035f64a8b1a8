//! Message assembly: MTI, bitmap(s), and the ordered field stream.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::bitmap::{Bitmap, BitmapStyle};
use crate::codec;
use crate::error::{Iso8583Error, Result};
use crate::field::{Encoding, FieldValue};
use crate::schema::Schema;

/// A typed, field-indexed ISO 8583 message bound to a schema.
///
/// A field is present on the wire iff its value is set and non-empty.
/// Decoding assigns values in place; after a decode error the values
/// written before the failing field have already been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type indicator, four decimal digits.
    pub mti: String,
    /// Wire form of the MTI: 4 ASCII bytes or 2 BCD bytes.
    pub mti_encoding: Encoding,
    /// Wire form of the bitmaps.
    pub bitmap_style: BitmapStyle,
    /// Emit a 128-bit bitmap even when no field above 64 is present.
    pub force_second_bitmap: bool,
    schema: Schema,
    values: BTreeMap<u32, FieldValue>,
}

impl Message {
    /// Empty message over `schema`, with ASCII MTI and packed bitmaps.
    pub fn new(mti: impl Into<String>, schema: Schema) -> Self {
        Self {
            mti: mti.into(),
            mti_encoding: Encoding::Ascii,
            bitmap_style: BitmapStyle::Packed,
            force_second_bitmap: false,
            schema,
            values: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Set a field value. The field must be described by the schema and
    /// the value variant must match the field kind.
    pub fn set(&mut self, number: u32, value: FieldValue) -> Result<()> {
        let spec = self
            .schema
            .get(number)
            .ok_or(Iso8583Error::FieldNotDefined(number))?;
        let matches_kind = match value {
            FieldValue::Text(_) => spec.kind.is_text(),
            FieldValue::Bytes(_) => !spec.kind.is_text(),
        };
        if !matches_kind {
            return Err(Iso8583Error::Critical(format!(
                "wrong value kind for field {number}"
            )));
        }
        self.values.insert(number, value);
        Ok(())
    }

    /// Set a text field (numeric and alphanumeric families).
    pub fn set_text(&mut self, number: u32, text: impl Into<String>) -> Result<()> {
        self.set(number, FieldValue::Text(text.into()))
    }

    /// Set a byte field (binary and the variable byte kinds).
    pub fn set_bytes(&mut self, number: u32, data: impl Into<Vec<u8>>) -> Result<()> {
        self.set(number, FieldValue::Bytes(data.into()))
    }

    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.values.get(&number)
    }

    pub fn get_text(&self, number: u32) -> Option<&str> {
        self.values.get(&number).and_then(FieldValue::as_text)
    }

    pub fn get_bytes(&self, number: u32) -> Option<&[u8]> {
        self.values.get(&number).and_then(FieldValue::as_bytes)
    }

    /// Serialize to the canonical wire form.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_mti(&mut buf)?;

        let mut bitmap = Bitmap::new();
        let mut highest = 0;
        for spec in self.schema.iter() {
            if let Some(value) = self.values.get(&spec.number) {
                if !value.is_empty() {
                    bitmap.set(spec.number);
                    highest = spec.number;
                }
            }
        }
        if highest > 128 {
            bitmap.set(65);
        }
        if self.force_second_bitmap || highest > 64 {
            bitmap.set(1);
        }
        buf.put_slice(&bitmap.serialize(self.bitmap_style));

        for spec in self.schema.iter() {
            if let Some(value) = self.values.get(&spec.number) {
                if !value.is_empty() {
                    buf.put_slice(&spec.encode(value)?);
                }
            }
        }

        debug!(mti = %self.mti, bytes = buf.len(), "encoded message");
        Ok(buf.freeze())
    }

    fn encode_mti(&self, buf: &mut BytesMut) -> Result<()> {
        if self.mti.is_empty() {
            return Err(Iso8583Error::MtiRequired);
        }
        if self.mti.len() != 4 || !self.mti.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Iso8583Error::MtiInvalid);
        }
        match self.mti_encoding {
            Encoding::Ascii => buf.put_slice(self.mti.as_bytes()),
            Encoding::Bcd => buf.put_slice(&codec::lbcd(self.mti.as_bytes())?),
            Encoding::Rbcd => return Err(Iso8583Error::InvalidEncodeType),
        }
        Ok(())
    }

    /// Parse a wire buffer into this message, replacing field values in
    /// place. Fields absent from the bitmap keep whatever value they held.
    pub fn decode(&mut self, raw: &[u8]) -> Result<()> {
        let mut pos = self.decode_mti(raw)?;
        debug!(mti = %self.mti, "parsed MTI");

        let (bitmap, consumed) = Bitmap::parse(&raw[pos..], self.bitmap_style)?;
        pos += consumed;
        debug!(bitmap_bytes = consumed, "parsed bitmap");

        for number in bitmap.iter() {
            // bits 1 and 65 announce bitmaps, not data elements
            if number == 1 || number == 65 {
                continue;
            }
            let spec = self
                .schema
                .get(number)
                .ok_or(Iso8583Error::FieldNotDefined(number))?;
            let (value, consumed) = spec
                .decode(&raw[pos..])
                .map_err(|err| err.in_field(number))?;
            debug!(field = number, consumed, "parsed field");
            pos += consumed;
            self.values.insert(number, value);
        }
        Ok(())
    }

    fn decode_mti(&mut self, raw: &[u8]) -> Result<usize> {
        match self.mti_encoding {
            Encoding::Ascii => {
                if raw.len() < 4 {
                    return Err(Iso8583Error::BadMtiRaw);
                }
                self.mti = String::from_utf8_lossy(&raw[..4]).into_owned();
                Ok(4)
            }
            Encoding::Bcd => {
                if raw.len() < 2 {
                    return Err(Iso8583Error::BadMtiRaw);
                }
                let digits = codec::bcdl_to_ascii(&raw[..2], 4)?;
                self.mti = String::from_utf8_lossy(&digits).into_owned();
                Ok(2)
            }
            Encoding::Rbcd => Err(Iso8583Error::InvalidEncodeType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, FieldSpec};

    fn small_schema() -> Schema {
        Schema::new()
            .with(FieldSpec::new(2, FieldKind::LlNumeric, 19))
            .unwrap()
            .with(FieldSpec::new(3, FieldKind::Numeric, 6))
            .unwrap()
            .with(FieldSpec::new(39, FieldKind::Alphanumeric, 2))
            .unwrap()
            .with(FieldSpec::new(120, FieldKind::LllVar, 999))
            .unwrap()
    }

    #[test]
    fn test_mti_errors() {
        let mut message = Message::new("01000", small_schema());
        assert_eq!(message.encode().unwrap_err().to_string(), "MTI is invalid");

        message.mti = "abca".to_string();
        assert_eq!(message.encode().unwrap_err().to_string(), "MTI is invalid");

        message.mti = String::new();
        assert_eq!(message.encode().unwrap_err().to_string(), "MTI is required");
    }

    #[test]
    fn test_bcd_mti_round_trip() {
        let mut message = Message::new("0100", small_schema());
        message.mti_encoding = Encoding::Bcd;
        message.set_text(2, "4276555555555555").unwrap();

        let wire = message.encode().unwrap();
        assert_eq!(&wire[..2], [0x01, 0x00]);

        let mut loaded = Message::new("", small_schema());
        loaded.mti_encoding = Encoding::Bcd;
        loaded.decode(&wire).unwrap();
        assert_eq!(loaded.mti, "0100");
        assert_eq!(loaded.get_text(2), Some("4276555555555555"));
    }

    #[test]
    fn test_truncated_mti() {
        let mut message = Message::new("", small_schema());
        assert_eq!(
            message.decode(b"01").unwrap_err().to_string(),
            "bad MTI raw data"
        );

        message.mti_encoding = Encoding::Bcd;
        assert_eq!(
            message.decode(&[0x01]).unwrap_err().to_string(),
            "bad MTI raw data"
        );
    }

    #[test]
    fn test_rbcd_mti_rejected() {
        let mut message = Message::new("0100", small_schema());
        message.mti_encoding = Encoding::Rbcd;
        assert_eq!(
            message.encode().unwrap_err().to_string(),
            "invalid encode type"
        );
        assert_eq!(
            message.decode(b"0100").unwrap_err().to_string(),
            "invalid encode type"
        );
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let mut message = Message::new("0100", small_schema());
        message.set_text(2, "4276555555555555").unwrap();
        message.set_text(39, "").unwrap();

        let wire = message.encode().unwrap();
        // single 8-byte bitmap, only field 2 present
        assert_eq!(&wire[..], b"0100\x40\x00\x00\x00\x00\x00\x00\x00164276555555555555");
    }

    #[test]
    fn test_second_bitmap_auto_and_forced() {
        let mut message = Message::new("0100", small_schema());
        message.set_text(3, "000123").unwrap();

        let wire = message.encode().unwrap();
        assert_eq!(wire.len(), 4 + 8 + 6);
        assert_eq!(wire[4], 0x20);

        message.force_second_bitmap = true;
        let wire = message.encode().unwrap();
        assert_eq!(wire.len(), 4 + 16 + 6);
        assert_eq!(wire[4], 0xA0);

        // a field above 64 forces the second bitmap on its own
        message.force_second_bitmap = false;
        message.set_bytes(120, &b"x"[..]).unwrap();
        let wire = message.encode().unwrap();
        assert_eq!(wire[4], 0xA0);
        assert!(Bitmap::parse(&wire[4..], BitmapStyle::Packed)
            .unwrap()
            .0
            .is_set(120));
    }

    #[test]
    fn test_set_rejects_unknown_field_and_wrong_kind() {
        let mut message = Message::new("0100", small_schema());
        assert_eq!(
            message.set_text(4, "1").unwrap_err().to_string(),
            "field 4 not defined"
        );
        assert_eq!(
            message.set_bytes(3, &b"000123"[..]).unwrap_err().to_string(),
            "Critical error:wrong value kind for field 3"
        );
        assert_eq!(
            message.set_text(120, "x").unwrap_err().to_string(),
            "Critical error:wrong value kind for field 120"
        );
    }

    #[test]
    fn test_decode_undefined_field() {
        let mut message = Message::new("0100", small_schema());
        message.set_text(2, "4276555555555555").unwrap();
        let wire = message.encode().unwrap();

        let lean = Schema::new()
            .with(FieldSpec::new(3, FieldKind::Numeric, 6))
            .unwrap();
        let mut loaded = Message::new("", lean);
        assert_eq!(
            loaded.decode(&wire).unwrap_err().to_string(),
            "field 2 not defined"
        );
    }

    #[test]
    fn test_decode_wraps_field_errors() {
        let mut message = Message::new("0100", small_schema());
        message.set_text(2, "4276555555555555").unwrap();
        let wire = message.encode().unwrap();

        let mut loaded = Message::new("", small_schema());
        assert_eq!(
            loaded.decode(&wire[..wire.len() - 1]).unwrap_err().to_string(),
            "field 2: bad raw data"
        );
    }

    #[test]
    fn test_round_trip_all_kinds() {
        let schema = Schema::new()
            .with(
                FieldSpec::new(2, FieldKind::LlNumeric, 19)
                    .with_length_head(Encoding::Bcd)
                    .with_content(Encoding::Rbcd),
            )
            .unwrap()
            .with(FieldSpec::new(3, FieldKind::Numeric, 6).with_content(Encoding::Bcd))
            .unwrap()
            .with(FieldSpec::new(19, FieldKind::Numeric, 3).with_content(Encoding::Rbcd))
            .unwrap()
            .with(FieldSpec::new(43, FieldKind::Alphanumeric, 40))
            .unwrap()
            .with(FieldSpec::new(52, FieldKind::Binary, 8))
            .unwrap()
            .with(
                FieldSpec::new(56, FieldKind::LllVar, 255).with_length_head(Encoding::Bcd),
            )
            .unwrap()
            .with(
                FieldSpec::new(60, FieldKind::LllNumeric, 999)
                    .with_length_head(Encoding::Bcd)
                    .with_content(Encoding::Ascii),
            )
            .unwrap()
            .with(FieldSpec::new(120, FieldKind::L8Var, 99_999_999))
            .unwrap();

        let mut message = Message::new("0110", schema.clone());
        message.set_text(2, "4276555555555555").unwrap();
        message.set_text(3, "000000").unwrap();
        message.set_text(19, "643").unwrap();
        message.set_text(43, "Test text").unwrap();
        message.set_bytes(52, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        message.set_bytes(56, &b"test data1"[..]).unwrap();
        message.set_text(60, "123456789").unwrap();
        message.set_bytes(120, &b"another test"[..]).unwrap();

        let wire = message.encode().unwrap();
        let mut loaded = Message::new("", schema);
        loaded.decode(&wire).unwrap();

        assert_eq!(loaded.mti, "0110");
        assert_eq!(loaded.get_text(2), Some("4276555555555555"));
        assert_eq!(loaded.get_text(3), Some("000000"));
        assert_eq!(loaded.get_text(19), Some("643"));
        // fixed alphanumeric padding is preserved on decode
        assert_eq!(
            loaded.get_text(43),
            Some("                               Test text")
        );
        assert_eq!(loaded.get_bytes(52), Some(&[1u8, 2, 3, 4, 5, 6, 7, 8][..]));
        assert_eq!(loaded.get_bytes(56), Some(&b"test data1"[..]));
        assert_eq!(loaded.get_text(60), Some("123456789"));
        assert_eq!(loaded.get_bytes(120), Some(&b"another test"[..]));

        // the canonical form re-encodes except for the trimmed-on-decode
        // fixed fields, which re-pad identically
        let second = loaded.encode().unwrap();
        assert_eq!(second, wire);
    }
}
