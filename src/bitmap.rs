//! Presence bitmaps: the 64/128/192-bit vectors that name which data
//! elements a message carries.
//!
//! Bit 1 of the primary map announces a secondary map, bit 65 (the first
//! bit of the secondary) announces a tertiary. Serialized either as packed
//! binary (8 bytes per map) or as uppercase ASCII hex (16 chars per map).

use crate::error::{Iso8583Error, Result};

/// Highest addressable field number.
pub const MAX_FIELD: u32 = 192;

const MAP_BYTES: usize = 8;
const MAP_HEX_CHARS: usize = 16;

/// Wire form of the bitmap(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapStyle {
    /// Packed binary, 8 bytes per map.
    #[default]
    Packed,
    /// Uppercase ASCII hex, 16 characters per map.
    AsciiHex,
}

/// A set of field numbers in `[1, 192]`, MSB-first within each byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitmap {
    bits: [u8; 24],
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark field `number` present. Out-of-range numbers are ignored.
    pub fn set(&mut self, number: u32) {
        if (1..=MAX_FIELD).contains(&number) {
            let idx = (number - 1) as usize;
            self.bits[idx / 8] |= 0x80 >> (idx % 8);
        }
    }

    pub fn is_set(&self, number: u32) -> bool {
        if !(1..=MAX_FIELD).contains(&number) {
            return false;
        }
        let idx = (number - 1) as usize;
        self.bits[idx / 8] & (0x80 >> (idx % 8)) != 0
    }

    /// Set field numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=MAX_FIELD).filter(|&n| self.is_set(n))
    }

    /// Number of packed bytes this bitmap occupies on the wire, derived
    /// from the continuation bits.
    fn width(&self) -> usize {
        if self.is_set(65) {
            3 * MAP_BYTES
        } else if self.is_set(1) {
            2 * MAP_BYTES
        } else {
            MAP_BYTES
        }
    }

    /// Serialize per the continuation bits already set on the map.
    pub fn serialize(&self, style: BitmapStyle) -> Vec<u8> {
        let packed = &self.bits[..self.width()];
        match style {
            BitmapStyle::Packed => packed.to_vec(),
            BitmapStyle::AsciiHex => hex::encode_upper(packed).into_bytes(),
        }
    }

    /// Read one mandatory map plus whatever the continuation bits announce.
    /// Returns the bitmap and the number of input bytes consumed.
    pub fn parse(raw: &[u8], style: BitmapStyle) -> Result<(Bitmap, usize)> {
        let mut bitmap = Bitmap::new();
        let mut consumed = 0;

        consumed += bitmap.read_map(raw, 0, style)?;
        if bitmap.is_set(1) {
            consumed += bitmap.read_map(&raw[consumed..], 1, style)?;
        }
        if bitmap.is_set(65) {
            consumed += bitmap.read_map(&raw[consumed..], 2, style)?;
        }
        Ok((bitmap, consumed))
    }

    fn read_map(&mut self, raw: &[u8], map: usize, style: BitmapStyle) -> Result<usize> {
        let dst = &mut self.bits[map * MAP_BYTES..(map + 1) * MAP_BYTES];
        match style {
            BitmapStyle::Packed => {
                if raw.len() < MAP_BYTES {
                    return Err(Iso8583Error::BadRawData);
                }
                dst.copy_from_slice(&raw[..MAP_BYTES]);
                Ok(MAP_BYTES)
            }
            BitmapStyle::AsciiHex => {
                if raw.len() < MAP_HEX_CHARS {
                    return Err(Iso8583Error::BadRawData);
                }
                let decoded = hex::decode(&raw[..MAP_HEX_CHARS])
                    .map_err(|_| Iso8583Error::BadRawData)?;
                dst.copy_from_slice(&decoded);
                Ok(MAP_HEX_CHARS)
            }
        }
    }
}
