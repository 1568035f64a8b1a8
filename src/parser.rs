//! MTI-keyed template registry: dispatches raw bytes to the message shape
//! registered for their MTI.
//!
//! The registry is read-mostly: registrations must be serialized
//! externally, but once installed a prototype is cloned per parse and the
//! registry can serve any number of concurrent decoders.

use std::collections::HashMap;

use tracing::debug;

use crate::codec;
use crate::error::{Iso8583Error, Result};
use crate::field::Encoding;
use crate::message::Message;

/// Template registry mapping MTIs to message prototypes.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    templates: HashMap<String, Message>,
    mti_encoding: Encoding,
}

impl Parser {
    /// Empty registry reading ASCII MTIs.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mti_encoding(&self) -> Encoding {
        self.mti_encoding
    }

    /// Select how incoming MTIs are read. Only ASCII and BCD name MTI
    /// encodings.
    pub fn set_mti_encoding(&mut self, encoding: Encoding) -> Result<()> {
        match encoding {
            Encoding::Ascii | Encoding::Bcd => {
                self.mti_encoding = encoding;
                Ok(())
            }
            Encoding::Rbcd => Err(Iso8583Error::InvalidEncodeType),
        }
    }

    /// Token form of [`Parser::set_mti_encoding`] for configuration
    /// boundaries.
    pub fn set_mti_encoding_token(&mut self, token: &str) -> Result<()> {
        match token {
            "ascii" => self.set_mti_encoding(Encoding::Ascii),
            "bcd" => self.set_mti_encoding(Encoding::Bcd),
            _ => Err(Iso8583Error::InvalidEncodeType),
        }
    }

    /// Register a prototype under `mti`. Re-registering an MTI is refused;
    /// deregister it first.
    pub fn register(&mut self, mti: &str, prototype: Message) -> Result<()> {
        if mti.len() != 4 || !mti.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Iso8583Error::MtiNotFourDigits);
        }
        if self.templates.contains_key(mti) {
            return Err(Iso8583Error::TemplateExists(mti.to_string()));
        }
        debug!(mti, fields = prototype.schema().len(), "registered template");
        self.templates.insert(mti.to_string(), prototype);
        Ok(())
    }

    /// Remove and return the prototype registered under `mti`.
    pub fn deregister(&mut self, mti: &str) -> Option<Message> {
        self.templates.remove(mti)
    }

    /// Decode `raw` against the template registered for its MTI. The
    /// prototype is cloned; the registry itself is never mutated.
    pub fn parse(&self, raw: &[u8]) -> Result<Message> {
        let mti = self.read_mti(raw)?;
        let prototype = self
            .templates
            .get(&mti)
            .ok_or_else(|| Iso8583Error::TemplateNotFound(mti.clone()))?;

        let mut message = prototype.clone();
        message.mti_encoding = self.mti_encoding;
        message.decode(raw)?;
        debug!(mti = %message.mti, "parsed message from template");
        Ok(message)
    }

    fn read_mti(&self, raw: &[u8]) -> Result<String> {
        match self.mti_encoding {
            Encoding::Ascii => {
                if raw.len() < 4 {
                    return Err(Iso8583Error::BadMtiRaw);
                }
                Ok(String::from_utf8_lossy(&raw[..4]).into_owned())
            }
            Encoding::Bcd => {
                if raw.len() < 2 {
                    return Err(Iso8583Error::BadMtiRaw);
                }
                let digits = codec::bcdl_to_ascii(&raw[..2], 4)?;
                Ok(String::from_utf8_lossy(&digits).into_owned())
            }
            Encoding::Rbcd => Err(Iso8583Error::InvalidEncodeType),
        }
    }
}
