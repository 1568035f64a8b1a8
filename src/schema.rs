//! Message schemas: the ordered field descriptors a message is encoded
//! and decoded against, plus the metadata-string loading boundary.
//!
//! Schemas are constructed either programmatically from [`FieldSpec`]
//! values (statically checkable) or from textual metadata entries
//! (`field=2 length=19 encode=bcd,rbcd`), the form legacy integrations
//! carry. String parsing stops at this boundary; everything past it works
//! on enums.

use std::collections::BTreeMap;

use crate::error::{Iso8583Error, Result};
use crate::field::{Encoding, FieldKind, FieldSpec};

/// Ordered collection of field descriptors, keyed by field number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<u32, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Field numbers 1 and 65 are reserved for bitmap
    /// presence and rejected, as are duplicates.
    pub fn push(&mut self, spec: FieldSpec) -> Result<()> {
        let number = spec.number;
        if !(2..=192).contains(&number) || number == 65 {
            return Err(Iso8583Error::Critical(format!(
                "invalid field number: {number}"
            )));
        }
        if self.fields.contains_key(&number) {
            return Err(Iso8583Error::Critical(format!(
                "duplicate field number: {number}"
            )));
        }
        self.fields.insert(number, spec);
        Ok(())
    }

    /// Chaining form of [`Schema::push`].
    pub fn with(mut self, spec: FieldSpec) -> Result<Self> {
        self.push(spec)?;
        Ok(self)
    }

    pub fn get(&self, number: u32) -> Option<&FieldSpec> {
        self.fields.get(&number)
    }

    /// Descriptors in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a schema from textual metadata entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = SchemaEntry<'a>>) -> Result<Schema> {
        let mut schema = Schema::new();
        for entry in entries {
            schema.push(entry.into_spec()?)?;
        }
        Ok(schema)
    }
}

/// One field's schema metadata in its textual form: `field=<N>`,
/// `length=<max>`, `encode=<length-head>,<content>` (single token names
/// the content encoder alone).
#[derive(Debug, Clone, Copy)]
pub struct SchemaEntry<'a> {
    pub kind: FieldKind,
    pub field: &'a str,
    pub length: Option<&'a str>,
    pub encode: Option<&'a str>,
}

impl<'a> SchemaEntry<'a> {
    pub fn new(kind: FieldKind, field: &'a str) -> Self {
        Self {
            kind,
            field,
            length: None,
            encode: None,
        }
    }

    pub fn length(mut self, length: &'a str) -> Self {
        self.length = Some(length);
        self
    }

    pub fn encode(mut self, encode: &'a str) -> Self {
        self.encode = Some(encode);
        self
    }

    fn into_spec(self) -> Result<FieldSpec> {
        let number: u32 = self.field.trim().parse().map_err(|_| {
            Iso8583Error::Critical("value of field must be numeric".to_string())
        })?;
        let max_length = match self.length {
            Some(length) => Some(length.trim().parse::<usize>().map_err(|_| {
                Iso8583Error::Critical("value of length must be numeric".to_string())
            })?),
            None => None,
        };
        let (length_head, content) = parse_encode_attr(self.encode);
        Ok(FieldSpec {
            number,
            kind: self.kind,
            max_length,
            content,
            length_head,
        })
    }
}

/// Split an `encode` attribute into (length-head, content) encodings.
/// Unrecognized tokens map to `None` and are rejected at first use, not
/// here.
fn parse_encode_attr(attr: Option<&str>) -> (Option<Encoding>, Option<Encoding>) {
    let Some(attr) = attr else {
        return (Some(Encoding::Ascii), Some(Encoding::Ascii));
    };
    let tokens: Vec<&str> = attr.split(',').collect();
    match tokens.as_slice() {
        [content] => (Some(Encoding::Ascii), Encoding::from_token(content.trim())),
        [head, content] => (
            Encoding::from_token(head.trim()),
            Encoding::from_token(content.trim()),
        ),
        _ => (None, None),
    }
}
