//! Composite key codec.
//!
//! Translates between an item's logical attributes and the physical key
//! attributes the backend indexes on.

pub mod composite;

use crate::schema::{EmptyParts, EntitySchema, KeyAttribute, ScalarType};
use crate::storage::{Result, StoreError};
use crate::value::{AttrValue, Item};

impl KeyAttribute {
    /// Derive this attribute's physical value from logical values in `item`.
    pub fn physical_value(&self, item: &Item) -> Result<AttrValue> {
        let Some(spec) = &self.composite else {
            return match item.get(&self.name) {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(StoreError::validation(
                    &self.name,
                    "",
                    "is required",
                )),
            };
        };

        let mut parts = Vec::with_capacity(spec.parts.len());
        for part in &spec.parts {
            let text = match item.get(part) {
                Some(AttrValue::Null) | None if spec.empty_parts == EmptyParts::Allow => "",
                Some(AttrValue::Null) | None => {
                    return Err(StoreError::validation(
                        part,
                        "",
                        format!("is required for {}", self.name),
                    ))
                }
                Some(value) => value.key_text().ok_or_else(|| {
                    StoreError::validation(
                        part,
                        format!("{:?}", value),
                        format!("cannot be embedded in composite {}", self.name),
                    )
                })?,
            };
            parts.push(text);
        }

        composite::encode(&self.name, spec, &parts).map(AttrValue::S)
    }

    /// Whether a sparse index key should be left off `item`.
    ///
    /// Strict composites need every part; lenient ones need at least one.
    fn skipped_for(&self, item: &Item) -> bool {
        let absent = |name: &str| item.get(name).map(AttrValue::is_null).unwrap_or(true);
        let names = self.logical_names();
        match self.composite.as_ref().map(|c| c.empty_parts) {
            Some(EmptyParts::Allow) => names.into_iter().all(absent),
            _ => names.into_iter().any(absent),
        }
    }
}

impl EntitySchema {
    /// Add every composite key attribute to an item before it is written.
    ///
    /// Primary key composites must be derivable. Index composites missing
    /// their logical parts are skipped, leaving the item out of that (sparse)
    /// index.
    pub fn materialize_keys(&self, item: &mut Item) -> Result<()> {
        for key in self.primary.attributes() {
            if key.composite.is_some() {
                let value = key.physical_value(item)?;
                item.insert(key.name.clone(), value);
            }
        }

        for key in self.indexes.iter().flat_map(|i| i.key.attributes()) {
            if key.composite.is_none() || key.skipped_for(item) {
                continue;
            }
            let value = key.physical_value(item)?;
            item.insert(key.name.clone(), value);
        }

        Ok(())
    }

    /// Recover logical attributes from the composite key attributes present
    /// in `item`.
    ///
    /// Items read from keys-only indexes carry only physical keys; this fills
    /// in whatever logical values those keys encode. Attributes already
    /// present are left untouched.
    pub fn recover_logical(&self, item: &mut Item) -> Result<()> {
        for key in self.all_key_attributes() {
            let Some(spec) = &key.composite else {
                continue;
            };
            let Some(encoded) = item.get(&key.name).and_then(AttrValue::as_s) else {
                continue;
            };
            let values = composite::decode(&key.name, spec, encoded)?;
            for (part, value) in spec.parts.iter().zip(values) {
                if value.is_empty() || item.contains_key(part) {
                    continue;
                }
                let typed = match self.scalar_of(part) {
                    Some(ScalarType::Number) => AttrValue::N(value),
                    _ => AttrValue::S(value),
                };
                item.insert(part.clone(), typed);
            }
        }
        Ok(())
    }

    /// Extract the physical primary key of an item given its logical values.
    pub fn primary_key(&self, item: &Item) -> Result<Item> {
        self.primary
            .attributes()
            .map(|key| Ok((key.name.clone(), key.physical_value(item)?)))
            .collect()
    }

    /// Render a logical primary key for messages, e.g. `name: a, version: 1`.
    pub fn describe_key(&self, item: &Item) -> String {
        self.primary
            .attributes()
            .flat_map(|key| key.logical_names())
            .map(|name| match item.get(name) {
                Some(AttrValue::S(s)) | Some(AttrValue::N(s)) => format!("{}: {}", name, s),
                Some(AttrValue::B(b)) => format!("{}: <{} bytes>", name, b.len()),
                Some(AttrValue::Null) | None => format!("{}: <missing>", name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
