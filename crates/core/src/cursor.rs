//! Resume cursors ("StartingAfter").
//!
//! A cursor stores the *logical* key values of the last item a caller saw,
//! for every key attribute of the traversed index plus the primary key. The
//! backend's exclusive start key is re-derived from those values, so
//! composite attributes are always re-encoded rather than copied.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::schema::{EmptyParts, IndexView};
use crate::storage::{Result, StoreError};
use crate::value::{AttrValue, Item};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub entity: String,
    pub index: Option<String>,
    pub descending: bool,
    pub values: Item,
}

impl Cursor {
    /// Capture the resume position of `item` on the given traversal.
    pub fn from_item(view: &IndexView<'_>, item: &Item, descending: bool) -> Result<Self> {
        let mut values = Item::new();
        for key in view.key_attributes() {
            let lenient = key
                .composite
                .as_ref()
                .map(|c| c.empty_parts == EmptyParts::Allow)
                .unwrap_or(false);
            for name in key.logical_names() {
                match item.get(name) {
                    Some(value) if !value.is_null() => {
                        values.insert(name.to_string(), value.clone());
                    }
                    _ if lenient => {}
                    _ => {
                        return Err(StoreError::validation(
                            name,
                            "",
                            "is required to build a cursor",
                        ))
                    }
                }
            }
        }

        Ok(Self {
            entity: view.schema.entity.to_string(),
            index: view.index_name().map(str::to_string),
            descending,
            values,
        })
    }

    /// Reject a cursor produced under a different entity, index or direction.
    pub fn check(&self, view: &IndexView<'_>, descending: bool) -> Result<()> {
        if self.entity != view.schema.entity {
            return Err(StoreError::InvalidArgument(format!(
                "cursor belongs to {}, not {}",
                self.entity, view.schema.entity
            )));
        }
        if self.index.as_deref() != view.index_name() {
            return Err(StoreError::InvalidArgument(format!(
                "cursor was produced on index {}, not {}",
                self.index.as_deref().unwrap_or("<table>"),
                view.index_name().unwrap_or("<table>")
            )));
        }
        if self.descending != descending {
            return Err(StoreError::InvalidArgument(
                "cursor was produced with the opposite sort direction".to_string(),
            ));
        }
        Ok(())
    }

    /// Physical exclusive start key: every key attribute of the traversal.
    pub fn exclusive_start_key(&self, view: &IndexView<'_>) -> Result<Item> {
        view.key_attributes()
            .into_iter()
            .map(|key| Ok((key.name.clone(), key.physical_value(&self.values)?)))
            .collect()
    }

    /// Logical value of one attribute.
    pub fn value(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    /// Opaque, URL-safe token for handing the cursor to a client.
    pub fn to_token(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| StoreError::InvalidArgument(format!("unencodable cursor: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Parse a token produced by [`Cursor::to_token`].
    pub fn from_token(token: &str) -> Result<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| StoreError::InvalidArgument(format!("malformed cursor token: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| StoreError::InvalidArgument(format!("malformed cursor token: {}", e)))
    }
}
