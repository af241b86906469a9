use super::{EntitySchema, IndexSchema, KeyAttribute, KeySchema, Projection};
use crate::storage::Result;

/// One traversal path over an entity: its base table or a secondary index.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    pub schema: &'a EntitySchema,
    pub index: Option<&'a IndexSchema>,
}

impl EntitySchema {
    /// Resolve a traversal path. `None` means the base table.
    pub fn view(&self, index: Option<&str>) -> Result<IndexView<'_>> {
        let index = index.map(|name| self.find_index(name)).transpose()?;
        Ok(IndexView {
            schema: self,
            index,
        })
    }
}

impl<'a> IndexView<'a> {
    pub fn index_name(&self) -> Option<&'a str> {
        self.index.map(|i| i.name.as_str())
    }

    /// The key that orders this traversal.
    pub fn key(&self) -> &'a KeySchema {
        match self.index {
            Some(index) => &index.key,
            None => &self.schema.primary,
        }
    }

    /// Every physical attribute a resume position needs: the traversal's
    /// own key followed by the table's primary key, without duplicates.
    pub fn key_attributes(&self) -> Vec<&'a KeyAttribute> {
        let mut attributes: Vec<&'a KeyAttribute> = Vec::new();
        for attribute in self.key().attributes().chain(self.schema.primary.attributes()) {
            if !attributes.iter().any(|a| a.name == attribute.name) {
                attributes.push(attribute);
            }
        }
        attributes
    }

    /// Logical attributes behind [`Self::key_attributes`], without duplicates.
    pub fn logical_key_names(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = Vec::new();
        for attribute in self.key_attributes() {
            for name in attribute.logical_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Secondary indexes never support strongly consistent reads.
    pub fn allows_consistent_read(&self) -> bool {
        self.index.is_none()
    }

    pub fn keys_only(&self) -> bool {
        self.index
            .map(|i| i.projection == Projection::KeysOnly)
            .unwrap_or(false)
    }
}
