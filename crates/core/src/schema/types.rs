use std::collections::HashSet;

use crate::storage::{Result, StoreError};

/// Logical scalar type of an entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Number,
    Binary,
    /// `YYYY-MM-DD`, stored as a string.
    Date,
    /// RFC 3339, stored as a string.
    DateTime,
    /// Validated string.
    Enum,
}

impl ScalarType {
    /// Backend attribute type code (`S`, `N` or `B`).
    pub fn backend_type(self) -> &'static str {
        match self {
            ScalarType::Number => "N",
            ScalarType::Binary => "B",
            ScalarType::String | ScalarType::Date | ScalarType::DateTime | ScalarType::Enum => "S",
        }
    }
}

/// A declared entity attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub scalar: ScalarType,
}

/// How a composite treats empty logical parts.
///
/// Generated tables disagree on this, so it is configured per attribute
/// instead of assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyParts {
    #[default]
    Reject,
    Allow,
}

/// Layout of a composite key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSpec {
    pub separator: char,
    /// Logical attribute names, in encoding order.
    pub parts: Vec<String>,
    pub empty_parts: EmptyParts,
}

impl CompositeSpec {
    pub fn new(separator: char, parts: &[&str]) -> Self {
        Self {
            separator,
            parts: parts.iter().map(|p| p.to_string()).collect(),
            empty_parts: EmptyParts::Reject,
        }
    }

    pub fn allow_empty_parts(mut self) -> Self {
        self.empty_parts = EmptyParts::Allow;
        self
    }
}

/// A physical key attribute, either stored directly or synthesized from
/// several logical attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub scalar: ScalarType,
    pub composite: Option<CompositeSpec>,
}

impl KeyAttribute {
    /// A key attribute stored as-is.
    pub fn scalar(name: &str, scalar: ScalarType) -> Self {
        Self {
            name: name.to_string(),
            scalar,
            composite: None,
        }
    }

    /// A string key attribute built from `parts` joined with `separator`.
    pub fn composite(name: &str, separator: char, parts: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            scalar: ScalarType::String,
            composite: Some(CompositeSpec::new(separator, parts)),
        }
    }

    pub fn allow_empty_parts(mut self) -> Self {
        self.composite = self.composite.map(CompositeSpec::allow_empty_parts);
        self
    }

    /// Logical attributes this key is made of.
    pub fn logical_names(&self) -> Vec<&str> {
        match &self.composite {
            Some(spec) => spec.parts.iter().map(String::as_str).collect(),
            None => vec![self.name.as_str()],
        }
    }
}

/// Partition key plus optional sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition: KeyAttribute,
    pub sort: Option<KeyAttribute>,
}

impl KeySchema {
    pub fn hash(partition: KeyAttribute) -> Self {
        Self {
            partition,
            sort: None,
        }
    }

    pub fn hash_range(partition: KeyAttribute, sort: KeyAttribute) -> Self {
        Self {
            partition,
            sort: Some(sort),
        }
    }

    /// Physical attributes of this key, partition first.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition).chain(self.sort.as_ref())
    }
}

/// Which attributes a secondary index carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    KeysOnly,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub key: KeySchema,
    pub projection: Projection,
}

impl IndexSchema {
    pub fn new(name: &str, key: KeySchema) -> Self {
        Self {
            name: name.to_string(),
            key,
            projection: Projection::All,
        }
    }

    pub fn keys_only(mut self) -> Self {
        self.projection = Projection::KeysOnly;
        self
    }
}

/// Provisioned capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub read: i64,
    pub write: i64,
}

impl Default for Throughput {
    fn default() -> Self {
        Self { read: 5, write: 5 }
    }
}

/// Everything the engine needs to know about one entity's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity: &'static str,
    pub table: String,
    pub attributes: Vec<AttributeDef>,
    pub primary: KeySchema,
    pub indexes: Vec<IndexSchema>,
    pub throughput: Throughput,
}

impl EntitySchema {
    pub fn new(entity: &'static str, table: &str, primary: KeySchema) -> Self {
        Self {
            entity,
            table: table.to_string(),
            attributes: Vec::new(),
            primary,
            indexes: Vec::new(),
            throughput: Throughput::default(),
        }
    }

    pub fn attribute(mut self, name: &str, scalar: ScalarType) -> Self {
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            scalar,
        });
        self
    }

    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn throughput(mut self, read: i64, write: i64) -> Self {
        self.throughput = Throughput { read, write };
        self
    }

    /// Physical table name under an optional environment prefix.
    pub fn table_name(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.table.clone()
        } else {
            format!("{}-{}", prefix, self.table)
        }
    }

    /// Declared scalar type of a logical attribute.
    pub fn scalar_of(&self, name: &str) -> Option<ScalarType> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.scalar)
    }

    /// Look up a secondary index by name.
    pub fn find_index(&self, name: &str) -> Result<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name).ok_or_else(|| {
            StoreError::Schema(format!(
                "Index {} not found on {} (table {})",
                name, self.entity, self.table
            ))
        })
    }

    /// Every physical key attribute across the primary key and all indexes.
    pub fn all_key_attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        self.primary
            .attributes()
            .chain(self.indexes.iter().flat_map(|i| i.key.attributes()))
    }

    /// Check the schema is internally consistent.
    ///
    /// Composite parts and scalar key attributes must be declared
    /// attributes, composites need at least two parts, and index names must
    /// be unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for index in &self.indexes {
            if !seen.insert(index.name.as_str()) {
                return Err(StoreError::Schema(format!(
                    "{}: duplicate index {}",
                    self.entity, index.name
                )));
            }
        }

        for key in self.all_key_attributes() {
            match &key.composite {
                Some(spec) => {
                    if spec.parts.len() < 2 {
                        return Err(StoreError::Schema(format!(
                            "{}: composite {} needs at least two parts",
                            self.entity, key.name
                        )));
                    }
                    for part in &spec.parts {
                        if self.scalar_of(part).is_none() {
                            return Err(StoreError::Schema(format!(
                                "{}: composite {} references undeclared attribute {}",
                                self.entity, key.name, part
                            )));
                        }
                    }
                }
                None => {
                    if self.scalar_of(&key.name).is_none() {
                        return Err(StoreError::Schema(format!(
                            "{}: key attribute {} is not declared",
                            self.entity, key.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
