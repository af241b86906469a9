//! Sample entity shared by the shell's tests.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};

use keyway_core::schema::{EntitySchema, IndexSchema, KeyAttribute, KeySchema, ScalarType};
use keyway_core::storage::Result;
use keyway_core::value::{get_datetime, get_number, get_optional_string, get_string, AttrValue, Item};

use crate::entity::Entity;

/// A versioned homework assignment, indexed by district and school.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub version: i64,
    pub district: Option<String>,
    pub school: Option<String>,
    pub state: String,
    pub assigned_at: DateTime<Utc>,
}

static SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new(
        "Assignment",
        "assignments",
        KeySchema::hash_range(
            KeyAttribute::scalar("name", ScalarType::String),
            KeyAttribute::scalar("version", ScalarType::Number),
        ),
    )
    .attribute("name", ScalarType::String)
    .attribute("version", ScalarType::Number)
    .attribute("district", ScalarType::String)
    .attribute("school", ScalarType::String)
    .attribute("state", ScalarType::String)
    .attribute("assignedAt", ScalarType::DateTime)
    .index(IndexSchema::new(
        "bySchool",
        KeySchema::hash_range(
            KeyAttribute::composite("districtSchool", '@', &["district", "school"]),
            KeyAttribute::scalar("version", ScalarType::Number),
        ),
    ))
    .index(
        IndexSchema::new(
            "byState",
            KeySchema::hash(KeyAttribute::scalar("state", ScalarType::String)),
        )
        .keys_only(),
    )
});

impl Entity for Assignment {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert("name".to_string(), AttrValue::s(&self.name));
        item.insert("version".to_string(), AttrValue::n(self.version));
        if let Some(district) = &self.district {
            item.insert("district".to_string(), AttrValue::s(district));
        }
        if let Some(school) = &self.school {
            item.insert("school".to_string(), AttrValue::s(school));
        }
        item.insert("state".to_string(), AttrValue::s(&self.state));
        item.insert(
            "assignedAt".to_string(),
            AttrValue::s(self.assigned_at.to_rfc3339()),
        );
        item
    }

    fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
            version: get_number(item, "version")?,
            district: get_optional_string(item, "district"),
            school: get_optional_string(item, "school"),
            state: get_string(item, "state")?,
            assigned_at: get_datetime(item, "assignedAt")?,
        })
    }

    /// `byState` projects keys only, so the timestamp is not available.
    fn from_keys(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
            version: get_number(item, "version")?,
            district: get_optional_string(item, "district"),
            school: get_optional_string(item, "school"),
            state: get_string(item, "state")?,
            assigned_at: DateTime::<Utc>::default(),
        })
    }
}

pub fn assignment(name: &str, version: i64) -> Assignment {
    Assignment {
        name: name.to_string(),
        version,
        district: Some("d1".to_string()),
        school: Some("sc1".to_string()),
        state: "open".to_string(),
        assigned_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
    }
}

/// Logical primary key of an assignment.
pub fn key(name: &str, version: i64) -> Item {
    [
        ("name".to_string(), AttrValue::s(name)),
        ("version".to_string(), AttrValue::n(version)),
    ]
    .into_iter()
    .collect()
}
