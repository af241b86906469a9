//! Turns a logical lookup into a backend read request.
//!
//! Pure: every validation error surfaces here, before any I/O.

use std::cmp::Ordering;

use crate::cursor::Cursor;
use crate::schema::{EntitySchema, IndexView};
use crate::storage::{Result, StoreError};
use crate::value::{AttrValue, Item};

use super::{Filter, KeyCondition, KeyTerm, ReadRequest, SortBound, SortOp};

/// A keyed lookup against the base table or one secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInput {
    /// `None` reads the base table.
    pub index: Option<String>,
    /// Logical values of the traversal's partition key.
    pub hash: Item,
    /// Logical values of the sort key to start at (inclusive).
    pub starting_at: Option<Item>,
    /// Resume strictly after this position.
    pub starting_after: Option<Cursor>,
    /// Maximum number of items to deliver overall.
    pub limit: Option<usize>,
    pub descending: bool,
    pub disable_consistent_read: bool,
    pub filters: Vec<Filter>,
}

impl QueryInput {
    pub fn table() -> Self {
        Self::default()
    }

    pub fn on_index(index: &str) -> Self {
        Self {
            index: Some(index.to_string()),
            ..Self::default()
        }
    }

    pub fn hash(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.hash.insert(name.to_string(), value.into());
        self
    }

    pub fn starting_at(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.starting_at
            .get_or_insert_with(Item::new)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn starting_after(mut self, cursor: Cursor) -> Self {
        self.starting_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn inconsistent(mut self) -> Self {
        self.disable_consistent_read = true;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// A full scan of the base table or one secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanInput {
    pub index: Option<String>,
    pub starting_after: Option<Cursor>,
    pub limit: Option<usize>,
    pub disable_consistent_read: bool,
}

impl ScanInput {
    pub fn table() -> Self {
        Self::default()
    }

    pub fn on_index(index: &str) -> Self {
        Self {
            index: Some(index.to_string()),
            ..Self::default()
        }
    }

    pub fn starting_after(mut self, cursor: Cursor) -> Self {
        self.starting_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn inconsistent(mut self) -> Self {
        self.disable_consistent_read = true;
        self
    }
}

/// A validated read, ready for the page iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub request: ReadRequest,
    /// Caller's overall item limit.
    pub limit: Option<usize>,
    /// An empty page ends iteration. Only unfiltered reads may assume so: a
    /// filtered page can come back empty while more data follows.
    pub empty_page_is_terminal: bool,
}

pub fn plan(schema: &EntitySchema, table: &str, input: &QueryInput) -> Result<QueryPlan> {
    if input.starting_at.is_some() && input.starting_after.is_some() {
        return Err(StoreError::InvalidArgument(
            "specify only one of StartingAt or StartingAfter".to_string(),
        ));
    }

    let view = schema.view(input.index.as_deref())?;
    let key = view.key();

    for name in key.partition.logical_names() {
        match input.hash.get(name) {
            Some(value) if !value.is_unset() => {}
            _ => {
                return Err(StoreError::InvalidArgument(format!(
                    "{} is required to query {}",
                    name,
                    describe(&view)
                )))
            }
        }
    }
    let partition = KeyTerm {
        attribute: key.partition.name.clone(),
        value: key.partition.physical_value(&input.hash)?,
    };

    let op = if input.descending { SortOp::Le } else { SortOp::Ge };
    let sort = match (&input.starting_at, &key.sort) {
        (None, _) => None,
        (Some(_), None) => {
            return Err(StoreError::InvalidArgument(format!(
                "{} has no sort key; StartingAt is not supported",
                describe(&view)
            )))
        }
        (Some(bound), Some(sort)) => Some(SortBound {
            attribute: sort.name.clone(),
            op,
            value: sort.physical_value(bound)?,
        }),
    };

    let exclusive_start_key = match &input.starting_after {
        Some(cursor) => {
            let start = resume_key(&view, cursor, input.descending)?;
            let same_partition = start
                .get(&partition.attribute)
                .and_then(|v| v.compare(&partition.value));
            if same_partition != Some(Ordering::Equal) {
                return Err(StoreError::InvalidArgument(
                    "cursor does not belong to the requested partition".to_string(),
                ));
            }
            Some(start)
        }
        None => None,
    };

    for filter in &input.filters {
        if filter.values.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "filter on {} has no values",
                filter.attribute
            )));
        }
        if key.attributes().any(|k| k.name == filter.attribute) {
            return Err(StoreError::InvalidArgument(format!(
                "cannot filter on key attribute {} of {}",
                filter.attribute,
                describe(&view)
            )));
        }
    }

    Ok(QueryPlan {
        request: ReadRequest {
            table: table.to_string(),
            index: view.index_name().map(str::to_string),
            key_condition: Some(KeyCondition { partition, sort }),
            filters: input.filters.clone(),
            exclusive_start_key,
            limit: None,
            scan_forward: !input.descending,
            consistent_read: view.allows_consistent_read() && !input.disable_consistent_read,
        },
        limit: input.limit,
        empty_page_is_terminal: input.filters.is_empty(),
    })
}

pub fn plan_scan(schema: &EntitySchema, table: &str, input: &ScanInput) -> Result<QueryPlan> {
    let view = schema.view(input.index.as_deref())?;
    let exclusive_start_key = input
        .starting_after
        .as_ref()
        .map(|cursor| resume_key(&view, cursor, false))
        .transpose()?;

    Ok(QueryPlan {
        request: ReadRequest {
            table: table.to_string(),
            index: view.index_name().map(str::to_string),
            key_condition: None,
            filters: Vec::new(),
            exclusive_start_key,
            limit: None,
            scan_forward: true,
            consistent_read: view.allows_consistent_read() && !input.disable_consistent_read,
        },
        limit: input.limit,
        empty_page_is_terminal: true,
    })
}

fn resume_key(view: &IndexView<'_>, cursor: &Cursor, descending: bool) -> Result<Item> {
    cursor.check(view, descending)?;
    cursor.exclusive_start_key(view)
}

fn describe(view: &IndexView<'_>) -> String {
    match view.index_name() {
        Some(name) => format!("index {}", name),
        None => format!("table {}", view.schema.table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexSchema, KeyAttribute, KeySchema, ScalarType};

    /// Versioned records with a secondary index keyed by a
    /// district/school composite.
    fn schema() -> EntitySchema {
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
        .index(IndexSchema::new(
            "bySchool",
            KeySchema::hash_range(
                KeyAttribute::composite("districtSchool", '@', &["district", "school"]),
                KeyAttribute::scalar("version", ScalarType::Number),
            ),
        ))
        .index(IndexSchema::new(
            "byState",
            KeySchema::hash(KeyAttribute::scalar("state", ScalarType::String)),
        ))
    }

    fn record(name: &str, version: i64) -> Item {
        [
            ("name", AttrValue::s(name)),
            ("version", AttrValue::n(version)),
            ("district", AttrValue::s("d1")),
            ("school", AttrValue::s("sc1")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_plan_base_table_ascending() {
        let schema = schema();
        let plan = plan(&schema, "dev-assignments", &QueryInput::table().hash("name", "h1")).unwrap();
        let request = &plan.request;

        assert_eq!(request.table, "dev-assignments");
        assert_eq!(request.index, None);
        assert!(request.scan_forward);
        assert!(request.consistent_read);
        assert!(request.exclusive_start_key.is_none());
        assert!(plan.empty_page_is_terminal);

        let rendered = request.render();
        assert_eq!(rendered.key_condition.as_deref(), Some("#pk = :pk"));
        assert_eq!(rendered.values[":pk"], AttrValue::s("h1"));
    }

    #[test]
    fn test_plan_descending_with_range_start() {
        let schema = schema();
        let input = QueryInput::table()
            .hash("name", "h1")
            .starting_at("version", 7)
            .descending()
            .limit(3);
        let plan = plan(&schema, "assignments", &input).unwrap();

        assert!(!plan.request.scan_forward);
        assert_eq!(plan.limit, Some(3));
        let rendered = plan.request.render();
        assert_eq!(
            rendered.key_condition.as_deref(),
            Some("#pk = :pk AND #sk <= :sk")
        );
        assert_eq!(rendered.names["#sk"], "version");
        assert_eq!(rendered.values[":sk"], AttrValue::n(7));
    }

    #[test]
    fn test_plan_composite_partition_on_index() {
        let schema = schema();
        let input = QueryInput::on_index("bySchool")
            .hash("district", "d1")
            .hash("school", "sc1");
        let plan = plan(&schema, "assignments", &input).unwrap();

        assert_eq!(plan.request.index.as_deref(), Some("bySchool"));
        assert!(!plan.request.consistent_read);
        let condition = plan.request.key_condition.unwrap();
        assert_eq!(condition.partition.attribute, "districtSchool");
        assert_eq!(condition.partition.value, AttrValue::s("d1@sc1"));
    }

    #[test]
    fn test_plan_rejects_both_start_positions() {
        let schema = schema();
        let view = schema.view(None).unwrap();
        let cursor = Cursor::from_item(&view, &record("h1", 2), false).unwrap();
        let input = QueryInput::table()
            .hash("name", "h1")
            .starting_at("version", 1)
            .starting_after(cursor);

        assert_eq!(
            plan(&schema, "assignments", &input),
            Err(StoreError::InvalidArgument(
                "specify only one of StartingAt or StartingAfter".to_string()
            ))
        );
    }

    #[test]
    fn test_plan_rejects_unset_hash() {
        let schema = schema();
        for input in [
            QueryInput::table(),
            QueryInput::table().hash("name", ""),
            QueryInput::on_index("bySchool").hash("district", "d1"),
        ] {
            match plan(&schema, "assignments", &input) {
                Err(StoreError::InvalidArgument(message)) => assert!(message.contains("required")),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_plan_rejects_zero_numeric_hash() {
        let schema = EntitySchema::new(
            "Counter",
            "counters",
            KeySchema::hash(KeyAttribute::scalar("id", ScalarType::Number)),
        );
        let result = plan(&schema, "counters", &QueryInput::table().hash("id", 0));
        assert!(matches!(result, Err(StoreError::InvalidArgument(m)) if m.contains("id")));
    }

    #[test]
    fn test_plan_starting_at_without_sort_key() {
        let schema = schema();
        let input = QueryInput::on_index("byState")
            .hash("state", "open")
            .starting_at("version", 1);
        assert!(matches!(
            plan(&schema, "assignments", &input),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_plan_unknown_index() {
        let schema = schema();
        let input = QueryInput::on_index("missing").hash("x", "y");
        assert!(matches!(
            plan(&schema, "assignments", &input),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn test_plan_resume_from_cursor() {
        let schema = schema();
        let view = schema.view(Some("bySchool")).unwrap();
        let cursor = Cursor::from_item(&view, &record("h9", 4), false).unwrap();
        let input = QueryInput::on_index("bySchool")
            .hash("district", "d1")
            .hash("school", "sc1")
            .starting_after(cursor);
        let plan = plan(&schema, "assignments", &input).unwrap();

        let start = plan.request.exclusive_start_key.unwrap();
        assert_eq!(start.len(), 3);
        assert_eq!(start["districtSchool"], AttrValue::s("d1@sc1"));
        assert_eq!(start["version"], AttrValue::n(4));
        assert_eq!(start["name"], AttrValue::s("h9"));
    }

    #[test]
    fn test_plan_cursor_from_other_partition() {
        let schema = schema();
        let view = schema.view(None).unwrap();
        let cursor = Cursor::from_item(&view, &record("h2", 1), false).unwrap();
        let input = QueryInput::table().hash("name", "h1").starting_after(cursor);
        assert!(matches!(
            plan(&schema, "assignments", &input),
            Err(StoreError::InvalidArgument(m)) if m.contains("partition")
        ));
    }

    #[test]
    fn test_plan_cursor_direction_mismatch() {
        let schema = schema();
        let view = schema.view(None).unwrap();
        let cursor = Cursor::from_item(&view, &record("h1", 1), false).unwrap();
        let input = QueryInput::table()
            .hash("name", "h1")
            .starting_after(cursor)
            .descending();
        assert!(plan(&schema, "assignments", &input).is_err());
    }

    #[test]
    fn test_plan_filters() {
        let schema = schema();
        let input = QueryInput::table()
            .hash("name", "h1")
            .filter(Filter::new(
                "state",
                vec![AttrValue::s("open"), AttrValue::s("held")],
            ));
        let plan = plan(&schema, "assignments", &input).unwrap();

        assert!(!plan.empty_page_is_terminal);
        assert_eq!(
            plan.request.render().filter.as_deref(),
            Some("#f0 IN (:f0_0, :f0_1)")
        );
    }

    #[test]
    fn test_plan_rejects_bad_filters() {
        let schema = schema();
        let empty = QueryInput::table()
            .hash("name", "h1")
            .filter(Filter::new("state", Vec::new()));
        assert!(matches!(
            plan(&schema, "assignments", &empty),
            Err(StoreError::InvalidArgument(_))
        ));

        let on_key = QueryInput::table()
            .hash("name", "h1")
            .filter(Filter::eq("version", AttrValue::n(1)));
        assert!(matches!(
            plan(&schema, "assignments", &on_key),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_plan_consistency_flag() {
        let schema = schema();
        let input = QueryInput::table().hash("name", "h1").inconsistent();
        assert!(!plan(&schema, "assignments", &input).unwrap().request.consistent_read);
    }

    #[test]
    fn test_plan_scan() {
        let schema = schema();
        let plan = plan_scan(&schema, "assignments", &ScanInput::on_index("bySchool").limit(5)).unwrap();

        assert!(plan.request.is_scan());
        assert_eq!(plan.request.index.as_deref(), Some("bySchool"));
        assert!(!plan.request.consistent_read);
        assert!(plan.empty_page_is_terminal);
        assert_eq!(plan.limit, Some(5));
    }

    #[test]
    fn test_plan_scan_resume() {
        let schema = schema();
        let view = schema.view(None).unwrap();
        let cursor = Cursor::from_item(&view, &record("h1", 3), false).unwrap();
        let plan = plan_scan(&schema, "assignments", &ScanInput::table().starting_after(cursor)).unwrap();

        let start = plan.request.exclusive_start_key.unwrap();
        assert_eq!(start["name"], AttrValue::s("h1"));
        assert_eq!(start["version"], AttrValue::n(3));
    }
}
