use std::cmp::Ordering;
use std::collections::HashMap;

use crate::value::{AttrValue, Item};

use super::Filter;

/// Comparison applied to the sort key of a ranged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOp {
    /// `>=`, ascending traversal starting at the bound.
    Ge,
    /// `<=`, descending traversal starting at the bound.
    Le,
}

impl SortOp {
    pub fn symbol(self) -> &'static str {
        match self {
            SortOp::Ge => ">=",
            SortOp::Le => "<=",
        }
    }

    /// Whether `value` compared to the bound satisfies the operator.
    pub fn admits(self, ordering: Ordering) -> bool {
        match self {
            SortOp::Ge => ordering != Ordering::Less,
            SortOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// `attribute = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTerm {
    pub attribute: String,
    pub value: AttrValue,
}

/// `attribute <op> value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBound {
    pub attribute: String,
    pub op: SortOp,
    pub value: AttrValue,
}

/// Structured key condition: partition equality plus an optional sort bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition: KeyTerm,
    pub sort: Option<SortBound>,
}

impl KeyCondition {
    /// Evaluate the condition against a stored item.
    pub fn matches(&self, item: &Item) -> bool {
        let partition = item
            .get(&self.partition.attribute)
            .and_then(|v| v.compare(&self.partition.value));
        if partition != Some(Ordering::Equal) {
            return false;
        }
        match &self.sort {
            None => true,
            Some(bound) => item
                .get(&bound.attribute)
                .and_then(|v| v.compare(&bound.value))
                .map(|ordering| bound.op.admits(ordering))
                .unwrap_or(false),
        }
    }
}

/// A fully planned read against the backend.
///
/// A request without a key condition is a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub table: String,
    pub index: Option<String>,
    pub key_condition: Option<KeyCondition>,
    pub filters: Vec<Filter>,
    pub exclusive_start_key: Option<Item>,
    /// Maximum items the backend should evaluate for this page.
    pub limit: Option<usize>,
    pub scan_forward: bool,
    pub consistent_read: bool,
}

/// Backend-native expressions with their placeholder maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub key_condition: Option<String>,
    pub filter: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttrValue>,
}

impl ReadRequest {
    pub fn is_scan(&self) -> bool {
        self.key_condition.is_none()
    }

    /// Render key condition and filter expressions.
    ///
    /// Both share one set of `#name` / `:value` placeholders, as the backend
    /// requires.
    pub fn render(&self) -> Rendered {
        let mut rendered = Rendered::default();

        if let Some(condition) = &self.key_condition {
            rendered
                .names
                .insert("#pk".to_string(), condition.partition.attribute.clone());
            rendered
                .values
                .insert(":pk".to_string(), condition.partition.value.clone());
            let mut expression = "#pk = :pk".to_string();

            if let Some(bound) = &condition.sort {
                rendered
                    .names
                    .insert("#sk".to_string(), bound.attribute.clone());
                rendered.values.insert(":sk".to_string(), bound.value.clone());
                expression.push_str(&format!(" AND #sk {} :sk", bound.op.symbol()));
            }
            rendered.key_condition = Some(expression);
        }

        let fragments: Vec<String> = self
            .filters
            .iter()
            .enumerate()
            .map(|(i, filter)| filter.render(i, &mut rendered.names, &mut rendered.values))
            .collect();
        if !fragments.is_empty() {
            rendered.filter = Some(fragments.join(" AND "));
        }

        rendered
    }
}
