use crate::value::Item;

/// One backend round trip worth of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Present when the backend may have more results after this page.
    pub last_evaluated_key: Option<Item>,
}

impl Page {
    /// True when the backend reported no continuation.
    pub fn is_final(&self) -> bool {
        self.last_evaluated_key.is_none()
    }
}

/// Condition attached to a single-item write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Only write when no item with this key attribute exists yet.
    AttributeNotExists(String),
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    ConditionFailed,
}

/// One element of a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    Put(Item),
    /// Physical primary key of the item to remove.
    Delete(Item),
}
