use keyway_core::schema::EntitySchema;
use keyway_core::storage::Result;
use keyway_core::value::Item;

/// A domain model stored in one table.
///
/// `to_item` and `from_item` deal only in logical attributes; composite key
/// attributes are derived from the schema on write and decoded on read.
pub trait Entity: Sized + Send + 'static {
    fn schema() -> &'static EntitySchema;

    fn to_item(&self) -> Item;

    fn from_item(item: &Item) -> Result<Self>;

    /// Builds an entity from a keys-only index item, where only key
    /// attributes (and the logical parts they encode) are present.
    fn from_keys(item: &Item) -> Result<Self> {
        Self::from_item(item)
    }
}
