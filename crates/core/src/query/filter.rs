use std::cmp::Ordering;
use std::collections::HashMap;

use crate::value::{AttrValue, Item};

/// Keep only items whose `attribute` equals one of `values`.
///
/// Applied by the backend after key matching; it never changes which
/// partition or sort range is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub attribute: String,
    pub values: Vec<AttrValue>,
}

impl Filter {
    pub fn new(attribute: &str, values: Vec<AttrValue>) -> Self {
        Self {
            attribute: attribute.to_string(),
            values,
        }
    }

    pub fn eq(attribute: &str, value: AttrValue) -> Self {
        Self::new(attribute, vec![value])
    }

    /// Whether a stored item passes this filter.
    pub fn matches(&self, item: &Item) -> bool {
        item.get(&self.attribute)
            .map(|stored| {
                self.values
                    .iter()
                    .any(|candidate| stored.compare(candidate) == Some(Ordering::Equal))
            })
            .unwrap_or(false)
    }

    /// Render as the `position`-th fragment, registering placeholders.
    pub(crate) fn render(
        &self,
        position: usize,
        names: &mut HashMap<String, String>,
        values: &mut HashMap<String, AttrValue>,
    ) -> String {
        let name = format!("#f{}", position);
        names.insert(name.clone(), self.attribute.clone());

        let placeholders: Vec<String> = self
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let placeholder = format!(":f{}_{}", position, i);
                values.insert(placeholder.clone(), value.clone());
                placeholder
            })
            .collect();

        match placeholders.as_slice() {
            [single] => format!("{} = {}", name, single),
            many => format!("{} IN ({})", name, many.join(", ")),
        }
    }
}
