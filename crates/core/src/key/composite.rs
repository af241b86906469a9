//! Composite attribute encoding.
//!
//! A composite attribute joins two or more logical values with the index's
//! separator character. Encoding refuses values that contain the separator
//! so decoding can always split back into exactly the declared parts.

use crate::schema::{CompositeSpec, EmptyParts};
use crate::storage::{Result, StoreError};

/// Encode logical values into a composite attribute.
///
/// `values` must be given in the order of `spec.parts`.
pub fn encode(attribute: &str, spec: &CompositeSpec, values: &[&str]) -> Result<String> {
    if values.len() != spec.parts.len() {
        return Err(StoreError::InvalidArgument(format!(
            "{} expects {} parts, got {}",
            attribute,
            spec.parts.len(),
            values.len()
        )));
    }

    for (part, value) in spec.parts.iter().zip(values) {
        if value.is_empty() && spec.empty_parts == EmptyParts::Reject {
            return Err(StoreError::validation(
                part,
                *value,
                format!("must not be empty in composite {}", attribute),
            ));
        }
        if value.contains(spec.separator) {
            return Err(StoreError::validation(
                part,
                *value,
                format!(
                    "must not contain separator '{}' used by {}",
                    spec.separator, attribute
                ),
            ));
        }
    }

    Ok(values.join(spec.separator.to_string().as_str()))
}

/// Decode a composite attribute back into its logical values.
///
/// The split must yield exactly as many parts as the composite declares.
pub fn decode(attribute: &str, spec: &CompositeSpec, encoded: &str) -> Result<Vec<String>> {
    let parts: Vec<&str> = encoded.split(spec.separator).collect();
    if parts.len() != spec.parts.len() {
        return Err(StoreError::CorruptKey {
            attribute: attribute.to_string(),
            value: encoded.to_string(),
            expected: spec.parts.len(),
            found: parts.len(),
        });
    }

    if spec.empty_parts == EmptyParts::Reject {
        if let Some((name, _)) = spec
            .parts
            .iter()
            .zip(&parts)
            .find(|(_, value)| value.is_empty())
        {
            return Err(StoreError::Decode(format!(
                "{} has an empty {} part: {:?}",
                attribute, name, encoded
            )));
        }
    }

    Ok(parts.into_iter().map(str::to_string).collect())
}
