//! Per-row validation against a capture base.

use std::collections::{BTreeMap, BTreeSet};

use m2io_bundle::Bundle;
use m2io_model::{AttributeType, FillPolicy, IngestOptions, Record, UnknownAttributePolicy, Value};

use crate::error::{FeedError, IngestError};

/// Where one source column lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnTarget {
    Attribute { name: String, ty: AttributeType },
    Unknown { column: String },
}

/// Column-to-attribute resolution for one batch, computed once per feed.
#[derive(Debug, Clone)]
pub(crate) struct RowValidator<'a> {
    bundle: &'a Bundle,
    options: &'a IngestOptions,
    targets: Vec<ColumnTarget>,
    mandatory: BTreeSet<&'a str>,
}

impl<'a> RowValidator<'a> {
    /// Map `columns` to attributes: exact name first, then caller aliases,
    /// then `label` overlay labels.
    pub(crate) fn new(
        bundle: &'a Bundle,
        options: &'a IngestOptions,
        columns: &[String],
    ) -> Result<Self, FeedError> {
        let capture_base = bundle.capture_base();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();
        let mut targets = Vec::with_capacity(columns.len());

        for column in columns {
            if !seen.insert(column.as_str()) {
                return Err(FeedError::DuplicateColumn {
                    column: column.clone(),
                });
            }
            let attribute = if capture_base.contains(column) {
                Some(column.as_str())
            } else {
                options
                    .aliases
                    .get(column)
                    .map(String::as_str)
                    .filter(|name| capture_base.contains(name))
                    .or_else(|| bundle.attribute_for_label(column))
            };
            let Some(attribute) = attribute else {
                targets.push(ColumnTarget::Unknown {
                    column: column.clone(),
                });
                continue;
            };
            if let Some(first) = claimed.insert(attribute.to_string(), column.clone()) {
                return Err(FeedError::AmbiguousColumns {
                    attribute: attribute.to_string(),
                    first,
                    second: column.clone(),
                });
            }
            let ty = capture_base
                .attribute_type(attribute)
                .unwrap_or(AttributeType::Text);
            targets.push(ColumnTarget::Attribute {
                name: attribute.to_string(),
                ty,
            });
        }

        Ok(Self {
            bundle,
            options,
            targets,
            mandatory: bundle.mandatory_attributes(),
        })
    }

    #[cfg(test)]
    pub(crate) fn targets(&self) -> &[ColumnTarget] {
        &self.targets
    }

    /// Validate one row into a record conforming to the capture base.
    pub(crate) fn validate(&self, cells: &[Value]) -> Result<Record, IngestError> {
        let mut record = Record::new();
        for (target, cell) in self.targets.iter().zip(cells) {
            match target {
                ColumnTarget::Unknown { column } => {
                    if !cell.is_null()
                        && self.options.unknown_attributes == UnknownAttributePolicy::Reject
                    {
                        return Err(IngestError::UnknownAttribute {
                            column: column.clone(),
                        });
                    }
                }
                ColumnTarget::Attribute { name, ty } => {
                    let value = cell
                        .coerce(*ty)
                        .map_err(|source| IngestError::TypeMismatch {
                            attribute: name.clone(),
                            source,
                        })?;
                    record.insert(name.clone(), value);
                }
            }
        }

        for (name, ty) in self.bundle.capture_base().attributes() {
            if !record.value(name).is_null() {
                continue;
            }
            if self.mandatory.contains(name) {
                return Err(IngestError::MissingRequiredAttribute {
                    attribute: name.to_string(),
                });
            }
            let fill = match self.options.missing_values {
                FillPolicy::Null => Value::Null,
                FillPolicy::TypeDefault => ty.default_value(),
            };
            record.insert(name, fill);
        }
        Ok(record)
    }
}
