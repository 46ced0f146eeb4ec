use std::collections::BTreeMap;

use crate::catalog::{self, FieldCatalog, PICKLIST_ORDER, TEAM};
use crate::columns::ComputedColumns;
use crate::data::{Row, Value};

/// Observed numeric bounds for one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    /// Position of `value` inside the range, clamped to [0, 1]. `None` when
    /// the column has no variation, so no ranking signal applies.
    pub fn normalized(&self, value: f64) -> Option<f64> {
        if self.max == self.min {
            return None;
        }
        Some(((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0))
    }
}

/// Min/max per rankable column. Structural fields, anything named like a
/// rank, and boolean computed columns are excluded; only cells that hold
/// numbers contribute. Missing or text cells are ignored, never zero.
pub fn column_ranges(
    rows: &[Row],
    catalog: &FieldCatalog,
    columns: &ComputedColumns,
) -> BTreeMap<String, ColumnRange> {
    let mut ranges = BTreeMap::new();
    for field in catalog.fields() {
        if field == PICKLIST_ORDER || field == TEAM {
            continue;
        }
        if field.to_lowercase().contains("rank") {
            continue;
        }
        if columns.is_boolean(field) {
            continue;
        }
        let mut range: Option<ColumnRange> = None;
        for row in rows {
            if let Some(Value::Number(n)) = catalog::lookup_value(row, field) {
                range = Some(match range {
                    Some(current) => ColumnRange {
                        min: current.min.min(*n),
                        max: current.max.max(*n),
                    },
                    None => ColumnRange { min: *n, max: *n },
                });
            }
        }
        if let Some(range) = range {
            ranges.insert(field.clone(), range);
        }
    }
    ranges
}

/// The team with the lowest picklistOrder among active rows; ties keep the
/// earlier row.
pub fn best_pick(rows: &[Row]) -> Option<&Row> {
    rows.iter()
        .filter(|r| r.is_active())
        .min_by_key(|r| r.picklist_order)
}
