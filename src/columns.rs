use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalog::{FieldCatalog, canonical_key};
use crate::data::{Row, Value};
use crate::error::PicklistError;
use crate::formula::{Formula, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Boolean,
}

/// A user-authored computed column: `{name, formula, type}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputedColumn {
    pub name: String,
    pub formula: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
}

/// The ordered set of computed-column definitions. Definitions outlive any
/// single row store and are reapplied after every mutation of metric data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedColumns {
    columns: Vec<ComputedColumn>,
}

impl ComputedColumns {
    pub fn new(columns: Vec<ComputedColumn>) -> Self {
        Self { columns }
    }

    pub fn definitions(&self) -> &[ComputedColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_boolean(&self, field: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name == field && c.kind == ColumnKind::Boolean)
    }

    /// Base (non-computed) fields of the catalog. Formulas resolve against
    /// these only; computed columns cannot reference each other.
    pub fn base_fields(&self, catalog: &FieldCatalog) -> Vec<String> {
        catalog.base_fields(&self.names())
    }

    /// Validates the definition, stores it (overwriting in place when the
    /// name already exists), materializes the column over every row, and
    /// extends the catalog.
    pub fn add(
        &mut self,
        column: ComputedColumn,
        rows: &mut [Row],
        catalog: &mut FieldCatalog,
    ) -> Result<(), PicklistError> {
        let name = column.name.trim();
        if name.is_empty() {
            return Err(PicklistError::Validation(
                "Please enter a column name.".to_string(),
            ));
        }
        let formula_text = column.formula.trim();
        if formula_text.is_empty() {
            return Err(PicklistError::Validation(
                "Please enter a formula.".to_string(),
            ));
        }
        let column = ComputedColumn {
            name: name.to_string(),
            formula: formula_text.to_string(),
            kind: column.kind,
        };

        // Referencing another computed column fails here: only base fields
        // are candidates.
        let base = self.base_fields(catalog);
        let formula = Formula::parse(&column.formula, &base, column.kind)?;

        match self.columns.iter().position(|c| c.name == column.name) {
            Some(idx) => self.columns[idx] = column.clone(),
            None => self.columns.push(column.clone()),
        }

        let key = canonical_key(&column.name);
        for row in rows.iter_mut() {
            apply_cell(row, &key, &formula, column.kind);
        }
        catalog.push(column.name);
        Ok(())
    }

    /// Deletes the definition, the corresponding key on every row, and the
    /// catalog entry.
    pub fn remove(
        &mut self,
        name: &str,
        rows: &mut [Row],
        catalog: &mut FieldCatalog,
    ) -> Result<(), PicklistError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                PicklistError::Validation(format!("No computed column named '{name}'"))
            })?;
        self.columns.remove(idx);
        let key = canonical_key(name);
        for row in rows.iter_mut() {
            row.values.remove(&key);
        }
        catalog.remove(name);
        Ok(())
    }

    /// Reruns every stored formula, in definition order, against the base
    /// fields only. Idempotent: unchanged inputs produce identical values.
    pub fn recompute(&self, rows: &mut [Row], base_fields: &[String]) {
        for column in &self.columns {
            let key = canonical_key(&column.name);
            match Formula::parse(&column.formula, base_fields, column.kind) {
                Ok(formula) => {
                    for row in rows.iter_mut() {
                        apply_cell(row, &key, &formula, column.kind);
                    }
                }
                Err(err) => {
                    warn!("Skipping computed column '{}': {err}", column.name);
                    for row in rows.iter_mut() {
                        row.values.remove(&key);
                    }
                }
            }
        }
    }
}

/// A failed or type-mismatched compute unsets the cell; it never aborts the
/// batch.
fn apply_cell(row: &mut Row, key: &str, formula: &Formula, kind: ColumnKind) {
    let computed = match formula.evaluate(row) {
        Ok(Outcome::Number(n)) if kind == ColumnKind::Numeric && n.is_finite() => {
            Some(Value::Number(n))
        }
        Ok(Outcome::Bool(b)) if kind == ColumnKind::Boolean => Some(Value::Bool(b)),
        _ => None,
    };
    match computed {
        Some(value) => {
            row.values.insert(key.to_string(), value);
        }
        None => {
            row.values.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PICKLIST_ORDER, TEAM};

    fn setup() -> (Vec<Row>, FieldCatalog) {
        let mut first = Row::new(100, 1);
        first
            .values
            .insert("autoepa".to_string(), Value::Number(10.0));
        let mut second = Row::new(200, 2);
        second
            .values
            .insert("autoepa".to_string(), Value::Number(4.0));
        let catalog = FieldCatalog::new(vec![
            PICKLIST_ORDER.to_string(),
            TEAM.to_string(),
            "Auto EPA".to_string(),
        ]);
        (vec![first, second], catalog)
    }

    fn numeric(name: &str, formula: &str) -> ComputedColumn {
        ComputedColumn {
            name: name.to_string(),
            formula: formula.to_string(),
            kind: ColumnKind::Numeric,
        }
    }

    #[test]
    fn add_materializes_and_extends_catalog() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(numeric("Doubled", "Auto EPA * 2"), &mut rows, &mut catalog)
            .unwrap();
        assert_eq!(rows[0].values.get("doubled"), Some(&Value::Number(20.0)));
        assert_eq!(rows[1].values.get("doubled"), Some(&Value::Number(8.0)));
        assert_eq!(catalog.fields().last().map(String::as_str), Some("Doubled"));
    }

    #[test]
    fn re_adding_a_name_overwrites_in_place() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(numeric("Score", "Auto EPA * 2"), &mut rows, &mut catalog)
            .unwrap();
        columns
            .add(numeric("Other", "Auto EPA + 1"), &mut rows, &mut catalog)
            .unwrap();
        columns
            .add(numeric("Score", "Auto EPA * 3"), &mut rows, &mut catalog)
            .unwrap();

        assert_eq!(columns.names(), ["Score", "Other"]);
        assert_eq!(rows[0].values.get("score"), Some(&Value::Number(30.0)));
        // catalog position preserved
        assert_eq!(
            catalog.fields().iter().filter(|f| *f == "Score").count(),
            1
        );
    }

    #[test]
    fn computed_columns_cannot_reference_each_other() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(numeric("Doubled", "Auto EPA * 2"), &mut rows, &mut catalog)
            .unwrap();
        let err = columns
            .add(numeric("Quadrupled", "Doubled * 2"), &mut rows, &mut catalog)
            .unwrap_err();
        assert!(err.to_string().contains("must reference at least one column"));
    }

    #[test]
    fn remove_clears_rows_and_catalog() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(numeric("Doubled", "Auto EPA * 2"), &mut rows, &mut catalog)
            .unwrap();
        columns
            .remove("Doubled", &mut rows, &mut catalog)
            .unwrap();
        assert!(rows[0].values.get("doubled").is_none());
        assert!(!catalog.contains("Doubled"));
        assert!(columns.definitions().is_empty());
    }

    #[test]
    fn recompute_is_idempotent() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(numeric("Doubled", "Auto EPA * 2"), &mut rows, &mut catalog)
            .unwrap();

        let base = columns.base_fields(&catalog);
        columns.recompute(&mut rows, &base);
        let first_pass = rows.clone();
        columns.recompute(&mut rows, &base);
        assert_eq!(rows, first_pass);
    }

    #[test]
    fn boolean_column_stores_bools() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        columns
            .add(
                ComputedColumn {
                    name: "Strong".to_string(),
                    formula: "Auto EPA > 5".to_string(),
                    kind: ColumnKind::Boolean,
                },
                &mut rows,
                &mut catalog,
            )
            .unwrap();
        assert_eq!(rows[0].values.get("strong"), Some(&Value::Bool(true)));
        assert_eq!(rows[1].values.get("strong"), Some(&Value::Bool(false)));
    }

    #[test]
    fn blank_name_and_formula_are_rejected() {
        let (mut rows, mut catalog) = setup();
        let mut columns = ComputedColumns::default();
        let err = columns
            .add(numeric("  ", "Auto EPA"), &mut rows, &mut catalog)
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter a column name.");
        let err = columns
            .add(numeric("Score", "  "), &mut rows, &mut catalog)
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter a formula.");
    }
}
