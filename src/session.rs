use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog::FieldCatalog;
use crate::columns::{ComputedColumn, ComputedColumns};
use crate::data::Row;
use crate::error::PicklistError;
use crate::ingest;
use crate::merge;
use crate::order::{OrderModel, SortDirection};
use crate::stats::{self, ColumnRange};

/// Persisted session snapshot; field names match the stored payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub csv_data: Vec<Row>,
    pub csv_fields: Vec<String>,
    pub sort_order: String,
    pub sort_direction: SortDirection,
    pub show_table: bool,
}

/// The active picklist session: rows, fields, computed-column definitions,
/// and the order model. Exclusively owned; every operation runs
/// synchronously to completion, so no two mutations ever race.
#[derive(Debug, Clone)]
pub struct Session {
    rows: Vec<Row>,
    catalog: FieldCatalog,
    columns: ComputedColumns,
    order: OrderModel,
    show_table: bool,
}

impl Session {
    /// First upload: builds rows and fields from a full CSV, then applies
    /// any previously authored computed columns to the fresh data.
    pub fn ingest(text: &str, columns: ComputedColumns) -> Result<Session, PicklistError> {
        let ingested = ingest::ingest(text)?;
        let mut session = Session {
            rows: ingested.rows,
            catalog: ingested.catalog,
            columns,
            order: OrderModel::default(),
            show_table: true,
        };
        session.reapply_columns();
        Ok(session)
    }

    pub fn from_state(state: SessionState, columns: Vec<ComputedColumn>) -> Session {
        Session {
            rows: state.csv_data,
            catalog: FieldCatalog::new(state.csv_fields),
            columns: ComputedColumns::new(columns),
            order: OrderModel::new(state.sort_order, state.sort_direction),
            show_table: state.show_table,
        }
    }

    pub fn to_state(&self) -> SessionState {
        SessionState {
            csv_data: self.rows.clone(),
            csv_fields: self.catalog.fields().to_vec(),
            sort_order: self.order.sort_column().to_string(),
            sort_direction: self.order.direction(),
            show_table: self.show_table,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn columns(&self) -> &ComputedColumns {
        &self.columns
    }

    pub fn order(&self) -> &OrderModel {
        &self.order
    }

    /// Merges a metrics-update CSV, refreshes computed cells from the new
    /// metrics, and reconciles the result with the current ordering.
    /// Returns how many teams the update matched.
    pub fn merge_update(&mut self, text: &str) -> Result<usize, PicklistError> {
        let mut merged = merge::merge_update(&self.rows, text)?;
        let base = self.columns.base_fields(&self.catalog);
        self.columns.recompute(&mut merged.rows, &base);
        self.order.data_refreshed(&mut self.rows, merged.rows);
        Ok(merged.matched)
    }

    pub fn add_column(&mut self, column: ComputedColumn) -> Result<(), PicklistError> {
        self.columns
            .add(column, &mut self.rows, &mut self.catalog)
    }

    pub fn remove_column(&mut self, name: &str) -> Result<(), PicklistError> {
        self.columns
            .remove(name, &mut self.rows, &mut self.catalog)
    }

    pub fn sort_requested(&mut self, column: &str) -> Result<(), PicklistError> {
        if !self.catalog.contains(column) {
            return Err(PicklistError::Validation(format!(
                "No column named '{column}'. Available columns: {}",
                self.catalog.fields().iter().join(", ")
            )));
        }
        self.order.sort_requested(column, &mut self.rows);
        Ok(())
    }

    pub fn row_dragged(&mut self, from: usize, to: usize) -> Result<(), PicklistError> {
        self.order.row_dragged(from, to, &mut self.rows)
    }

    pub fn order_edited(&mut self, team: i64, order: i64) -> Result<(), PicklistError> {
        self.order.order_edited(team, order, &mut self.rows)
    }

    pub fn deactivate(&mut self, team: i64) -> Result<(), PicklistError> {
        self.order.deactivate(team, &mut self.rows)
    }

    pub fn activate(&mut self, team: i64) -> Result<(), PicklistError> {
        self.order.activate(team, &mut self.rows)
    }

    pub fn ranges(&self) -> BTreeMap<String, ColumnRange> {
        stats::column_ranges(&self.rows, &self.catalog, &self.columns)
    }

    pub fn best_pick(&self) -> Option<&Row> {
        stats::best_pick(&self.rows)
    }

    /// Recomputes every stored column over the current rows and makes sure
    /// their names are listed after the base fields.
    fn reapply_columns(&mut self) {
        let base = self.columns.base_fields(&self.catalog);
        self.columns.recompute(&mut self.rows, &base);
        for name in self.columns.names() {
            self.catalog.push(name);
        }
    }
}
