use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, PICKLIST_ORDER, TEAM};
use crate::data::{INACTIVE_ORDER, Row, Value};
use crate::error::PicklistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// How the current row order came to be. Exactly one applies at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    /// Positions follow the active sort column and direction.
    Sorted,
    /// Positions were fixed by a drag; they survive data refreshes until
    /// the next sort request.
    Manual,
    /// A picklistOrder value was typed directly; positions are left alone
    /// until the next refresh or sort.
    Edited,
}

/// Reconciles the three competing orderings: declared sort, manual drag
/// order, and direct picklistOrder edits.
#[derive(Debug, Clone)]
pub struct OrderModel {
    sort_column: String,
    direction: SortDirection,
    state: OrderState,
    parked: HashMap<i64, i64>,
}

impl Default for OrderModel {
    fn default() -> Self {
        Self::new(PICKLIST_ORDER.to_string(), SortDirection::Asc)
    }
}

impl OrderModel {
    pub fn new(sort_column: String, direction: SortDirection) -> Self {
        Self {
            sort_column,
            direction,
            state: OrderState::Sorted,
            parked: HashMap::new(),
        }
    }

    pub fn sort_column(&self) -> &str {
        &self.sort_column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    /// A header click: the same column toggles direction, a new column
    /// defaults to ascending for Picklist Order and descending otherwise.
    /// Either way manual order is cleared and a fresh sort applies.
    pub fn sort_requested(&mut self, column: &str, rows: &mut [Row]) {
        if self.sort_column == column {
            self.direction = self.direction.toggled();
        } else {
            self.sort_column = column.to_string();
            self.direction = if column == PICKLIST_ORDER {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
        }
        self.state = OrderState::Sorted;
        self.apply_sort(rows);
    }

    /// Moves one row to an arbitrary index in the visible order.
    pub fn row_dragged(
        &mut self,
        from: usize,
        to: usize,
        rows: &mut Vec<Row>,
    ) -> Result<(), PicklistError> {
        if from >= rows.len() || to >= rows.len() {
            return Err(PicklistError::Validation(format!(
                "Row index out of range (the table has {} rows)",
                rows.len()
            )));
        }
        let moved = rows.remove(from);
        rows.insert(to, moved);
        self.state = OrderState::Manual;
        Ok(())
    }

    /// Sets an active row's picklistOrder to the literal value typed.
    pub fn order_edited(
        &mut self,
        team: i64,
        order: i64,
        rows: &mut [Row],
    ) -> Result<(), PicklistError> {
        let row = find_team(rows, team)?;
        if !row.is_active() {
            return Err(PicklistError::Validation(format!(
                "Team {team} is inactive; reactivate it before editing its order"
            )));
        }
        row.picklist_order = order;
        self.state = OrderState::Edited;
        Ok(())
    }

    /// Reconciles refreshed data (e.g. after a merge) with the current
    /// ordering. Manual order is preserved by splicing refreshed rows in by
    /// team number; any other state re-sorts under the active parameters.
    pub fn data_refreshed(&mut self, rows: &mut Vec<Row>, refreshed: Vec<Row>) {
        if self.state == OrderState::Manual {
            let mut by_team: HashMap<i64, Row> = refreshed
                .into_iter()
                .map(|row| (row.team_number, row))
                .collect();
            for slot in rows.iter_mut() {
                if let Some(updated) = by_team.remove(&slot.team_number) {
                    *slot = updated;
                }
            }
        } else {
            *rows = refreshed;
            self.state = OrderState::Sorted;
            self.apply_sort(rows);
        }
    }

    /// Parks the row's current order aside and writes the inactivity
    /// sentinel in its place.
    pub fn deactivate(&mut self, team: i64, rows: &mut [Row]) -> Result<(), PicklistError> {
        let row = find_team(rows, team)?;
        if !row.is_active() {
            return Ok(());
        }
        self.parked.insert(team, row.picklist_order);
        row.picklist_order = INACTIVE_ORDER;
        Ok(())
    }

    /// Restores the parked order, if one exists, and clears it.
    pub fn activate(&mut self, team: i64, rows: &mut [Row]) -> Result<(), PicklistError> {
        let row = find_team(rows, team)?;
        if let Some(previous) = self.parked.remove(&team) {
            row.picklist_order = previous;
        }
        Ok(())
    }

    /// Stable sort under the active column and direction, so ties keep
    /// their relative input order.
    pub fn apply_sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| {
            let ordering = compare_cells(
                sort_cell(a, &self.sort_column).as_ref(),
                sort_cell(b, &self.sort_column).as_ref(),
            );
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

fn find_team<'a>(rows: &'a mut [Row], team: i64) -> Result<&'a mut Row, PicklistError> {
    rows.iter_mut()
        .find(|r| r.team_number == team)
        .ok_or_else(|| PicklistError::Validation(format!("No team {team} in the current table")))
}

fn sort_cell(row: &Row, column: &str) -> Option<Value> {
    if column == TEAM {
        return Some(Value::Number(row.team_number as f64));
    }
    if column == PICKLIST_ORDER {
        return Some(Value::Number(row.picklist_order as f64));
    }
    catalog::lookup_value(row, column).cloned()
}

/// Numeric when both cells are numeric, otherwise string comparison with a
/// case-insensitive pass first. Missing cells compare as empty strings.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.total_cmp(y),
        _ => {
            let left = a.map(Value::as_display).unwrap_or_default();
            let right = b.map(Value::as_display).unwrap_or_default();
            compare_text(&left, &right)
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match a.to_lowercase().cmp(&b.to_lowercase()) {
        Ordering::Equal => a.cmp(b),
        unequal => unequal,
    }
}
