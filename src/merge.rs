use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::catalog::canonical_key;
use crate::data::{Row, Value, parse_cell};
use crate::error::PicklistError;
use crate::ingest::{find_identity_column, parse_team, read_csv};

/// Outcome of merging a metrics-update CSV into an existing row store.
#[derive(Debug, Clone)]
pub struct Merged {
    pub rows: Vec<Row>,
    /// Teams whose metrics were overwritten by the update.
    pub matched: usize,
}

/// Reconciles a metrics-update CSV against existing rows. Identity and
/// ordering are locked: `team_number` and `picklist_order` always come from
/// the existing row, whatever the update supplies. Rows absent from the
/// update are returned unchanged.
pub fn merge_update(existing: &[Row], text: &str) -> Result<Merged, PicklistError> {
    let updates = parse_update(text)?;
    let mut matched = 0;
    let rows = existing
        .iter()
        .map(|row| match updates.get(&row.team_number) {
            Some(metrics) => {
                matched += 1;
                apply_update(row, metrics)
            }
            None => row.clone(),
        })
        .collect();
    debug!(
        "Merged update: {matched} of {} team(s) matched",
        existing.len()
    );
    Ok(Merged { rows, matched })
}

/// Parses the update CSV into a team-number → metrics map. Identity and
/// ordering headers are discarded outright; rows without a valid positive
/// team number are skipped; a later row for the same team replaces the
/// earlier entry.
pub(crate) fn parse_update(
    text: &str,
) -> Result<HashMap<i64, BTreeMap<String, Value>>, PicklistError> {
    let (headers, records) = read_csv(text)?;
    let team_idx = find_identity_column(&headers)?;

    let mut updates = HashMap::new();
    for cells in &records {
        if cells.len() != headers.len() {
            continue;
        }
        let Some(team_number) = parse_team(&cells[team_idx]) else {
            continue;
        };
        let mut metrics = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == team_idx || is_locked_header(header) {
                continue;
            }
            metrics.insert(canonical_key(header), parse_cell(&cells[idx]));
        }
        updates.insert(team_number, metrics);
    }

    if updates.is_empty() {
        return Err(PicklistError::Format(
            "No valid data found in CSV file".to_string(),
        ));
    }
    Ok(updates)
}

/// First line of defense: a header whose normalized form (lowercase, with
/// whitespace, `_`, and `-` stripped) contains "team" or "picklistorder"
/// never enters the update map.
fn is_locked_header(header: &str) -> bool {
    let normalized: String = header
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();
    normalized.contains("team") || normalized.contains("picklistorder")
}

/// Second line of defense at apply time: keys mentioning team or picklist
/// are skipped even if they slipped into the map.
fn is_locked_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("team") || lower.contains("picklist")
}

fn apply_update(existing: &Row, metrics: &BTreeMap<String, Value>) -> Row {
    // team_number and picklist_order are struct fields, not map entries;
    // starting from a clone keeps both exactly as they were.
    let mut merged = existing.clone();
    for (key, value) in metrics {
        if is_locked_key(key) {
            continue;
        }
        merged.values.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest;

    fn base_rows() -> Vec<Row> {
        ingest("Team Number,Auto EPA,Drivetrain\n100,5,swerve\n200,3,tank\n")
            .unwrap()
            .rows
    }

    #[test]
    fn overwrites_metrics_and_preserves_identity() {
        let rows = base_rows();
        let merged = merge_update(&rows, "Team Number,Auto EPA\n100,9\n").unwrap();
        assert_eq!(merged.matched, 1);
        assert_eq!(merged.rows[0].team_number, 100);
        assert_eq!(merged.rows[0].picklist_order, 1);
        assert_eq!(
            merged.rows[0].values.get("autoepa"),
            Some(&Value::Number(9.0))
        );
        // untouched metric survives
        assert_eq!(
            merged.rows[0].values.get("drivetrain"),
            Some(&Value::Text("swerve".to_string()))
        );
    }

    #[test]
    fn absent_rows_come_back_unchanged() {
        let rows = base_rows();
        let merged = merge_update(&rows, "Team Number,Auto EPA\n100,9\n").unwrap();
        assert_eq!(merged.rows[1], rows[1]);
    }

    #[test]
    fn update_cannot_supply_identity_or_order() {
        let mut rows = base_rows();
        rows[0].picklist_order = 7;
        let merged = merge_update(
            &rows,
            "Team Number,Team,Picklist Order,picklist_order,Auto EPA\n100,555,42,43,9\n",
        )
        .unwrap();
        assert_eq!(merged.rows[0].team_number, 100);
        assert_eq!(merged.rows[0].picklist_order, 7);
        assert!(merged.rows[0].values.get("team").is_none());
        assert!(merged.rows[0].values.get("picklistorder").is_none());
        assert_eq!(
            merged.rows[0].values.get("autoepa"),
            Some(&Value::Number(9.0))
        );
    }

    #[test]
    fn later_update_rows_replace_earlier_ones() {
        let rows = base_rows();
        let merged =
            merge_update(&rows, "Team Number,Auto EPA\n100,1\n100,2\n").unwrap();
        assert_eq!(
            merged.rows[0].values.get("autoepa"),
            Some(&Value::Number(2.0))
        );
    }

    #[test]
    fn invalid_update_rows_are_skipped() {
        let rows = base_rows();
        let merged =
            merge_update(&rows, "Team Number,Auto EPA\n-1,2\nabc,3\n200,8\n").unwrap();
        assert_eq!(merged.matched, 1);
        assert_eq!(
            merged.rows[1].values.get("autoepa"),
            Some(&Value::Number(8.0))
        );
    }

    #[test]
    fn update_with_no_valid_rows_is_a_format_error() {
        let rows = base_rows();
        let err = merge_update(&rows, "Team Number,Auto EPA\n0,2\n").unwrap_err();
        assert_eq!(err.to_string(), "No valid data found in CSV file");
    }

    #[test]
    fn update_without_identity_column_is_a_format_error() {
        let rows = base_rows();
        let err = merge_update(&rows, "Robot,Auto EPA\n100,2\n").unwrap_err();
        assert!(err.to_string().contains("'Team Number' or 'Team'"));
    }
}
