use std::collections::HashSet;

use csv::{ReaderBuilder, Trim};
use log::debug;

use crate::catalog::{FieldCatalog, PICKLIST_ORDER, TEAM, canonical_key};
use crate::data::{Row, parse_cell};
use crate::error::PicklistError;

/// The row store and field catalog produced by a full upload.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub rows: Vec<Row>,
    pub catalog: FieldCatalog,
}

/// Builds rows and fields from a full CSV upload.
///
/// Malformed data rows (wrong cell count, unparseable or duplicate team
/// number) are skipped, not fatal; a header-only or identity-less CSV is a
/// format error. Zero accepted rows is not an error here; the caller
/// reports it as "no data".
pub fn ingest(text: &str) -> Result<Ingested, PicklistError> {
    let (headers, records) = read_csv(text)?;
    let team_idx = find_identity_column(&headers)?;
    let dropped = duplicate_identity_columns(&headers, team_idx);

    let mut fields = vec![PICKLIST_ORDER.to_string(), TEAM.to_string()];
    for (idx, header) in headers.iter().enumerate() {
        if idx == team_idx || dropped.contains(&idx) {
            continue;
        }
        fields.push(header.clone());
    }

    let mut rows: Vec<Row> = Vec::new();
    let mut seen = HashSet::new();
    for cells in &records {
        if cells.len() != headers.len() {
            continue;
        }
        let Some(team_number) = parse_team(&cells[team_idx]) else {
            continue;
        };
        if !seen.insert(team_number) {
            // first occurrence wins
            continue;
        }
        let mut row = Row::new(team_number, rows.len() as i64 + 1);
        for (idx, header) in headers.iter().enumerate() {
            if idx == team_idx || dropped.contains(&idx) {
                continue;
            }
            row.values.insert(canonical_key(header), parse_cell(&cells[idx]));
        }
        rows.push(row);
    }

    debug!(
        "Ingested {} row(s) across {} field(s)",
        rows.len(),
        fields.len()
    );
    Ok(Ingested {
        rows,
        catalog: FieldCatalog::new(fields),
    })
}

/// Splits CSV text into trimmed headers and records. Quoting is disabled:
/// the wire format is plain comma separation with no escaping.
pub(crate) fn read_csv(text: &str) -> Result<(Vec<String>, Vec<Vec<String>>), PicklistError> {
    if text.trim().lines().count() < 2 {
        return Err(PicklistError::Format(
            "CSV must have at least a header row and one data row".to_string(),
        ));
    }
    let mut reader = ReaderBuilder::new()
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| PicklistError::Format(format!("Failed to read CSV header: {err}")))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|err| PicklistError::Format(format!("Failed to read CSV row: {err}")))?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, records))
}

/// "Team Number" is authoritative; a plain "Team" header is the fallback.
pub(crate) fn find_identity_column(headers: &[String]) -> Result<usize, PicklistError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("team number"))
        .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case("team")))
        .ok_or_else(|| {
            PicklistError::Format("CSV must have a 'Team Number' or 'Team' column".to_string())
        })
}

/// Any identity-named column other than the authoritative one is dropped
/// from both the field list and the row data.
fn duplicate_identity_columns(headers: &[String], team_idx: usize) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(idx, h)| {
            *idx != team_idx
                && (h.eq_ignore_ascii_case("team") || h.eq_ignore_ascii_case("team number"))
        })
        .map(|(idx, _)| idx)
        .collect()
}

pub(crate) fn parse_team(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().filter(|n| *n > 0)
}
