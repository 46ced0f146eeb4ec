use std::fmt::Write as _;

use crate::catalog::{self, FieldCatalog, PICKLIST_ORDER, TEAM};
use crate::data::Row;

/// Renders the picklist as an aligned text table, fields in catalog order.
pub fn render_picklist(rows: &[Row], catalog: &FieldCatalog, limit: Option<usize>) -> String {
    let headers = catalog.fields().to_vec();
    let body: Vec<Vec<String>> = rows
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|row| headers.iter().map(|field| display_cell(row, field)).collect())
        .collect();
    render_table(&headers, &body)
}

fn display_cell(row: &Row, field: &str) -> String {
    if field == PICKLIST_ORDER {
        return row.picklist_order.to_string();
    }
    if field == TEAM {
        return row.team_number.to_string();
    }
    catalog::lookup_value(row, field)
        .map(|value| value.as_display())
        .unwrap_or_default()
}

/// Column-aligned table with a dashed separator under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let mut out = cell.clone();
            let missing = width.saturating_sub(cell.chars().count());
            out.push_str(&" ".repeat(missing));
            out
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn picklist_renders_in_catalog_order() {
        let catalog = FieldCatalog::new(vec![
            PICKLIST_ORDER.to_string(),
            TEAM.to_string(),
            "Auto EPA".to_string(),
        ]);
        let mut row = Row::new(100, 1);
        row.values.insert("autoepa".to_string(), Value::Number(5.0));

        let rendered = render_picklist(&[row], &catalog, None);
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap(), "Picklist Order  Team  Auto EPA");
        assert!(lines.next().unwrap().starts_with("---"));
        assert_eq!(lines.next().unwrap().trim_end(), "1               100   5");
    }

    #[test]
    fn limit_truncates_rows() {
        let catalog = FieldCatalog::new(vec![PICKLIST_ORDER.to_string(), TEAM.to_string()]);
        let rows = vec![Row::new(100, 1), Row::new(200, 2)];
        let rendered = render_picklist(&rows, &catalog, Some(1));
        assert!(rendered.contains("100"));
        assert!(!rendered.contains("200"));
    }
}
