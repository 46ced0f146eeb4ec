use crate::data::{Row, Value};

pub const PICKLIST_ORDER: &str = "Picklist Order";
pub const TEAM: &str = "Team";
pub const RANK: &str = "Rank";

/// Structural fields are never substitutable in formulas and never
/// overwritten by merges.
pub const STRUCTURAL_FIELDS: [&str; 3] = [PICKLIST_ORDER, TEAM, RANK];

pub fn is_structural(field: &str) -> bool {
    STRUCTURAL_FIELDS.contains(&field)
}

/// Canonical key for a display field name: lowercased with every whitespace
/// character removed. Both the computed-column and CSV ingestion paths store
/// row values under this form.
pub fn canonical_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolves a field's value on a row: canonical-key lookup first, then a
/// case-insensitive scan of the row's existing keys. Legacy rows can carry
/// keys that were not canonicalized on write; both paths must resolve alike.
pub fn lookup_value<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    let key = canonical_key(field);
    if let Some(value) = row.values.get(&key) {
        return Some(value);
    }
    row.values
        .iter()
        .find(|(existing, _)| existing.to_lowercase() == key)
        .map(|(_, value)| value)
}

/// The ordered list of display field names currently in effect: base fields
/// in CSV order, then computed-column names in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCatalog {
    fields: Vec<String>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Appends a field unless it is already listed (re-added computed
    /// columns keep their position).
    pub fn push(&mut self, name: String) {
        if !self.contains(&name) {
            self.fields.push(name);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| f != name);
    }

    /// Fields minus the given computed-column names.
    pub fn base_fields(&self, computed_names: &[String]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !computed_names.contains(f))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;

    #[test]
    fn canonical_key_strips_whitespace_and_case() {
        assert_eq!(canonical_key("Auto EPA"), "autoepa");
        assert_eq!(canonical_key("  Deep Cage\tClimb "), "deepcageclimb");
        assert_eq!(canonical_key("Team"), "team");
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive_scan() {
        let mut row = Row::new(100, 1);
        row.values
            .insert("AutoEPA".to_string(), Value::Number(7.0));
        // canonical key "autoepa" is absent; the scan must still resolve it
        assert_eq!(
            lookup_value(&row, "Auto EPA"),
            Some(&Value::Number(7.0))
        );
    }

    #[test]
    fn push_keeps_existing_position() {
        let mut catalog = FieldCatalog::new(vec!["A".to_string(), "B".to_string()]);
        catalog.push("A".to_string());
        assert_eq!(catalog.fields(), ["A", "B"]);
        catalog.push("C".to_string());
        assert_eq!(catalog.fields(), ["A", "B", "C"]);
    }

    #[test]
    fn base_fields_excludes_computed_names() {
        let catalog = FieldCatalog::new(vec![
            PICKLIST_ORDER.to_string(),
            TEAM.to_string(),
            "Auto EPA".to_string(),
            "Weighted".to_string(),
        ]);
        let base = catalog.base_fields(&["Weighted".to_string()]);
        assert_eq!(base, [PICKLIST_ORDER, TEAM, "Auto EPA"]);
    }
}
