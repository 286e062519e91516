use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Optional dedicated calendar. Falls back to the tenant calendar
    /// when absent.
    pub calendar_id: Option<String>,
    pub active: bool,
}

/// Case-insensitive catalog narrowing for free-text hints out of the
/// intent extractor ("corte" should find "Corte de cabelo").
pub fn filter_by_hint<'a, T>(items: &'a [T], hint: &str, name: impl Fn(&T) -> &str) -> Vec<&'a T> {
    let needle = hint.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items
        .iter()
        .filter(|item| name(item).to_lowercase().contains(&needle))
        .collect()
}
