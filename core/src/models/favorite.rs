use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Persisted projection of a recipe.
///
/// The descriptive fields are a snapshot taken when the recipe was
/// favorited; they are never refreshed from the catalog afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    #[serde(alias = "idMeal")]
    pub id: String,
    #[serde(alias = "strMeal", default)]
    pub name: String,
    #[serde(alias = "strMealThumb", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(alias = "strCategory", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(alias = "strArea", default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(alias = "dateAdded")]
    pub added_at: DateTime<Utc>,
}

impl FavoriteRecord {
    /// Newest first, then by id so equal timestamps still order deterministically
    fn snapshot_order(a: &Self, b: &Self) -> Ordering {
        b.added_at.cmp(&a.added_at).then_with(|| a.id.cmp(&b.id))
    }
}

/// Favorites sorted by `added_at`, newest first.
///
/// Always rebuilt wholesale from the table, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FavoritesSnapshot {
    records: Vec<FavoriteRecord>,
}

impl FavoritesSnapshot {
    pub fn new(mut records: Vec<FavoriteRecord>) -> Self {
        records.sort_by(FavoriteRecord::snapshot_order);
        Self { records }
    }

    pub fn records(&self) -> &[FavoriteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&FavoriteRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FavoriteRecord> {
        self.records.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|record| record.id.as_str()).collect()
    }
}

impl IntoIterator for FavoritesSnapshot {
    type Item = FavoriteRecord;
    type IntoIter = std::vec::IntoIter<FavoriteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a FavoritesSnapshot {
    type Item = &'a FavoriteRecord;
    type IntoIter = std::slice::Iter<'a, FavoriteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, secs: i64) -> FavoriteRecord {
        FavoriteRecord {
            id: id.to_string(),
            name: format!("Recipe {}", id),
            thumbnail_url: None,
            category: None,
            area: None,
            added_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_sorted_newest_first() {
        let snapshot = FavoritesSnapshot::new(vec![record("t1", 10), record("t3", 30), record("t2", 20)]);
        assert_eq!(snapshot.ids(), vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_snapshot_ties_broken_by_id() {
        let snapshot = FavoritesSnapshot::new(vec![record("b", 10), record("a", 10)]);
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_record_wire_shape() {
        let value = serde_json::to_value(record("52772", 0)).unwrap();
        assert_eq!(value["id"], "52772");
        assert_eq!(value["addedAt"], "1970-01-01T00:00:00Z");
        assert!(value.get("thumbnailUrl").is_none());
    }

    #[test]
    fn test_record_accepts_legacy_field_names() {
        let record: FavoriteRecord = serde_json::from_str(
            r#"{"idMeal":"52772","strMeal":"Teriyaki Chicken Casserole",
                "strCategory":"Chicken","strArea":"Japanese",
                "dateAdded":"2024-05-01T12:00:00.000Z"}"#,
        )
        .unwrap();

        assert_eq!(record.id, "52772");
        assert_eq!(record.area.as_deref(), Some("Japanese"));
        assert_eq!(record.added_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }
}
