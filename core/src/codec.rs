//! Conversion between catalog recipes, favorite records and raw table values.

use crate::models::{FavoriteRecord, FavoritesSnapshot, Recipe};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Project a recipe into a favorite record stamped with the current time
pub fn encode(recipe: &Recipe) -> Result<FavoriteRecord> {
    encode_at(recipe, Utc::now())
}

/// Project a recipe into a favorite record stamped with `added_at`
pub fn encode_at(recipe: &Recipe, added_at: DateTime<Utc>) -> Result<FavoriteRecord> {
    let id = recipe.id.trim();
    if id.is_empty() {
        return Err(Error::InvalidRecipe(format!(
            "recipe {:?} has no identifier",
            recipe.name
        )));
    }

    Ok(FavoriteRecord {
        id: id.to_string(),
        name: recipe.name.clone(),
        thumbnail_url: recipe.thumbnail_url.clone(),
        category: recipe.category.clone(),
        area: recipe.area.clone(),
        added_at,
    })
}

/// Wire representation of a record
pub fn to_value(record: &FavoriteRecord) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

/// Decode one stored value
pub fn decode(raw: &Value) -> Result<FavoriteRecord> {
    if !raw.is_object() {
        return Err(Error::CorruptRecord(format!("expected an object, got {}", raw)));
    }

    let record: FavoriteRecord =
        serde_json::from_value(raw.clone()).map_err(|e| Error::CorruptRecord(e.to_string()))?;

    if record.id.trim().is_empty() {
        return Err(Error::CorruptRecord("empty id".to_string()));
    }

    Ok(record)
}

/// Decode a whole favorites subtree, skipping entries that do not decode
pub fn decode_table(table: Option<&Value>) -> FavoritesSnapshot {
    let entries = match table {
        Some(Value::Object(entries)) => entries,
        Some(Value::Null) | None => return FavoritesSnapshot::default(),
        Some(other) => {
            tracing::warn!(value = %other, "favorites table is not an object, treating as empty");
            return FavoritesSnapshot::default();
        }
    };

    let records = entries
        .iter()
        .filter_map(|(key, raw)| match decode(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping undecodable favorite");
                None
            }
        })
        .collect();

    FavoritesSnapshot::new(records)
}
