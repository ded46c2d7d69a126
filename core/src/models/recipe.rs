use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of `strIngredientN` / `strMeasureN` column pairs in a catalog meal
const INGREDIENT_SLOTS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub measure: Option<String>,
}

/// A recipe as served by the catalog.
///
/// Only `id`, `name`, `thumbnail_url`, `category` and `area` survive into a
/// favorite; the rest is catalog-only detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "MealPayload")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub category: Option<String>,
    pub area: Option<String>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub youtube_url: Option<String>,
    pub source_url: Option<String>,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Create a recipe with just an identifier and a name
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            thumbnail_url: None,
            category: None,
            area: None,
            instructions: None,
            tags: Vec::new(),
            youtube_url: None,
            source_url: None,
            ingredients: Vec::new(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}

/// Flat meal object as returned by TheMealDB (`idMeal`, `strMeal`, ...).
///
/// Ingredient columns are collected through the flattened map since there
/// are twenty numbered pairs of them.
#[derive(Debug, Deserialize)]
struct MealPayload {
    #[serde(rename = "idMeal", alias = "id")]
    id: String,
    #[serde(rename = "strMeal", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "strMealThumb", alias = "thumbnail_url", default)]
    thumbnail_url: Option<String>,
    #[serde(rename = "strCategory", alias = "category", default)]
    category: Option<String>,
    #[serde(rename = "strArea", alias = "area", default)]
    area: Option<String>,
    #[serde(rename = "strInstructions", alias = "instructions", default)]
    instructions: Option<String>,
    #[serde(rename = "strTags", default)]
    tags: Option<String>,
    #[serde(rename = "strYoutube", alias = "youtube_url", default)]
    youtube_url: Option<String>,
    #[serde(rename = "strSource", alias = "source_url", default)]
    source_url: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<MealPayload> for Recipe {
    fn from(payload: MealPayload) -> Self {
        let ingredients = collect_ingredients(&payload.rest);
        let tags = match (&payload.tags, payload.rest.get("tags")) {
            (Some(tags), _) => tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            (None, Some(Value::Array(items))) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            id: payload.id,
            name: payload.name.unwrap_or_default(),
            thumbnail_url: non_blank(payload.thumbnail_url),
            category: non_blank(payload.category),
            area: non_blank(payload.area),
            instructions: non_blank(payload.instructions),
            tags,
            youtube_url: non_blank(payload.youtube_url),
            source_url: non_blank(payload.source_url),
            ingredients,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn text_field<'a>(rest: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    rest.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn collect_ingredients(rest: &Map<String, Value>) -> Vec<Ingredient> {
    // Round-tripped recipes carry the already collected list
    if let Some(Value::Array(items)) = rest.get("ingredients") {
        return items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect();
    }

    (1..=INGREDIENT_SLOTS)
        .filter_map(|slot| {
            let name = text_field(rest, &format!("strIngredient{}", slot))?;
            let measure = text_field(rest, &format!("strMeasure{}", slot));
            Some(Ingredient {
                name: name.to_string(),
                measure: measure.map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERIYAKI: &str = r#"{
        "idMeal": "52772",
        "strMeal": "Teriyaki Chicken Casserole",
        "strDrinkAlternate": null,
        "strCategory": "Chicken",
        "strArea": "Japanese",
        "strInstructions": "Preheat oven to 350 F.",
        "strMealThumb": "https://www.themealdb.com/images/media/meals/wvpsxx1468256321.jpg",
        "strTags": "Meat,Casserole",
        "strYoutube": "https://www.youtube.com/watch?v=4aZr5hZXP_s",
        "strIngredient1": "soy sauce",
        "strIngredient2": "water",
        "strIngredient3": "",
        "strIngredient4": null,
        "strMeasure1": "3/4 cup",
        "strMeasure2": "1/2 cup",
        "strMeasure3": "",
        "strMeasure4": null,
        "strSource": "",
        "dateModified": null
    }"#;

    #[test]
    fn test_recipe_from_catalog_payload() {
        let recipe: Recipe = serde_json::from_str(TERIYAKI).unwrap();

        assert_eq!(recipe.id, "52772");
        assert_eq!(recipe.name, "Teriyaki Chicken Casserole");
        assert_eq!(recipe.category.as_deref(), Some("Chicken"));
        assert_eq!(recipe.area.as_deref(), Some("Japanese"));
        assert_eq!(recipe.tags, vec!["Meat", "Casserole"]);
        assert_eq!(recipe.source_url, None);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "soy sauce");
        assert_eq!(recipe.ingredients[1].measure.as_deref(), Some("1/2 cup"));
    }

    #[test]
    fn test_recipe_with_id() {
        let recipe = Recipe::with_id("52772", "Teriyaki Chicken").category("Chicken");
        assert_eq!(recipe.id, "52772");
        assert_eq!(recipe.category.as_deref(), Some("Chicken"));
        assert!(recipe.area.is_none());
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn test_recipe_serde_round_trip_keeps_ingredients() {
        let recipe: Recipe = serde_json::from_str(TERIYAKI).unwrap();
        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recipe);
    }
}
