use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(rename = "idCategory")]
    pub id: String,
    #[serde(rename = "strCategory")]
    pub name: String,
    #[serde(rename = "strCategoryThumb", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "strCategoryDescription", default)]
    pub description: Option<String>,
}

/// Entry of a per-category listing; the catalog only returns these three fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeSummary {
    #[serde(rename = "idMeal")]
    pub id: String,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strMealThumb", default)]
    pub thumbnail_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_catalog_payload() {
        let category: Category = serde_json::from_str(
            r#"{"idCategory":"1","strCategory":"Beef",
                "strCategoryThumb":"https://www.themealdb.com/images/category/beef.png",
                "strCategoryDescription":"Beef is the culinary name for meat from cattle."}"#,
        )
        .unwrap();

        assert_eq!(category.id, "1");
        assert_eq!(category.name, "Beef");
        assert!(category.description.unwrap().starts_with("Beef"));
    }

    #[test]
    fn test_summary_without_thumbnail() {
        let summary: RecipeSummary =
            serde_json::from_str(r#"{"idMeal":"52874","strMeal":"Beef and Mustard Pie"}"#).unwrap();
        assert_eq!(summary.id, "52874");
        assert!(summary.thumbnail_url.is_none());
    }
}
