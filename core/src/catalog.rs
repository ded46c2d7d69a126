//! Client for the public recipe catalog (TheMealDB JSON API).

use crate::config::CatalogConfig;
use crate::models::{Category, Recipe, RecipeSummary};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub use crate::config::DEFAULT_CATALOG_URL as DEFAULT_BASE_URL;

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    categories: Option<Vec<Category>>,
}

/// The catalog answers "no match" with `"meals": null`
#[derive(Debug, Deserialize)]
struct MealsEnvelope<T> {
    meals: Option<Vec<T>>,
}

impl<T> MealsEnvelope<T> {
    fn into_vec(self) -> Vec<T> {
        self.meals.unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(endpoint);
        tracing::debug!(%url, ?query, "catalog request");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let envelope: CategoriesEnvelope = self.fetch("categories.php", &[]).await?;
        Ok(envelope.categories.unwrap_or_default())
    }

    pub async fn list_by_category(&self, category: &str) -> Result<Vec<RecipeSummary>> {
        let envelope: MealsEnvelope<RecipeSummary> = self.fetch("filter.php", &[("c", category)]).await?;
        Ok(envelope.into_vec())
    }

    /// Full recipe for `id`, `None` when the catalog does not know it
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        let envelope: MealsEnvelope<Recipe> = self.fetch("lookup.php", &[("i", id)]).await?;
        Ok(envelope.into_vec().into_iter().next())
    }

    pub async fn search_by_name(&self, query: &str) -> Result<Vec<Recipe>> {
        let envelope: MealsEnvelope<Recipe> = self.fetch("search.php", &[("s", query)]).await?;
        Ok(envelope.into_vec())
    }

    pub async fn get_random(&self) -> Result<Recipe> {
        let envelope: MealsEnvelope<Recipe> = self.fetch("random.php", &[]).await?;
        envelope
            .into_vec()
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("catalog returned no random recipe".to_string()))
    }
}
