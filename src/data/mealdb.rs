//! TheMealDB API client
//!
//! Fetches the dessert list and per-dessert recipe details, runs the detail
//! object through the ingredient decoder and validates the result before it is
//! handed to callers as a [`Dessert`].

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::ingredients::{count_families, decode_ingredients, fields_from_json, FieldMap};
use super::{Dessert, RecipeDetails};

/// Base URL for TheMealDB v1 API with the public test key
pub const MEALDB_BASE_URL: &str = "https://themealdb.com/api/json/v1/1";

/// Default timeout for recipe requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Category queried for the dessert list
const DESSERT_CATEGORY: &str = "Dessert";

/// Errors that can occur when fetching recipes
#[derive(Debug, Error)]
pub enum RecipeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Response was well-formed but the recipe data is unusable
    #[error("Recipe not available: {0}")]
    BadRecipe(BadRecipeReason),
}

/// Why a recipe response failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BadRecipeReason {
    #[error("no recipe details in response")]
    MissingDetails,

    #[error("recipe has no id or name")]
    MissingName,

    #[error("{ingredients} ingredient fields but {measurements} measurement fields")]
    MismatchedCounts {
        ingredients: usize,
        measurements: usize,
    },

    #[error("no usable ingredients")]
    NoIngredients,
}

impl RecipeError {
    /// Whether the failure is about the recipe data rather than the transport
    pub fn is_bad_recipe(&self) -> bool {
        matches!(self, RecipeError::BadRecipe(_))
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        if self.is_bad_recipe() {
            "Recipe not available. Please check back soon."
        } else {
            "Unable to load recipe. Please check your network and try again."
        }
    }
}

/// Standard `{"meals": [...]}` envelope; `meals` is `null` when nothing matched
#[derive(Debug, Deserialize)]
struct MealsResponse<T> {
    meals: Option<Vec<T>>,
}

/// A single entry of the filtered dessert list
#[derive(Debug, Deserialize)]
struct MealSummary {
    #[serde(rename = "idMeal", default)]
    id: Option<String>,
    #[serde(rename = "strMeal", default)]
    name: Option<String>,
    #[serde(rename = "strMealThumb", default)]
    thumbnail: Option<String>,
}

/// Client for fetching desserts from TheMealDB
#[derive(Debug, Clone)]
pub struct MealDbClient {
    http_client: Client,
    base_url: String,
}

impl Default for MealDbClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MealDbClient {
    /// Creates a new client against the public API with default settings
    pub fn new() -> Self {
        Self::with_base_url(MEALDB_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a new client with a custom base URL and request timeout
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches the dessert list
    ///
    /// Entries without an id or name are dropped. Names are title-cased and
    /// the list is sorted by name.
    pub async fn fetch_desserts(&self) -> Result<Vec<Dessert>, RecipeError> {
        let url = format!("{}/filter.php", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("c", DESSERT_CATEGORY)])
            .send()
            .await?;

        let body: MealsResponse<MealSummary> = parse_json(response).await?;

        let mut desserts: Vec<Dessert> = body
            .meals
            .unwrap_or_default()
            .into_iter()
            .map(|meal| {
                Dessert::new(
                    meal.id.unwrap_or_default(),
                    title_case(meal.name.unwrap_or_default().trim()),
                    meal.thumbnail.unwrap_or_default(),
                )
            })
            .filter(Dessert::is_valid)
            .collect();

        desserts.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(count = desserts.len(), "fetched dessert list");
        Ok(desserts)
    }

    /// Fetches recipe details for `dessert` and returns an enriched copy
    pub async fn fetch_details(&self, dessert: &Dessert) -> Result<Dessert, RecipeError> {
        let fields = self.lookup(&dessert.id).await?;
        let details = parse_details(&fields).map_err(RecipeError::BadRecipe)?;
        Ok(dessert.clone().with_details(details))
    }

    /// Fetches a dessert by id, building the whole record from the detail response
    pub async fn fetch_dessert(&self, id: &str) -> Result<Dessert, RecipeError> {
        let fields = self.lookup(id).await?;

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.as_deref())
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let base = Dessert::new(text("idMeal"), title_case(&text("strMeal")), text("strMealThumb"));
        if !base.is_valid() {
            return Err(RecipeError::BadRecipe(BadRecipeReason::MissingName));
        }

        let details = parse_details(&fields).map_err(RecipeError::BadRecipe)?;
        Ok(base.with_details(details))
    }

    /// Requests the detail object for a dessert id
    async fn lookup(&self, id: &str) -> Result<FieldMap, RecipeError> {
        let url = format!("{}/lookup.php", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("i", id)])
            .send()
            .await?;

        let body: MealsResponse<Map<String, Value>> = parse_json(response).await?;

        body.meals
            .and_then(|meals| meals.into_iter().next())
            .map(fields_from_json)
            .ok_or(RecipeError::BadRecipe(BadRecipeReason::MissingDetails))
    }
}

/// Checks the status and decodes the body as JSON
async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, RecipeError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RecipeError::Status(status.as_u16()));
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Validates a detail field map and extracts the recipe details
fn parse_details(fields: &FieldMap) -> Result<RecipeDetails, BadRecipeReason> {
    let (ingredients, measurements) = count_families(fields);
    if ingredients != measurements {
        return Err(BadRecipeReason::MismatchedCounts {
            ingredients,
            measurements,
        });
    }

    let decoded = decode_ingredients(fields);
    if decoded.is_empty() {
        return Err(BadRecipeReason::NoIngredients);
    }

    let optional_text = |key: &str| {
        fields
            .get(key)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(RecipeDetails {
        origin: optional_text("strArea"),
        instructions: optional_text("strInstructions"),
        ingredients: decoded,
    })
}

/// Upper-cases the first letter of every word and lower-cases the rest
fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut at_word_start = true;

    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            result.push(c);
        } else if at_word_start {
            at_word_start = false;
            result.extend(c.to_uppercase());
        } else {
            result.extend(c.to_lowercase());
        }
    }

    result
}
