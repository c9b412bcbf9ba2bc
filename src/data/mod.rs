//! Core data models for Dessert Cookbook
//!
//! This module contains the domain records shared by the recipe pipeline,
//! the bookmark store and the CLI, plus the TheMealDB client and the
//! ingredient decoder that feeds it.

pub mod ingredients;
pub mod mealdb;

pub use ingredients::{
    count_families, decode_ingredients, decode_ingredients_with, fields_from_json, FieldMap,
    KeyOrder,
};
pub use mealdb::{BadRecipeReason, MealDbClient, RecipeError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dessert recipe
///
/// Basic records come from the dessert list and only carry the id, name and
/// image URL. The remaining fields are filled in once by [`Dessert::with_details`]
/// after a detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dessert {
    /// Identifier assigned by TheMealDB
    pub id: String,
    /// Display name
    pub name: String,
    /// Cuisine the dessert comes from, if known
    #[serde(default)]
    pub origin: Option<String>,
    /// Freeform preparation instructions, if known
    #[serde(default)]
    pub instructions: Option<String>,
    /// Ordered ingredient list
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    /// Source URL of the dessert's thumbnail
    pub image_url: String,
}

/// Detail fields fetched separately from the dessert list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDetails {
    pub origin: Option<String>,
    pub instructions: Option<String>,
    pub ingredients: Vec<Ingredient>,
}

impl Dessert {
    /// Creates a basic dessert record without details
    pub fn new(id: impl Into<String>, name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origin: None,
            instructions: None,
            ingredients: Vec::new(),
            image_url: image_url.into(),
        }
    }

    /// Returns a copy of this dessert enriched with the given details
    pub fn with_details(mut self, details: RecipeDetails) -> Self {
        self.origin = details.origin;
        self.instructions = details.instructions;
        self.ingredients = details.ingredients;
        self
    }

    /// A record is only usable when both its id and name are present
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }
}

/// A single ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ingredient {
    /// Generated per decode; not stable across fetches
    pub id: Uuid,
    pub name: String,
    pub measurement: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            measurement: measurement.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dessert_creation() {
        let dessert = Dessert::new("53049", "Apam Balik", "https://example.com/apam.jpg");

        assert_eq!(dessert.id, "53049");
        assert_eq!(dessert.name, "Apam Balik");
        assert!(dessert.origin.is_none());
        assert!(dessert.instructions.is_none());
        assert!(dessert.ingredients.is_empty());
        assert!(dessert.is_valid());
    }

    #[test]
    fn test_dessert_with_empty_fields_is_invalid() {
        assert!(!Dessert::new("", "Apam Balik", "").is_valid());
        assert!(!Dessert::new("53049", "", "").is_valid());
    }

    #[test]
    fn test_with_details_fills_in_detail_fields() {
        let dessert = Dessert::new("52893", "Apple & Blackberry Crumble", "");
        let details = RecipeDetails {
            origin: Some("British".to_string()),
            instructions: Some("Heat oven to 190C.".to_string()),
            ingredients: vec![Ingredient::new("Plain Flour", "120g")],
        };

        let enriched = dessert.clone().with_details(details);

        assert_eq!(enriched.id, dessert.id);
        assert_eq!(enriched.name, dessert.name);
        assert_eq!(enriched.origin.as_deref(), Some("British"));
        assert_eq!(enriched.instructions.as_deref(), Some("Heat oven to 190C."));
        assert_eq!(enriched.ingredients.len(), 1);
        assert_eq!(enriched.ingredients[0].name, "Plain Flour");
    }

    #[test]
    fn test_ingredients_get_distinct_ids() {
        let a = Ingredient::new("Sugar", "1 cup");
        let b = Ingredient::new("Sugar", "1 cup");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_dessert_deserializes_without_optional_fields() {
        let json = r#"{"id":"53049","name":"Apam Balik","imageUrl":"https://example.com/a.jpg"}"#;

        let dessert: Dessert = serde_json::from_str(json).expect("Failed to deserialize Dessert");

        assert_eq!(dessert.id, "53049");
        assert_eq!(dessert.image_url, "https://example.com/a.jpg");
        assert!(dessert.origin.is_none());
        assert!(dessert.ingredients.is_empty());
    }

    #[test]
    fn test_dessert_serialization_roundtrip() {
        let dessert = Dessert::new("53049", "Apam Balik", "https://example.com/a.jpg").with_details(
            RecipeDetails {
                origin: Some("Malaysian".to_string()),
                instructions: None,
                ingredients: vec![Ingredient::new("Milk", "200ml"), Ingredient::new("Eggs", "2")],
            },
        );

        let json = serde_json::to_string(&dessert).expect("Failed to serialize Dessert");
        let deserialized: Dessert = serde_json::from_str(&json).expect("Failed to deserialize Dessert");

        assert_eq!(deserialized, dessert);
    }
}
