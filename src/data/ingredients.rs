//! Numbered-key ingredient decoding
//!
//! TheMealDB encodes a recipe's ingredient list as flat fields on the meal
//! object (`strIngredient1`, `strMeasure1`, `strIngredient2`, ...). This module
//! rebuilds the ordered list from those fields. Decoding never fails: missing
//! or blank entries are skipped.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use super::Ingredient;

/// Key prefix of the ingredient name family
pub const INGREDIENT_PREFIX: &str = "strIngredient";

/// Key prefix of the measurement family
pub const MEASUREMENT_PREFIX: &str = "strMeasure";

/// Flat field map of a meal object, keyed by field name
pub type FieldMap = HashMap<String, Option<String>>;

/// How the keys within each family are ordered before pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOrder {
    /// Integer suffixes compare numerically, so `strIngredient10` follows
    /// `strIngredient9`. Non-numeric suffixes sort after numeric ones.
    #[default]
    Numeric,
    /// Plain string comparison of the full key
    Lexicographic,
}

/// Converts a JSON object into a [`FieldMap`]
///
/// Strings are kept as-is, `null` becomes `None` and any other value is kept
/// in its JSON text form.
pub fn fields_from_json(object: Map<String, Value>) -> FieldMap {
    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            };
            (key, value)
        })
        .collect()
}

/// Decodes the ingredient list using [`KeyOrder::Numeric`]
pub fn decode_ingredients(fields: &FieldMap) -> Vec<Ingredient> {
    decode_ingredients_with(fields, KeyOrder::Numeric)
}

/// Decodes the ingredient list from numbered name and measurement fields
///
/// Keys of both families are sorted independently and paired by position.
/// When one family has more keys than the other the surplus is ignored. A
/// pair is dropped if either value is missing or blank after trimming.
pub fn decode_ingredients_with(fields: &FieldMap, order: KeyOrder) -> Vec<Ingredient> {
    let names = sorted_family(fields, INGREDIENT_PREFIX, order);
    let measurements = sorted_family(fields, MEASUREMENT_PREFIX, order);

    names
        .into_iter()
        .zip(measurements)
        .filter_map(|(name_key, measurement_key)| {
            let name = non_blank(fields, name_key)?;
            let measurement = non_blank(fields, measurement_key)?;
            Some(Ingredient::new(name, measurement))
        })
        .collect()
}

/// Returns the number of keys in the name and measurement families
pub fn count_families(fields: &FieldMap) -> (usize, usize) {
    let count = |prefix: &str| fields.keys().filter(|key| key.starts_with(prefix)).count();
    (count(INGREDIENT_PREFIX), count(MEASUREMENT_PREFIX))
}

fn sorted_family<'a>(fields: &'a FieldMap, prefix: &str, order: KeyOrder) -> Vec<&'a str> {
    let mut keys: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|key| key.starts_with(prefix))
        .collect();

    match order {
        KeyOrder::Lexicographic => keys.sort_unstable(),
        KeyOrder::Numeric => keys.sort_unstable_by(|a, b| compare_suffixes(a, b, prefix.len())),
    }

    keys
}

fn compare_suffixes(a: &str, b: &str, prefix_len: usize) -> Ordering {
    let suffix_a = a[prefix_len..].parse::<u64>();
    let suffix_b = b[prefix_len..].parse::<u64>();

    match (suffix_a, suffix_b) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn non_blank<'a>(fields: &'a FieldMap, key: &str) -> Option<&'a str> {
    let value = fields.get(key)?.as_deref()?.trim();
    (!value.is_empty()).then_some(value)
}
