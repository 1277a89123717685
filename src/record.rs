use std::collections::BTreeMap;

use serde::Serialize;

/// Placeholder for any field that could not be read from the page.
pub const NOT_AVAILABLE: &str = "N/A";

/// Output column order. Nutrients expand to `<prefix>_weight`/`<prefix>_percent`.
pub const COLUMNS: [&str; 30] = [
    "recipe_id",
    "category_name",
    "recipe_url",
    "recipe_name",
    "recipe_description",
    "recipe_image",
    "directions",
    "ingredients",
    "preparation_time",
    "cooking_time",
    "chill_time",
    "total_time",
    "serving_size",
    "calories_total",
    "total_fat_weight",
    "total_fat_percent",
    "saturated_fat_weight",
    "saturated_fat_percent",
    "cholesterol_weight",
    "cholesterol_percent",
    "sodium_weight",
    "sodium_percent",
    "total_carbohydrate_weight",
    "total_carbohydrate_percent",
    "dietary_fiber_weight",
    "dietary_fiber_percent",
    "sugar_weight",
    "sugar_percent",
    "protein_weight",
    "protein_percent",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    TotalFat,
    SaturatedFat,
    Cholesterol,
    Sodium,
    TotalCarbohydrate,
    DietaryFiber,
    Sugar,
    Protein,
}

impl Nutrient {
    pub const ALL: [Nutrient; 8] = [
        Nutrient::TotalFat,
        Nutrient::SaturatedFat,
        Nutrient::Cholesterol,
        Nutrient::Sodium,
        Nutrient::TotalCarbohydrate,
        Nutrient::DietaryFiber,
        Nutrient::Sugar,
        Nutrient::Protein,
    ];

    /// Text shown in the nutrition facts table for this row.
    pub fn label(self) -> &'static str {
        match self {
            Nutrient::TotalFat => "Total Fat",
            Nutrient::SaturatedFat => "Saturated Fat",
            Nutrient::Cholesterol => "Cholesterol",
            Nutrient::Sodium => "Sodium",
            Nutrient::TotalCarbohydrate => "Total Carbohydrate",
            Nutrient::DietaryFiber => "Dietary Fiber",
            Nutrient::Sugar => "Total Sugars",
            Nutrient::Protein => "Protein",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutrientPair {
    pub weight: String,
    pub percent: String,
}

impl Default for NutrientPair {
    fn default() -> Self {
        NutrientPair {
            weight: NOT_AVAILABLE.to_string(),
            percent: NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Nutrition {
    pub total_fat: NutrientPair,
    pub saturated_fat: NutrientPair,
    pub cholesterol: NutrientPair,
    pub sodium: NutrientPair,
    pub total_carbohydrate: NutrientPair,
    pub dietary_fiber: NutrientPair,
    pub sugar: NutrientPair,
    pub protein: NutrientPair,
}

impl Nutrition {
    pub fn get(&self, nutrient: Nutrient) -> &NutrientPair {
        match nutrient {
            Nutrient::TotalFat => &self.total_fat,
            Nutrient::SaturatedFat => &self.saturated_fat,
            Nutrient::Cholesterol => &self.cholesterol,
            Nutrient::Sodium => &self.sodium,
            Nutrient::TotalCarbohydrate => &self.total_carbohydrate,
            Nutrient::DietaryFiber => &self.dietary_fiber,
            Nutrient::Sugar => &self.sugar,
            Nutrient::Protein => &self.protein,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, pair: NutrientPair) {
        let slot = match nutrient {
            Nutrient::TotalFat => &mut self.total_fat,
            Nutrient::SaturatedFat => &mut self.saturated_fat,
            Nutrient::Cholesterol => &mut self.cholesterol,
            Nutrient::Sodium => &mut self.sodium,
            Nutrient::TotalCarbohydrate => &mut self.total_carbohydrate,
            Nutrient::DietaryFiber => &mut self.dietary_fiber,
            Nutrient::Sugar => &mut self.sugar,
            Nutrient::Protein => &mut self.protein,
        };
        *slot = pair;
    }
}

/// One fully extracted recipe page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeRecord {
    pub recipe_id: u64,
    pub category_name: String,
    pub recipe_url: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub directions: Vec<String>,
    pub ingredients: BTreeMap<usize, String>,
    pub prep_time: String,
    pub cook_time: String,
    pub chill_time: String,
    pub total_time: String,
    pub servings: String,
    pub calories_total: String,
    pub nutrition: Nutrition,
}

impl RecipeRecord {
    /// Cells in `COLUMNS` order. List fields are JSON encoded.
    pub fn to_row(&self) -> serde_json::Result<Vec<String>> {
        let mut row = vec![
            self.recipe_id.to_string(),
            self.category_name.clone(),
            self.recipe_url.clone(),
            self.name.clone(),
            self.description.clone(),
            self.image_url.clone(),
            serde_json::to_string(&self.directions)?,
            serde_json::to_string(&self.ingredients)?,
            self.prep_time.clone(),
            self.cook_time.clone(),
            self.chill_time.clone(),
            self.total_time.clone(),
            self.servings.clone(),
            self.calories_total.clone(),
        ];
        for nutrient in Nutrient::ALL {
            let pair = self.nutrition.get(nutrient);
            row.push(pair.weight.clone());
            row.push(pair.percent.clone());
        }
        Ok(row)
    }
}

/// True when a mandatory text value was actually found on the page.
pub fn is_present(value: &str) -> bool {
    !value.is_empty() && value != NOT_AVAILABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecipeRecord {
        let mut nutrition = Nutrition::default();
        nutrition.set(
            Nutrient::Sodium,
            NutrientPair {
                weight: "320mg".into(),
                percent: "14%".into(),
            },
        );
        RecipeRecord {
            recipe_id: 7,
            category_name: "Desserts".into(),
            recipe_url: "https://example.test/cake".into(),
            name: "Cake".into(),
            description: "A cake.".into(),
            image_url: "https://img.test/cake.jpg".into(),
            directions: vec!["Mix.".into(), "Bake, then \"cool\".".into()],
            ingredients: BTreeMap::from([(1, "2 eggs".into()), (2, "1 cup flour".into())]),
            prep_time: "10 mins".into(),
            cook_time: "30 mins".into(),
            chill_time: NOT_AVAILABLE.into(),
            total_time: "40 mins".into(),
            servings: "8".into(),
            calories_total: "250".into(),
            nutrition,
        }
    }

    #[test]
    fn row_matches_column_count() {
        let row = sample().to_row().unwrap();
        assert_eq!(row.len(), COLUMNS.len());
    }

    #[test]
    fn list_fields_are_json() {
        let row = sample().to_row().unwrap();
        assert_eq!(row[6], r#"["Mix.","Bake, then \"cool\"."]"#);
        assert_eq!(row[7], r#"{"1":"2 eggs","2":"1 cup flour"}"#);
    }

    #[test]
    fn nutrients_land_in_their_columns() {
        let row = sample().to_row().unwrap();
        let idx = COLUMNS.iter().position(|c| *c == "sodium_weight").unwrap();
        assert_eq!(row[idx], "320mg");
        assert_eq!(row[idx + 1], "14%");
        let fat = COLUMNS.iter().position(|c| *c == "total_fat_weight").unwrap();
        assert_eq!(row[fat], NOT_AVAILABLE);
    }

    #[test]
    fn presence() {
        assert!(is_present("Cake"));
        assert!(!is_present(""));
        assert!(!is_present(NOT_AVAILABLE));
    }
}
