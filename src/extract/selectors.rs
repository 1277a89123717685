//! CSS selectors for the recipe page template.

pub const RECIPE_TITLE: &str = "h1.article-heading.text-headline-400";
pub const DESCRIPTION: &str = "p.article-subheading.text-body-100";
pub const IMAGES: &str = "div.img-placeholder img.universal-image__image";
pub const DIRECTION_STEPS: &str = "ol.mntl-sc-block-group--OL li p:first-of-type";
pub const INGREDIENT_ITEMS: &str = "ul.mm-recipes-structured-ingredients__list li";

/// Label cells of the details card ("Prep Time:", "Servings:", ...).
/// The value is the next `div` sibling.
pub const DETAILS_LABEL: &str = "div.mm-recipes-details__label";
pub const DETAILS_VALUE_TAG: &str = "div";

pub const CALORIES: &str = "td[class*='mm-recipes-nutrition-facts-summary__table-cell']";

pub const NUTRITION_TOGGLE: &str = ".mm-recipes-nutrition-facts-label__button";
/// Cells of the full nutrition label revealed by the toggle.
pub const NUTRITION_LABEL_CELLS: &str = ".mm-recipes-nutrition-facts-label__table td";
/// Any table cell; nutrient rows are found by the label text of a child span.
pub const NUTRIENT_CELLS: &str = "td";
pub const NUTRIENT_LABEL: &str = "span";
pub const NUTRIENT_PERCENT_TAG: &str = "td";

/// Image source attributes, preferred first. Lazy-loaded images carry the
/// real URL in `data-src`.
pub const IMAGE_SOURCE_ATTRS: [&str; 2] = ["data-src", "src"];

pub const PREP_TIME: &str = "Prep Time:";
pub const COOK_TIME: &str = "Cook Time:";
pub const CHILL_TIME: &str = "Chill Time:";
pub const TOTAL_TIME: &str = "Total Time:";
pub const SERVINGS: &str = "Servings:";
