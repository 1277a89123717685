use std::fmt;
use std::time::Duration;

use crate::extract::selectors;
use crate::page::PageAccessor;

/// First reason a page failed the recipe check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defect {
    NoHeading,
    HeadingHidden,
    NoDescription,
    DescriptionHidden,
    NoImages,
    NoDirections,
    NoIngredients,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Defect::NoHeading => "no recipe heading",
            Defect::HeadingHidden => "recipe heading not visible",
            Defect::NoDescription => "no description",
            Defect::DescriptionHidden => "description not visible",
            Defect::NoImages => "no images",
            Defect::NoDirections => "no direction steps",
            Defect::NoIngredients => "no ingredients",
        };
        f.write_str(msg)
    }
}

/// Cheap structural check run before any extraction.
///
/// Checks heading, description, images, directions and ingredients in that
/// order and stops at the first failure. Lookup errors count as failures;
/// this never returns an error.
pub async fn check_recipe<P: PageAccessor>(page: &P, timeout: Duration) -> Result<(), Defect> {
    require_visible(page, selectors::RECIPE_TITLE, timeout, Defect::NoHeading, Defect::HeadingHidden)
        .await?;
    require_visible(
        page,
        selectors::DESCRIPTION,
        timeout,
        Defect::NoDescription,
        Defect::DescriptionHidden,
    )
    .await?;
    require_any(page, selectors::IMAGES, Defect::NoImages).await?;
    require_any(page, selectors::DIRECTION_STEPS, Defect::NoDirections).await?;
    require_any(page, selectors::INGREDIENT_ITEMS, Defect::NoIngredients).await?;
    Ok(())
}

/// Boolean form of [`check_recipe`]; the pipeline uses the defect directly.
#[cfg(test)]
pub async fn is_valid_recipe<P: PageAccessor>(page: &P, timeout: Duration) -> bool {
    check_recipe(page, timeout).await.is_ok()
}

async fn require_visible<P: PageAccessor>(
    page: &P,
    selector: &str,
    timeout: Duration,
    missing: Defect,
    hidden: Defect,
) -> Result<(), Defect> {
    let element = page.query_one(selector, timeout).await.map_err(|_| missing)?;
    match page.is_visible(&element).await {
        Ok(true) => Ok(()),
        _ => Err(hidden),
    }
}

async fn require_any<P: PageAccessor>(page: &P, selector: &str, defect: Defect) -> Result<(), Defect> {
    match page.query_all(selector).await {
        Ok(found) if !found.is_empty() => Ok(()),
        _ => Err(defect),
    }
}
