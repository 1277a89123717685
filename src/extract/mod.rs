pub mod selectors;

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use crate::page::PageAccessor;
use crate::record::{Nutrient, NutrientPair, Nutrition, NOT_AVAILABLE};

// Every function here is total: lookup failures become the caller's default
// (or the "N/A" sentinel) and are only logged at debug level.

/// Trimmed text of the first element matching `selector`, or `default`.
pub async fn text_field<P: PageAccessor>(
    page: &P,
    selector: &str,
    default: &str,
    timeout: Duration,
) -> String {
    let element = match page.query_one(selector, timeout).await {
        Ok(el) => el,
        Err(e) => {
            debug!("{}", e);
            return default.to_string();
        }
    };
    match page.text_of(&element).await {
        Ok(text) => text,
        Err(e) => {
            debug!("text of `{}`: {}", selector, e);
            default.to_string()
        }
    }
}

/// Value next to the details label containing `label`, e.g. "Prep Time:".
pub async fn labelled_field<P: PageAccessor>(page: &P, label: &str, timeout: Duration) -> String {
    // Wait once for the details card to exist, then scan its labels.
    if page.query_one(selectors::DETAILS_LABEL, timeout).await.is_err() {
        return NOT_AVAILABLE.to_string();
    }
    let labels = page
        .query_all(selectors::DETAILS_LABEL)
        .await
        .unwrap_or_default();
    for el in &labels {
        let text = page.text_of(el).await.unwrap_or_default();
        if !text.contains(label) {
            continue;
        }
        if let Ok(Some(value)) = page
            .following_sibling(el, selectors::DETAILS_VALUE_TAG)
            .await
        {
            if let Ok(text) = page.text_of(&value).await {
                return text;
            }
        }
        break;
    }
    debug!("no details value for {:?}", label);
    NOT_AVAILABLE.to_string()
}

/// Source of the lead image. A first slot that points at a video thumbnail
/// is skipped in favour of the second image when there is one.
pub async fn image_url<P: PageAccessor>(page: &P) -> String {
    let images = page.query_all(selectors::IMAGES).await.unwrap_or_default();
    let Some(first) = images.first() else {
        return NOT_AVAILABLE.to_string();
    };
    let mut source = image_source(page, first).await;
    let is_video = source
        .as_deref()
        .is_some_and(|src| src.to_lowercase().contains("video"));
    if let (true, Some(second)) = (is_video, images.get(1)) {
        source = image_source(page, second).await;
    }
    source.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

async fn image_source<P: PageAccessor>(page: &P, image: &P::Element) -> Option<String> {
    for attr in selectors::IMAGE_SOURCE_ATTRS {
        if let Ok(Some(src)) = page.attribute_of(image, attr).await {
            let src = src.trim();
            if !src.is_empty() {
                return Some(src.to_string());
            }
        }
    }
    None
}

/// Direction steps in page order.
pub async fn directions<P: PageAccessor>(page: &P) -> Vec<String> {
    texts(page, selectors::DIRECTION_STEPS).await
}

/// Ingredient lines keyed by 1-based position in page order.
pub async fn ingredients<P: PageAccessor>(page: &P) -> BTreeMap<usize, String> {
    texts(page, selectors::INGREDIENT_ITEMS)
        .await
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect()
}

async fn texts<P: PageAccessor>(page: &P, selector: &str) -> Vec<String> {
    let elements = match page.query_all(selector).await {
        Ok(els) => els,
        Err(e) => {
            debug!("query `{}`: {}", selector, e);
            return Vec::new();
        }
    };
    let mut out = Vec::with_capacity(elements.len());
    for el in &elements {
        // Keep position even if one element fails to read.
        out.push(page.text_of(el).await.unwrap_or_default());
    }
    out
}

/// Weight and daily-value percent for one nutrient row.
///
/// The row's first cell holds a span with the label followed by the weight
/// ("Total Fat 12g"); the weight is that cell's last whitespace token and the
/// percent is the next cell's text.
pub async fn nutrient_pair<P: PageAccessor>(page: &P, label: &str) -> NutrientPair {
    match find_nutrient(page, label).await {
        Some(pair) => pair,
        None => {
            debug!("no nutrition row for {:?}", label);
            NutrientPair::default()
        }
    }
}

async fn find_nutrient<P: PageAccessor>(page: &P, label: &str) -> Option<NutrientPair> {
    let cells = page.query_all(selectors::NUTRIENT_CELLS).await.ok()?;
    for cell in &cells {
        if !has_label(page, cell, label).await {
            continue;
        }
        let text = page.text_of(cell).await.ok()?;
        let weight = text.split_whitespace().last()?.to_string();
        let percent_cell = page
            .following_sibling(cell, selectors::NUTRIENT_PERCENT_TAG)
            .await
            .ok()??;
        let percent = page.text_of(&percent_cell).await.ok()?;
        return Some(NutrientPair { weight, percent });
    }
    None
}

async fn has_label<P: PageAccessor>(page: &P, cell: &P::Element, label: &str) -> bool {
    let spans = page
        .query_within(cell, selectors::NUTRIENT_LABEL)
        .await
        .unwrap_or_default();
    for span in &spans {
        if let Ok(text) = page.text_of(span).await {
            if text.contains(label) {
                return true;
            }
        }
    }
    false
}

/// All eight nutrient pairs; each one fails independently.
pub async fn nutrition<P: PageAccessor>(page: &P) -> Nutrition {
    let mut out = Nutrition::default();
    for nutrient in Nutrient::ALL {
        out.set(nutrient, nutrient_pair(page, nutrient.label()).await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::snapshot::SnapshotPage;

    fn fixture(name: &str) -> SnapshotPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        SnapshotPage::new(html)
    }

    const T: Duration = Duration::ZERO;

    #[tokio::test]
    async fn text_field_defaults_when_missing() {
        let page = fixture("cake");
        assert_eq!(
            text_field(&page, "h2.not-there", "fallback", T).await,
            "fallback"
        );
        assert_eq!(
            text_field(&page, selectors::RECIPE_TITLE, NOT_AVAILABLE, T).await,
            "Chocolate Cake"
        );
    }

    #[tokio::test]
    async fn labelled_fields() {
        let page = fixture("cake");
        assert_eq!(labelled_field(&page, selectors::PREP_TIME, T).await, "20 mins");
        assert_eq!(labelled_field(&page, selectors::TOTAL_TIME, T).await, "1 hr 5 mins");
        assert_eq!(labelled_field(&page, selectors::SERVINGS, T).await, "12");
        assert_eq!(labelled_field(&page, selectors::CHILL_TIME, T).await, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn labelled_field_without_details_card() {
        let page = SnapshotPage::new("<html><body><p>nothing</p></body></html>");
        assert_eq!(labelled_field(&page, selectors::COOK_TIME, T).await, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn image_skips_video_thumbnail() {
        let page = fixture("cake");
        assert_eq!(image_url(&page).await, "https://img.example.test/cake-photo.jpg");
    }

    #[tokio::test]
    async fn video_only_image_is_kept() {
        let page = SnapshotPage::new(
            r#"<div class="img-placeholder"><img class="universal-image__image" data-src="https://x.test/VIDEO-thumb.jpg"></div>"#,
        );
        assert_eq!(image_url(&page).await, "https://x.test/VIDEO-thumb.jpg");
    }

    #[tokio::test]
    async fn image_falls_back_to_src() {
        let page = SnapshotPage::new(
            r#"<div class="img-placeholder"><img class="universal-image__image" src="https://x.test/a.jpg"></div>"#,
        );
        assert_eq!(image_url(&page).await, "https://x.test/a.jpg");
    }

    #[tokio::test]
    async fn no_images_is_sentinel() {
        let page = SnapshotPage::new("<p>no images</p>");
        assert_eq!(image_url(&page).await, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn ingredients_are_numbered_in_order() {
        let page = fixture("cake");
        let ing = ingredients(&page).await;
        let keys: Vec<usize> = ing.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
        assert_eq!(ing[&1], "2 cups all-purpose flour");
        assert_eq!(ing[&3], "¾ cup cocoa powder");
        assert_eq!(ing[&4], "1 cup milk");
    }

    #[tokio::test]
    async fn directions_take_first_paragraph_per_step() {
        let page = fixture("cake");
        let steps = directions(&page).await;
        assert_eq!(
            steps,
            vec![
                "Preheat the oven to 350 degrees F.",
                "Whisk the dry ingredients together.",
                "Bake for 45 minutes."
            ]
        );
    }

    #[tokio::test]
    async fn nutrient_pair_reads_weight_and_percent() {
        let page = fixture("cake_nutrition");
        assert_eq!(
            nutrient_pair(&page, "Total Fat").await,
            NutrientPair {
                weight: "14g".into(),
                percent: "18%".into()
            }
        );
        assert_eq!(nutrient_pair(&page, "Sodium").await.weight, "320mg");
    }

    #[tokio::test]
    async fn nutrient_pair_is_idempotent() {
        let page = fixture("cake_nutrition");
        let a = nutrient_pair(&page, "Saturated Fat").await;
        let b = nutrient_pair(&page, "Saturated Fat").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_nutrients_fail_individually() {
        let page = fixture("cake_nutrition");
        let n = nutrition(&page).await;
        assert_eq!(n.protein.weight, "4g");
        // The fixture has no fiber row and no percent cell for sugars.
        assert_eq!(n.dietary_fiber, NutrientPair::default());
        assert_eq!(n.sugar, NutrientPair::default());
    }

    #[tokio::test]
    async fn no_nutrition_table_is_all_sentinels() {
        let page = fixture("cake");
        assert_eq!(nutrition(&page).await, Nutrition::default());
    }
}
