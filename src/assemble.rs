use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::Timeouts;
use crate::error::ScrapeError;
use crate::extract::{self, selectors};
use crate::page::{PageAccessor, PageProvider};
use crate::record::{is_present, RecipeRecord, NOT_AVAILABLE};
use crate::tasks::Task;
use crate::validate::{check_recipe, Defect};

const CLICK_JS: &str = "function() { this.click(); }";
const SETTLE_POLL: Duration = Duration::from_millis(250);

/// How a single task ended. Exactly one per task.
#[derive(Debug)]
pub enum Outcome {
    Assembled(Box<RecipeRecord>),
    Rejected(Rejection),
    Errored(ScrapeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Failed the structural recipe check.
    NotARecipe(Defect),
    /// Passed the check but a mandatory field came back empty.
    MissingEssentials(Vec<&'static str>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotARecipe(defect) => write!(f, "not a valid recipe ({})", defect),
            Rejection::MissingEssentials(fields) => {
                write!(f, "missing essential data: {}", fields.join(", "))
            }
        }
    }
}

/// Open a session for `task`, turn the page into a record, release the session.
#[instrument(skip_all, fields(id = task.sequence_id, url = %task.url))]
pub async fn assemble<P: PageProvider>(provider: &P, task: &Task, timeouts: &Timeouts) -> Outcome {
    let page = match provider.open(&task.url, timeouts.navigation).await {
        Ok(page) => page,
        Err(e) => return Outcome::Errored(e),
    };

    let result = extract_record(&page, task, timeouts).await;

    if let Err(e) = page.close().await {
        warn!("Failed to release browser session: {}", e);
    }

    match result {
        Ok(record) => Outcome::Assembled(Box::new(record)),
        Err(rejection) => Outcome::Rejected(rejection),
    }
}

/// Validate, extract, reveal nutrition, build. The page stays open.
pub async fn extract_record<P: PageAccessor>(
    page: &P,
    task: &Task,
    timeouts: &Timeouts,
) -> Result<RecipeRecord, Rejection> {
    debug!("validating");
    check_recipe(page, timeouts.element)
        .await
        .map_err(Rejection::NotARecipe)?;

    debug!("extracting");
    let name = extract::text_field(page, selectors::RECIPE_TITLE, NOT_AVAILABLE, timeouts.element).await;
    let description =
        extract::text_field(page, selectors::DESCRIPTION, NOT_AVAILABLE, timeouts.element).await;
    let image_url = extract::image_url(page).await;
    let directions = extract::directions(page).await;
    let ingredients = extract::ingredients(page).await;

    // Elements can exist and still be empty.
    let mut missing = Vec::new();
    if !is_present(&name) {
        missing.push("name");
    }
    if !is_present(&description) {
        missing.push("description");
    }
    if !is_present(&image_url) {
        missing.push("image");
    }
    if directions.is_empty() {
        missing.push("directions");
    }
    if ingredients.is_empty() {
        missing.push("ingredients");
    }
    if !missing.is_empty() {
        return Err(Rejection::MissingEssentials(missing));
    }

    let prep_time = extract::labelled_field(page, selectors::PREP_TIME, timeouts.element).await;
    let cook_time = extract::labelled_field(page, selectors::COOK_TIME, timeouts.element).await;
    let chill_time = extract::labelled_field(page, selectors::CHILL_TIME, timeouts.element).await;
    let total_time = extract::labelled_field(page, selectors::TOTAL_TIME, timeouts.element).await;
    let servings = extract::labelled_field(page, selectors::SERVINGS, timeouts.element).await;
    let calories_total =
        extract::text_field(page, selectors::CALORIES, NOT_AVAILABLE, timeouts.element).await;

    debug!("revealing nutrition label");
    reveal_nutrition(page, timeouts.reveal_settle).await;
    let nutrition = extract::nutrition(page).await;

    Ok(RecipeRecord {
        recipe_id: task.sequence_id,
        category_name: task.category_name.clone(),
        recipe_url: task.url.clone(),
        name,
        description,
        image_url,
        directions,
        ingredients,
        prep_time,
        cook_time,
        chill_time,
        total_time,
        servings,
        calories_total,
        nutrition,
    })
}

/// Click the "show full nutrition label" toggle and wait for the label to
/// render. Best effort: every failure is ignored.
pub async fn reveal_nutrition<P: PageAccessor>(page: &P, settle: Duration) {
    let toggle = match page.query_all(selectors::NUTRITION_TOGGLE).await {
        Ok(found) => match found.into_iter().next() {
            Some(el) => el,
            None => {
                debug!("no nutrition toggle");
                return;
            }
        },
        Err(e) => {
            debug!("nutrition toggle lookup: {}", e);
            return;
        }
    };
    if let Err(e) = page.run_script(CLICK_JS, &toggle).await {
        debug!("nutrition toggle click: {}", e);
        return;
    }
    wait_for_label(page, settle).await;
}

/// Poll the label's cell count until it is non-zero and unchanged between
/// two samples, or `limit` elapses.
async fn wait_for_label<P: PageAccessor>(page: &P, limit: Duration) {
    let deadline = Instant::now() + limit;
    let mut last = None;
    loop {
        let count = page
            .query_all(selectors::NUTRITION_LABEL_CELLS)
            .await
            .map(|cells| cells.len())
            .unwrap_or(0);
        if count > 0 && last == Some(count) {
            return;
        }
        last = Some(count);

        let now = Instant::now();
        if now >= deadline {
            debug!("nutrition label not settled after {:?}", limit);
            return;
        }
        tokio::time::sleep(SETTLE_POLL.min(deadline - now)).await;
    }
}
