//! Venue catalog loading.
//!
//! A full assortment carries every item inline. A partial one only lists
//! category slugs, and each category page has to be fetched separately;
//! pages that list item ids without inline items are hydrated through the
//! items-batch endpoint. [`CategoryLoader`] does that fan-out.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use basketeer_core::payload::as_id;
use basketeer_core::{Payload, Warnings};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthContext;
use crate::context::FetchContext;
use crate::error::FetchError;

/// Warning when no category page could be loaded.
pub const WARN_CATEGORIES_UNAVAILABLE: &str =
    "assortment category endpoints unavailable for full menu fallback";

/// Warning when only some category pages could be loaded.
pub const WARN_CATEGORIES_PARTIAL: &str =
    "full menu fallback is partially limited upstream; some category pages were unavailable.";

// ============================================================================
// Load Results
// ============================================================================

/// Outcome of one category fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLoadResult {
    /// Zero-based position of the category in the input.
    pub index: usize,
    /// Normalized category payload, absent when the fetch failed.
    pub payload: Option<Payload>,
}

/// How a load was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// One category at a time until the target item count is reached.
    SequentialUntil(usize),
    /// All categories through a bounded worker pool.
    BoundedParallel {
        /// Number of workers used.
        workers: usize,
    },
}

/// Ordered results of a category load.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLoad {
    /// Per-category results, in input order.
    pub results: Vec<CategoryLoadResult>,
    /// Strategy that produced the results.
    pub strategy: LoadStrategy,
}

impl CategoryLoad {
    fn empty(strategy: LoadStrategy) -> Self {
        Self {
            results: Vec::new(),
            strategy,
        }
    }

    /// Number of categories that were fetched.
    pub fn fetched(&self) -> usize {
        self.results.len()
    }

    /// Number of categories that produced a payload.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.payload.is_some()).count()
    }

    /// Successful payloads in input order.
    pub fn payloads(&self) -> impl Iterator<Item = &Payload> {
        self.results.iter().filter_map(|r| r.payload.as_ref())
    }

    /// Items of every successful category, first occurrence wins.
    pub fn items(&self) -> Vec<Payload> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for payload in self.payloads() {
            collect_new_items(payload.get_array("items"), &mut seen, &mut items);
        }
        items
    }
}

// ============================================================================
// Category Loader
// ============================================================================

/// Fetches the category pages of one venue.
pub struct CategoryLoader<'a> {
    ctx: &'a FetchContext,
    venue: &'a str,
    auth: &'a AuthContext,
    known: HashSet<String>,
}

impl<'a> CategoryLoader<'a> {
    /// Creates a loader. `auth` is shared read-only by every worker.
    pub fn new(ctx: &'a FetchContext, venue: &'a str, auth: &'a AuthContext) -> Self {
        Self {
            ctx,
            venue,
            auth,
            known: HashSet::new(),
        }
    }

    /// Item ids that are already known and count toward a sequential target.
    #[must_use]
    pub fn with_known_items(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.known.extend(ids);
        self
    }

    /// Loads `slugs`.
    ///
    /// With a positive `target` categories are fetched one by one until that
    /// many distinct items, known ones included, were seen. Without one, every category is fetched
    /// in parallel. Failed categories are reported through `warnings`; only
    /// cancellation is an error.
    #[instrument(skip(self, slugs, warnings), fields(venue = %self.venue, categories = slugs.len()))]
    pub async fn load(
        &self,
        slugs: &[String],
        target: Option<usize>,
        warnings: &mut Warnings,
    ) -> Result<CategoryLoad, FetchError> {
        match target.filter(|t| *t > 0) {
            Some(target) => self.load_sequential(slugs, target, warnings).await,
            None => self.load_parallel(slugs, warnings).await,
        }
    }

    async fn load_sequential(
        &self,
        slugs: &[String],
        target: usize,
        warnings: &mut Warnings,
    ) -> Result<CategoryLoad, FetchError> {
        let mut load = CategoryLoad::empty(LoadStrategy::SequentialUntil(target));
        if slugs.is_empty() {
            return Ok(load);
        }

        let mut distinct = self.known.clone();
        let mut reached = false;

        for (index, slug) in slugs.iter().enumerate() {
            let payload = match self.fetch_category(slug).await {
                Ok(payload) => Some(payload),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    debug!(category = %slug, error = %e, "Category unavailable");
                    None
                }
            };

            if let Some(payload) = &payload {
                distinct.extend(
                    payload
                        .get_array("items")
                        .iter()
                        .filter_map(|item| item.get("id").and_then(as_id)),
                );
            }
            load.results.push(CategoryLoadResult { index, payload });

            if distinct.len() >= target {
                reached = true;
                break;
            }
        }

        debug!(
            fetched = load.fetched(),
            distinct = distinct.len(),
            reached,
            "Sequential category load finished"
        );
        report(&load, !reached, warnings);
        Ok(load)
    }

    async fn load_parallel(
        &self,
        slugs: &[String],
        warnings: &mut Warnings,
    ) -> Result<CategoryLoad, FetchError> {
        let workers = self.ctx.settings.max_workers.max(1).min(slugs.len());
        let mut load = CategoryLoad::empty(LoadStrategy::BoundedParallel { workers });
        if slugs.is_empty() {
            return Ok(load);
        }

        let queue: Mutex<VecDeque<(usize, &String)>> =
            Mutex::new(slugs.iter().enumerate().collect());

        let finished = join_all((0..workers).map(|worker| self.worker(worker, &queue))).await;

        let mut slots: Vec<Option<Payload>> = vec![None; slugs.len()];
        let mut cancelled = false;
        for (index, result) in finished.into_iter().flatten() {
            match result {
                Ok(payload) => slots[index] = Some(payload),
                Err(FetchError::Cancelled) => cancelled = true,
                Err(e) => debug!(category = %slugs[index], error = %e, "Category unavailable"),
            }
        }
        if cancelled || self.ctx.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        load.results = slots
            .into_iter()
            .enumerate()
            .map(|(index, payload)| CategoryLoadResult { index, payload })
            .collect();

        info!(
            workers,
            fetched = load.fetched(),
            succeeded = load.succeeded(),
            "Parallel category load finished"
        );
        report(&load, true, warnings);
        Ok(load)
    }

    /// Pulls jobs until the queue is empty or the load is cancelled.
    async fn worker(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<(usize, &String)>>,
    ) -> Vec<(usize, Result<Payload, FetchError>)> {
        let mut done = Vec::new();
        loop {
            if self.ctx.cancel.is_cancelled() {
                break;
            }
            let job = match queue.lock() {
                Ok(mut guard) => guard.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some((index, slug)) = job else {
                break;
            };
            debug!(worker, index, category = %slug, "Fetching category");
            done.push((index, self.fetch_category(slug).await));
        }
        done
    }

    /// Fetches one category and makes sure it carries inline items.
    async fn fetch_category(&self, slug: &str) -> Result<Payload, FetchError> {
        let api = self.ctx.api.as_ref();
        let (venue, language) = (self.venue, self.ctx.language());
        let mut payload = self
            .ctx
            .call(self.auth, |auth| async move {
                api.category(venue, slug, language, &auth).await
            })
            .await?;

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        if payload.get_array("items").is_empty() {
            let ids = category_item_ids(&payload);
            if !ids.is_empty() {
                debug!(category = %slug, ids = ids.len(), "Hydrating category items");
            }
            for chunk in ids.chunks(self.ctx.settings.items_batch_size.max(1)) {
                let batch = self
                    .ctx
                    .call(self.auth, |auth| async move {
                        api.items_batch(venue, chunk, language, &auth).await
                    })
                    .await?;
                collect_new_items(batch.get_array("items"), &mut seen, &mut items);
            }
        } else {
            collect_new_items(payload.get_array("items"), &mut seen, &mut items);
        }

        let items: Vec<Value> = items.into_iter().map(Payload::into_value).collect();
        payload.insert("items", Value::Array(items));
        Ok(payload)
    }
}

/// Emits at most one warning describing how complete `load` is.
///
/// `partial_applies` is false when a sequential load reached its target;
/// categories that were never needed do not make the result partial.
fn report(load: &CategoryLoad, partial_applies: bool, warnings: &mut Warnings) {
    let (fetched, succeeded) = (load.fetched(), load.succeeded());
    if fetched == 0 {
        return;
    }
    if succeeded == 0 {
        warn!(fetched, "No category page could be loaded");
        warnings.push(WARN_CATEGORIES_UNAVAILABLE);
    } else if partial_applies && succeeded < fetched {
        warn!(fetched, succeeded, "Some category pages could not be loaded");
        warnings.push(WARN_CATEGORIES_PARTIAL);
    }
}

// ============================================================================
// Menu Loading
// ============================================================================

/// A venue's menu as far as it could be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    /// Items in catalog order, deduplicated by id.
    pub items: Vec<Payload>,
    /// Whether category pages had to be fetched.
    pub from_categories: bool,
}

/// Loads a venue's menu from its assortment.
///
/// A partial assortment falls back to the category pages, stopping early
/// once `target` distinct items are known.
pub async fn load_menu(
    ctx: &FetchContext,
    venue: &str,
    auth: &AuthContext,
    target: Option<usize>,
    warnings: &mut Warnings,
) -> Result<Menu, FetchError> {
    let api = ctx.api.as_ref();
    let language = ctx.language();
    let assortment = ctx
        .call(auth, |auth| async move {
            api.assortment(venue, language, &auth).await
        })
        .await?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    collect_new_items(assortment.get_array("items"), &mut seen, &mut items);

    if !is_partial(&assortment) {
        return Ok(Menu {
            items,
            from_categories: false,
        });
    }

    let slugs = category_slugs(&assortment);
    if target.is_some_and(|t| t > 0 && items.len() >= t) {
        return Ok(Menu {
            items,
            from_categories: false,
        });
    }

    info!(venue, categories = slugs.len(), "Partial assortment, loading categories");
    let load = CategoryLoader::new(ctx, venue, auth)
        .with_known_items(seen.iter().cloned())
        .load(&slugs, target, warnings)
        .await?;
    for payload in load.payloads() {
        collect_new_items(payload.get_array("items"), &mut seen, &mut items);
    }

    Ok(Menu {
        items,
        from_categories: true,
    })
}

/// True when the assortment does not carry the whole catalog inline.
pub fn is_partial(assortment: &Payload) -> bool {
    match assortment.get_str("loading_strategy") {
        Some(strategy) => strategy.eq_ignore_ascii_case("partial"),
        None => assortment.get_array("items").is_empty() && !assortment.get_array("categories").is_empty(),
    }
}

/// Category slugs of an assortment, depth-first, without duplicates.
pub fn category_slugs(assortment: &Payload) -> Vec<String> {
    fn walk(categories: &[Value], seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for category in categories {
            if let Some(slug) = category.get("slug").and_then(as_id) {
                if seen.insert(slug.clone()) {
                    out.push(slug);
                }
            }
            if let Some(children) = category.get("subcategories").and_then(Value::as_array) {
                walk(children, seen, out);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(assortment.get_array("categories"), &mut seen, &mut out);
    out
}

/// Item ids a category page lists without inline items, deduplicated.
fn category_item_ids(payload: &Payload) -> Vec<String> {
    let listed = if payload.get_array("item_ids").is_empty() {
        payload
            .get_path(&["category", "item_ids"])
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    } else {
        payload.get_array("item_ids")
    };

    let mut seen = HashSet::new();
    listed
        .iter()
        .filter_map(as_id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Appends item objects whose id was not seen yet. Items without an id are
/// dropped.
fn collect_new_items(values: &[Value], seen: &mut HashSet<String>, out: &mut Vec<Payload>) {
    for value in values {
        let Some(id) = value.get("id").and_then(as_id) else {
            continue;
        };
        if seen.insert(id) {
            if let Some(item) = Payload::from_value(value.clone()) {
                out.push(item);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::MockUpstream;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(api: MockUpstream) -> (Arc<MockUpstream>, FetchContext) {
        let api = Arc::new(api);
        let ctx = FetchContext::builder(api.clone())
            .retry(RetryPolicy::default().with_pause(Duration::ZERO))
            .build();
        (api, ctx)
    }

    fn slugs(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn item_ids(items: &[Payload]) -> Vec<String> {
        items.iter().filter_map(|i| i.get("id").and_then(as_id)).collect()
    }

    #[tokio::test]
    async fn test_sequential_stops_at_target() {
        let (api, ctx) = context(
            MockUpstream::new()
                .category_items("a", &["1"])
                .category_items("b", &["2"])
                .category_items("c", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["a", "b", "c"]), Some(2), &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.strategy, LoadStrategy::SequentialUntil(2));
        assert_eq!(api.count("category:"), 2);
        assert_eq!(load.payloads().count(), 2);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_parallel_preserves_input_order() {
        let (api, ctx) = context(
            MockUpstream::new()
                .category_items("slow", &["1"])
                .category_delay("slow", Duration::from_millis(40))
                .category_items("medium", &["2"])
                .category_delay("medium", Duration::from_millis(20))
                .category_items("fast", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["slow", "medium", "fast"]), None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.strategy, LoadStrategy::BoundedParallel { workers: 3 });
        assert_eq!(api.count("category:"), 3);
        assert_eq!(item_ids(&load.items()), vec!["1", "2", "3"]);
        let indices: Vec<usize> = load.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_zero_successes_single_warning() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .category("a", Err(403))
                .category("b", Err(404)),
        );
        let auth = AuthContext::anonymous();

        for target in [None, Some(5)] {
            let mut warnings = Warnings::new();
            let load = CategoryLoader::new(&ctx, "venue", &auth)
                .load(&slugs(&["a", "b"]), target, &mut warnings)
                .await
                .unwrap();

            assert!(load.items().is_empty());
            assert_eq!(warnings.as_slice(), [WARN_CATEGORIES_UNAVAILABLE]);
        }
    }

    #[tokio::test]
    async fn test_partial_success_warns_once() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .category_items("a", &["1"])
                .category("b", Err(500))
                .category_items("c", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["a", "b", "c"]), None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.succeeded(), 2);
        assert_eq!(load.results[1].payload, None);
        assert_eq!(warnings.as_slice(), [WARN_CATEGORIES_PARTIAL]);
    }

    #[tokio::test]
    async fn test_sequential_reaching_target_ignores_failures() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .category("a", Err(404))
                .category_items("b", &["1", "2"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["a", "b", "c"]), Some(2), &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.fetched(), 2);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_hydrates_items_in_batches() {
        let ids: Vec<String> = (0..170).map(|i| format!("id-{i}")).collect();
        let mut listed: Vec<Value> = ids.iter().map(|id| json!(id)).collect();
        listed.push(json!("id-0"));

        let mut mock = MockUpstream::new().category(
            "drinks",
            Ok(json!({"category": {"slug": "drinks", "item_ids": listed}})),
        );
        for id in &ids {
            mock = mock.batch_item(id, json!({"id": id, "name": id}));
        }
        let (api, ctx) = context(mock);
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["drinks"]), None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            vec!["category:drinks", "items_batch:80", "items_batch:80", "items_batch:10"]
        );
        assert_eq!(item_ids(&load.items()), ids);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_hydration_fails_category() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .category("a", Ok(json!({"item_ids": ["1"]})))
                .batch_status(403),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["a"]), None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.succeeded(), 0);
        assert_eq!(warnings.as_slice(), [WARN_CATEGORIES_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_empty_input_has_no_warning() {
        let (_api, ctx) = context(MockUpstream::new());
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&[], None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.fetched(), 0);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_load_is_an_error() {
        let (_api, ctx) = context(MockUpstream::new().category_items("a", &["1"]));
        ctx.cancel.cancel();
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let result = CategoryLoader::new(&ctx, "venue", &auth)
            .load(&slugs(&["a"]), None, &mut warnings)
            .await;

        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_repeated_loads_are_identical() {
        let mock = || {
            MockUpstream::new()
                .category_items("a", &["1", "2"])
                .category_items("b", &["2", "3"])
                .category("c", Err(503))
        };
        let auth = AuthContext::anonymous();
        let mut outputs = Vec::new();

        for _ in 0..3 {
            let (_api, ctx) = context(mock());
            let mut warnings = Warnings::new();
            let load = CategoryLoader::new(&ctx, "venue", &auth)
                .load(&slugs(&["a", "b", "c"]), None, &mut warnings)
                .await
                .unwrap();
            let items: Vec<Value> = load.items().into_iter().map(Payload::into_value).collect();
            outputs.push((serde_json::to_string(&items).unwrap(), warnings));
        }

        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(outputs[0].1.as_slice(), [WARN_CATEGORIES_PARTIAL]);
    }

    #[tokio::test]
    async fn test_load_menu_full_assortment() {
        let (api, ctx) = context(MockUpstream::new().assortment(Ok(json!({
            "loading_strategy": "full",
            "items": [{"id": "1"}, {"id": "2"}, {"id": "1"}]
        }))));
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let menu = load_menu(&ctx, "venue", &auth, None, &mut warnings).await.unwrap();

        assert!(!menu.from_categories);
        assert_eq!(item_ids(&menu.items), vec!["1", "2"]);
        assert_eq!(api.count("category:"), 0);
    }

    #[tokio::test]
    async fn test_load_menu_partial_assortment() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .assortment(Ok(json!({
                    "loading_strategy": "partial",
                    "categories": [
                        {"slug": "mains", "subcategories": [{"slug": "pizza"}]},
                        {"slug": "drinks"}
                    ]
                })))
                .category_items("mains", &["1"])
                .category_items("pizza", &["2", "1"])
                .category_items("drinks", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let menu = load_menu(&ctx, "venue", &auth, None, &mut warnings).await.unwrap();

        assert!(menu.from_categories);
        assert_eq!(item_ids(&menu.items), vec!["1", "2", "3"]);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_load_menu_target_counts_inline_items_once() {
        let (api, ctx) = context(
            MockUpstream::new()
                .assortment(Ok(json!({
                    "loading_strategy": "partial",
                    "items": [{"id": "1"}],
                    "categories": [{"slug": "a"}, {"slug": "b"}, {"slug": "c"}]
                })))
                .category_items("a", &["1"])
                .category_items("b", &["2"])
                .category_items("c", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let menu = load_menu(&ctx, "venue", &auth, Some(2), &mut warnings)
            .await
            .unwrap();

        assert_eq!(item_ids(&menu.items), vec!["1", "2"]);
        assert_eq!(api.calls(), vec!["assortment", "category:a", "category:b"]);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_known_items_count_toward_target() {
        let (api, ctx) = context(
            MockUpstream::new()
                .category_items("a", &["1", "2"])
                .category_items("b", &["3"]),
        );
        let auth = AuthContext::anonymous();
        let mut warnings = Warnings::new();

        let load = CategoryLoader::new(&ctx, "venue", &auth)
            .with_known_items(["9".to_string()])
            .load(&slugs(&["a", "b"]), Some(3), &mut warnings)
            .await
            .unwrap();

        assert_eq!(load.fetched(), 1);
        assert_eq!(api.count("category:"), 1);
    }
}
