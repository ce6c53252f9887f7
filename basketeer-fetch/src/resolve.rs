//! Item and venue resolution.
//!
//! Each entity is looked up through three sources, in this order:
//!
//! 1. its direct endpoint,
//! 2. the venue assortment, searched by id,
//! 3. venue content pages, following next-page tokens.
//!
//! Every source normalizes its raw payload into the canonical field names
//! of `basketeer_core` before the cascade merges it.

use async_trait::async_trait;
use basketeer_core::payload::{as_i64, as_id, as_str};
use basketeer_core::{
    FIELD_CURRENCY, FIELD_NAME, FIELD_OPTION_GROUPS, FIELD_PRICE, OptionGroup, Payload,
    ResolvedItem, ResolvedVenue, Warnings,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::auth::AuthContext;
use crate::cascade::{CandidateSource, CascadeState, FallbackCascade, SourceAttempt};
use crate::context::FetchContext;
use crate::error::FetchError;

/// Keys that may hold an item's price, in priority order.
const PRICE_KEYS: &[&str] = &["price", "baseprice", "base_price", "unit_price"];

/// Keys that may hold an item's option references or specifications.
const OPTION_KEYS: &[&str] = &["options", "option_groups"];

/// Keys that may hold the next content page token.
const PAGE_TOKEN_PATHS: &[&[&str]] = &[
    &["next_page_token"],
    &["pagination", "next_page_token"],
    &["cursor"],
    &["pagination", "cursor"],
];

/// Nesting bound when searching payloads for an entity.
const MAX_SEARCH_DEPTH: usize = 12;

// ============================================================================
// Targets
// ============================================================================

/// What a cascade is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// An item by id.
    Item(String),
    /// The venue itself.
    Venue,
}

/// An entity of a venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Venue slug.
    pub venue: String,
    /// Entity within the venue.
    pub kind: TargetKind,
}

impl Target {
    /// Targets an item.
    pub fn item(venue: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            kind: TargetKind::Item(item_id.into()),
        }
    }

    /// Targets the venue.
    pub fn venue(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            kind: TargetKind::Venue,
        }
    }

    /// Finds and normalizes the target inside a raw payload.
    pub fn extract(&self, payload: &Payload) -> Option<Payload> {
        let root = payload.as_map();
        let candidate = match &self.kind {
            TargetKind::Item(id) => {
                find_by_id(root, id, 0).map(|item| normalize_item(item, root))
            }
            TargetKind::Venue => {
                let venue = ["venue", "venue_raw"]
                    .iter()
                    .find_map(|key| root.get(*key).and_then(Value::as_object))
                    .or_else(|| {
                        root.get("results")
                            .and_then(Value::as_array)
                            .and_then(|r| r.first())
                            .and_then(|r| r.get("venue"))
                            .and_then(Value::as_object)
                    })?;
                Some(normalize_venue(venue))
            }
        };
        candidate.filter(|c| !c.is_empty())
    }

    fn describe(&self) -> String {
        match &self.kind {
            TargetKind::Item(id) => format!("item {id} in venue {}", self.venue),
            TargetKind::Venue => format!("venue {}", self.venue),
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

/// The entity's own endpoint.
pub struct DirectSource {
    target: Target,
}

impl DirectSource {
    /// Creates the source.
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CandidateSource for DirectSource {
    fn id(&self) -> &str {
        match self.target.kind {
            TargetKind::Item(_) => "item endpoint",
            TargetKind::Venue => "venue endpoint",
        }
    }

    async fn candidate(
        &self,
        ctx: &FetchContext,
        auth: &AuthContext,
        _state: &mut CascadeState,
    ) -> Result<Option<Payload>, FetchError> {
        let api = ctx.api.as_ref();
        let (venue, language) = (self.target.venue.as_str(), ctx.language());

        match &self.target.kind {
            TargetKind::Item(id) => {
                let id = id.as_str();
                let payload = ctx
                    .call(auth, |auth| async move {
                        api.item(venue, id, language, &auth).await
                    })
                    .await?;
                // The item endpoint sometimes answers with the bare item.
                Ok(self
                    .target
                    .extract(&payload)
                    .or_else(|| Some(normalize_item(payload.as_map(), payload.as_map())))
                    .filter(|p| !p.is_empty()))
            }
            TargetKind::Venue => {
                let payload = ctx
                    .call(auth, |auth| async move { api.venue(venue, &auth).await })
                    .await?;
                Ok(self
                    .target
                    .extract(&payload)
                    .or_else(|| Some(normalize_venue(payload.as_map())))
                    .filter(|p| !p.is_empty()))
            }
        }
    }
}

/// The venue assortment, searched for the entity.
pub struct AssortmentSource {
    target: Target,
}

impl AssortmentSource {
    /// Creates the source.
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CandidateSource for AssortmentSource {
    fn id(&self) -> &str {
        "assortment"
    }

    async fn candidate(
        &self,
        ctx: &FetchContext,
        auth: &AuthContext,
        _state: &mut CascadeState,
    ) -> Result<Option<Payload>, FetchError> {
        let api = ctx.api.as_ref();
        let (venue, language) = (self.target.venue.as_str(), ctx.language());
        let payload = ctx
            .call(auth, |auth| async move {
                api.assortment(venue, language, &auth).await
            })
            .await?;
        Ok(self.target.extract(&payload))
    }
}

/// Venue content pages, followed until the entity shows up.
///
/// At most `content_page_limit` pages are read.
pub struct ContentSource {
    target: Target,
}

impl ContentSource {
    /// Creates the source.
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CandidateSource for ContentSource {
    fn id(&self) -> &str {
        "venue content"
    }

    async fn candidate(
        &self,
        ctx: &FetchContext,
        auth: &AuthContext,
        state: &mut CascadeState,
    ) -> Result<Option<Payload>, FetchError> {
        let api = ctx.api.as_ref();
        let (venue, language) = (self.target.venue.as_str(), ctx.language());
        let limit = ctx.settings.content_page_limit;
        let mut token: Option<String> = None;

        for page_number in 1..=limit {
            let page_token = token.as_deref();
            let page = match ctx
                .call(auth, |auth| async move {
                    api.venue_content(venue, page_token, language, &auth).await
                })
                .await
            {
                Ok(page) => page,
                // The first page decides whether the source is available.
                Err(e) if page_number == 1 => return Err(e),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    state
                        .warnings
                        .push(format!("venue content page {page_number} unavailable: {e}"));
                    return Ok(None);
                }
            };

            if page.is_empty() {
                debug!(page_number, "Empty content page");
                return Ok(None);
            }
            if let Some(found) = self.target.extract(&page) {
                debug!(page_number, "Target found in content");
                return Ok(Some(found));
            }

            let Some(next) = next_page_token(&page) else {
                return Ok(None);
            };
            if token.as_deref() == Some(next.as_str()) || !state.seen_page_tokens.insert(next.clone()) {
                debug!(page_number, "Content page token repeated");
                return Ok(None);
            }
            token = Some(next);
        }

        Ok(None)
    }
}

/// Reads the token of the page after `page`.
pub fn next_page_token(page: &Payload) -> Option<String> {
    PAGE_TOKEN_PATHS
        .iter()
        .find_map(|path| page.get_path(path).and_then(as_str))
        .map(str::to_string)
}

// ============================================================================
// Resolution
// ============================================================================

/// A resolved entity with the evidence behind it.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    /// The typed entity.
    pub value: T,
    /// The merged payload it was promoted from.
    pub payload: Payload,
    /// Source attempts in order.
    pub attempts: Vec<SourceAttempt>,
    /// Whether every required field was found.
    pub complete: bool,
    /// Warnings raised while resolving.
    pub warnings: Warnings,
}

/// Resolves an item's name, price, currency and option groups.
#[instrument(skip(ctx, auth))]
pub async fn resolve_item(
    ctx: &FetchContext,
    auth: &AuthContext,
    venue: &str,
    item_id: &str,
) -> Result<Resolution<ResolvedItem>, FetchError> {
    let target = Target::item(venue, item_id);
    let cascade = FallbackCascade::new(
        vec![
            Box::new(DirectSource::new(target.clone())),
            Box::new(AssortmentSource::new(target.clone())),
            Box::new(ContentSource::new(target.clone())),
        ],
        item_is_complete,
        item_has_signal,
    );

    let outcome = cascade.resolve(ctx, auth, &target.describe()).await?;
    let value = ResolvedItem::from_payload(item_id, &outcome.merged);
    let mut warnings = outcome.warnings;

    if !outcome.complete {
        let mut missing = Vec::new();
        if value.price.is_none() {
            missing.push("price");
        }
        if value.option_groups.is_empty() {
            missing.push("option groups");
        }
        warnings.push(format!(
            "item {item_id} is incomplete: missing {}",
            missing.join(", ")
        ));
    }

    Ok(Resolution {
        value,
        payload: outcome.merged,
        attempts: outcome.attempts,
        complete: outcome.complete,
        warnings,
    })
}

/// Resolves a venue's name, currency and location.
#[instrument(skip(ctx, auth))]
pub async fn resolve_venue(
    ctx: &FetchContext,
    auth: &AuthContext,
    venue: &str,
) -> Result<Resolution<ResolvedVenue>, FetchError> {
    let target = Target::venue(venue);
    let cascade = FallbackCascade::new(
        vec![
            Box::new(DirectSource::new(target.clone())),
            Box::new(AssortmentSource::new(target.clone())),
            Box::new(ContentSource::new(target.clone())),
        ],
        |p| ResolvedVenue::from_payload("", p).is_complete(),
        |p| p.has(FIELD_NAME) || p.has("id"),
    );

    let outcome = cascade.resolve(ctx, auth, &target.describe()).await?;
    let value = ResolvedVenue::from_payload(venue, &outcome.merged);
    let mut warnings = outcome.warnings;
    if !outcome.complete {
        warnings.push(format!("venue {venue} is incomplete: currency unknown"));
    }

    Ok(Resolution {
        value,
        payload: outcome.merged,
        attempts: outcome.attempts,
        complete: outcome.complete,
        warnings,
    })
}

fn item_is_complete(payload: &Payload) -> bool {
    ResolvedItem::from_payload("", payload).is_complete()
}

fn item_has_signal(payload: &Payload) -> bool {
    payload.has(FIELD_NAME) || payload.has(FIELD_PRICE) || payload.has(FIELD_OPTION_GROUPS)
}

// ============================================================================
// Normalization
// ============================================================================

/// Depth-first search for an object whose `id` equals `id`.
fn find_by_id<'a>(map: &'a Map<String, Value>, id: &str, depth: usize) -> Option<&'a Map<String, Value>> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    if map.get("id").and_then(as_id).as_deref() == Some(id) {
        return Some(map);
    }
    map.values().find_map(|value| find_in_value(value, id, depth + 1))
}

fn find_in_value<'a>(value: &'a Value, id: &str, depth: usize) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(map) => find_by_id(map, id, depth),
        Value::Array(values) => values.iter().find_map(|v| find_in_value(v, id, depth + 1)),
        _ => None,
    }
}

/// Maps an upstream item object to canonical fields.
///
/// `container` is the payload the item was found in; it supplies the
/// currency and the option definitions that items only reference.
fn normalize_item(item: &Map<String, Value>, container: &Map<String, Value>) -> Payload {
    let mut out = Payload::new();

    if let Some(id) = item.get("id").and_then(as_id) {
        out.insert("id", id);
    }
    if let Some(name) = ["name", "title"].iter().find_map(|k| item.get(*k).and_then(text)) {
        out.insert(FIELD_NAME, name);
    }
    if let Some(price) = item_price(item) {
        out.insert(FIELD_PRICE, price);
    }

    let currency = item
        .get("currency")
        .and_then(as_str)
        .or_else(|| container.get("currency").and_then(as_str))
        .or_else(|| {
            container
                .get("venue")
                .and_then(|v| v.get("currency"))
                .and_then(as_str)
        });
    if let Some(currency) = currency {
        out.insert(FIELD_CURRENCY, currency);
    }

    let groups = option_groups(item, container);
    if !groups.is_empty() {
        out.insert(FIELD_OPTION_GROUPS, Value::Array(groups));
    }
    out
}

/// First positive price among the known price keys.
fn item_price(item: &Map<String, Value>) -> Option<i64> {
    PRICE_KEYS
        .iter()
        .filter_map(|key| item.get(*key))
        .find_map(|value| match value {
            Value::Object(obj) => obj.get("amount").and_then(as_i64),
            other => as_i64(other),
        })
        .filter(|price| *price > 0)
}

/// Option-group specifications for an item.
///
/// Entries that already carry their values are kept as they are. Entries
/// that only reference a group by id are resolved against the container's
/// top-level option definitions; unresolvable references are dropped.
fn option_groups(item: &Map<String, Value>, container: &Map<String, Value>) -> Vec<Value> {
    let definitions = container
        .get("options")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);

    let entries = OPTION_KEYS
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_array))
        .find(|entries| !entries.is_empty())
        .map_or(&[][..], Vec::as_slice);

    entries
        .iter()
        .filter_map(|entry| {
            if has_values(entry) {
                return Some(entry.clone());
            }
            let reference = entry
                .get("option_id")
                .or_else(|| entry.get("id"))
                .and_then(as_id)?;
            let definition = definitions
                .iter()
                .find(|d| d.get("id").and_then(as_id).as_deref() == Some(reference.as_str()))?;

            let mut spec = Payload::from_value(definition.clone())?;
            if let Some(local) = Payload::from_value(entry.clone()) {
                spec.merge_missing(&local);
            }
            Some(spec.into_value())
        })
        .filter(|spec| OptionGroup::from_value(spec).is_some())
        .collect()
}

fn has_values(entry: &Value) -> bool {
    ["values", "choices"]
        .iter()
        .any(|k| entry.get(*k).and_then(Value::as_array).is_some_and(|v| !v.is_empty()))
}

/// Maps an upstream venue object to canonical fields.
fn normalize_venue(venue: &Map<String, Value>) -> Payload {
    let mut out = Payload::new();

    if let Some(id) = venue.get("id").and_then(as_id) {
        out.insert("id", id);
    }
    if let Some(name) = venue.get("name").and_then(text) {
        out.insert(FIELD_NAME, name);
    }
    for key in [FIELD_CURRENCY, "country", "address"] {
        if let Some(value) = venue.get(key).and_then(as_str) {
            out.insert(key, value);
        }
    }
    if let Some(online) = venue.get("online").and_then(Value::as_bool) {
        out.insert("online", online);
    }
    out
}

/// Reads a display string: plain, or the first entry of a localized list
/// like `[{"lang": "en", "value": "Soup"}]`.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .find_map(|e| e.get("value").and_then(as_str))
            .map(str::to_string),
        other => as_str(other).map(str::to_string),
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

    fn size_group() -> Value {
        json!({"id": "size", "name": "Size", "values": [{"id": "l", "price": 200}]})
    }

    #[tokio::test]
    async fn test_direct_endpoint_complete_item() {
        let (api, ctx) = context(MockUpstream::new().item(
            "42",
            Ok(json!({"id": "42", "name": "Pizza", "price": 1200, "currency": "EUR",
                      "options": [size_group()]})),
        ));

        let resolved = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
            .await
            .unwrap();

        assert!(resolved.complete);
        assert_eq!(resolved.value.price, Some(1200));
        assert_eq!(resolved.value.option_groups.len(), 1);
        assert!(resolved.warnings.is_empty());
        assert_eq!(api.count("assortment"), 0);
    }

    #[tokio::test]
    async fn test_options_filled_from_assortment_references() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .item("42", Ok(json!({"item": {"id": "42", "name": "Pizza", "price": 1000}})))
                .assortment(Ok(json!({
                    "currency": "EUR",
                    "items": [{"id": "42", "price": 999, "options": [{"id": "o1", "option_id": "size"}]}],
                    "options": [size_group()]
                }))),
        );

        let resolved = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
            .await
            .unwrap();

        assert!(resolved.complete);
        assert_eq!(resolved.value.price, Some(1000));
        assert_eq!(resolved.value.currency.as_deref(), Some("EUR"));
        assert_eq!(resolved.value.option_groups[0].id, "size");
        assert_eq!(resolved.value.option_groups[0].values.len(), 1);
    }

    #[tokio::test]
    async fn test_content_pages_followed_until_found() {
        let (api, ctx) = context(
            MockUpstream::new()
                .item("42", Err(404))
                .assortment(Err(403))
                .content_page("", Ok(json!({"sections": [{"items": [{"id": "1"}]}], "next_page_token": "p2"})))
                .content_page("p2", Ok(json!({
                    "sections": [{"items": [{"id": "42", "name": "Soup", "baseprice": 650,
                                             "options": [size_group()]}]}]
                }))),
        );

        let resolved = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
            .await
            .unwrap();

        assert!(resolved.complete);
        assert_eq!(resolved.value.price, Some(650));
        assert_eq!(resolved.warnings.len(), 2);
        assert_eq!(api.count("content:"), 2);
    }

    #[tokio::test]
    async fn test_content_pagination_stops_on_repeated_token() {
        let (api, ctx) = context(
            MockUpstream::new()
                .item("42", Ok(json!({"id": "42", "name": "Soup"})))
                .assortment(Ok(json!({"items": []})))
                .content_page("", Ok(json!({"items": [], "next_page_token": "p2"})))
                .content_page("p2", Ok(json!({"items": [], "next_page_token": "p2"}))),
        );

        let resolved = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
            .await
            .unwrap();

        assert!(!resolved.complete);
        assert_eq!(api.count("content:"), 2);
        assert_eq!(
            resolved.warnings.as_slice(),
            ["item 42 is incomplete: missing price, option groups"]
        );
    }

    #[tokio::test]
    async fn test_content_pagination_bounded() {
        let mut mock = MockUpstream::new()
            .item("42", Ok(json!({"id": "42", "name": "Soup"})))
            .assortment(Ok(json!({})))
            .content_page("", Ok(json!({"items": [{"id": "x"}], "next_page_token": "p1"})));
        for n in 1..10 {
            mock = mock.content_page(
                &format!("p{n}"),
                Ok(json!({"items": [{"id": "x"}], "next_page_token": format!("p{}", n + 1)})),
            );
        }
        let (api, ctx) = context(mock);

        resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
            .await
            .unwrap();

        assert_eq!(api.count("content:"), 3);
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .item("42", Err(404))
                .assortment(Ok(json!({"items": [{"id": "1", "name": "Other"}]})))
                .content_page("", Ok(json!({}))),
        );

        let result = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42").await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let mock = || {
            MockUpstream::new()
                .item("42", Ok(json!({"id": "42", "price": 1000})))
                .assortment(Ok(json!({
                    "items": [{"id": "42", "name": "Pizza", "options": [size_group()]}]
                })))
        };

        let mut outputs = Vec::new();
        for _ in 0..3 {
            let (_api, ctx) = context(mock());
            let resolved = resolve_item(&ctx, &AuthContext::anonymous(), "venue", "42")
                .await
                .unwrap();
            outputs.push(serde_json::to_vec(&resolved.payload).unwrap());
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_resolve_venue_merges_sources() {
        let (_api, ctx) = context(
            MockUpstream::new()
                .venue(Ok(json!({"results": [{"venue": {"id": "v1", "name": "Deli", "country": "FIN"}}]})))
                .assortment(Ok(json!({"venue": {"currency": "EUR"}}))),
        );

        let resolved = resolve_venue(&ctx, &AuthContext::anonymous(), "deli")
            .await
            .unwrap();

        assert!(resolved.complete);
        assert_eq!(resolved.value.slug, "deli");
        assert_eq!(resolved.value.name.as_deref(), Some("Deli"));
        assert_eq!(resolved.value.currency.as_deref(), Some("EUR"));
        assert_eq!(resolved.value.country.as_deref(), Some("FIN"));
    }

    #[test]
    fn test_localized_names_and_price_objects() {
        let item = json!({"id": 7, "name": [{"lang": "en", "value": "Tea"}], "price": {"amount": 300}});
        let normalized = normalize_item(item.as_object().unwrap(), &Map::new());
        assert_eq!(normalized.get_str("name"), Some("Tea"));
        assert_eq!(normalized.get_i64("price"), Some(300));
        assert_eq!(normalized.get_str("id"), Some("7"));
    }

    #[test]
    fn test_next_page_token_paths() {
        let nested = Payload::from_value(json!({"pagination": {"next_page_token": "n"}})).unwrap();
        assert_eq!(next_page_token(&nested).as_deref(), Some("n"));
        assert_eq!(next_page_token(&Payload::new()), None);
    }
}
