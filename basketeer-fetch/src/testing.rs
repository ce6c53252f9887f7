//! Scripted upstream used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use basketeer_core::Payload;
use serde_json::{Value, json};

use crate::api::UpstreamApi;
use crate::auth::{AuthContext, RotatedTokens};
use crate::error::{FetchError, UpstreamError};

type Scripted = Result<Value, u16>;

fn reply(scripted: Option<&Scripted>) -> Result<Payload, FetchError> {
    match scripted {
        Some(Ok(value)) => Ok(Payload::from_value_lossy(value.clone())),
        Some(Err(status)) => Err(UpstreamError::new(*status, "scripted failure").into()),
        None => Err(UpstreamError::new(404, "not scripted").into()),
    }
}

/// Upstream whose responses are fixed up front.
#[derive(Default)]
pub struct MockUpstream {
    categories: HashMap<String, Scripted>,
    category_delays: HashMap<String, Duration>,
    items: HashMap<String, Value>,
    batch_status: Option<u16>,
    assortment: Option<Scripted>,
    item: HashMap<String, Scripted>,
    venue: Option<Scripted>,
    content: HashMap<String, Scripted>,
    refresh: Option<Result<RotatedTokens, u16>>,
    baskets: Option<Value>,
    rejected_tokens: HashSet<String>,
    calls: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, slug: &str, response: Scripted) -> Self {
        self.categories.insert(slug.to_string(), response);
        self
    }

    pub fn category_items(self, slug: &str, ids: &[&str]) -> Self {
        let items: Vec<Value> = ids.iter().map(|id| json!({"id": id, "name": id})).collect();
        self.category(slug, Ok(json!({"category": {"slug": slug}, "items": items})))
    }

    pub fn category_delay(mut self, slug: &str, delay: Duration) -> Self {
        self.category_delays.insert(slug.to_string(), delay);
        self
    }

    pub fn batch_item(mut self, id: &str, value: Value) -> Self {
        self.items.insert(id.to_string(), value);
        self
    }

    pub fn batch_status(mut self, status: u16) -> Self {
        self.batch_status = Some(status);
        self
    }

    pub fn assortment(mut self, response: Scripted) -> Self {
        self.assortment = Some(response);
        self
    }

    pub fn item(mut self, id: &str, response: Scripted) -> Self {
        self.item.insert(id.to_string(), response);
        self
    }

    pub fn venue(mut self, response: Scripted) -> Self {
        self.venue = Some(response);
        self
    }

    /// Scripts a content page. The first page uses the empty token.
    pub fn content_page(mut self, token: &str, response: Scripted) -> Self {
        self.content.insert(token.to_string(), response);
        self
    }

    pub fn refresh(mut self, response: Result<RotatedTokens, u16>) -> Self {
        self.refresh = Some(response);
        self
    }

    pub fn baskets(mut self, value: Value) -> Self {
        self.baskets = Some(value);
        self
    }

    /// Every call made with this bearer token gets a 401.
    pub fn reject_token(mut self, token: &str) -> Self {
        self.rejected_tokens.insert(token.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn record(&self, call: String, auth: &AuthContext) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(call);
        match auth.bearer() {
            Some(token) if self.rejected_tokens.contains(token) => {
                Err(UpstreamError::new(401, "token rejected").into())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl UpstreamApi for MockUpstream {
    async fn category(
        &self,
        _venue: &str,
        category: &str,
        _language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.record(format!("category:{category}"), auth)?;
        if let Some(delay) = self.category_delays.get(category) {
            tokio::time::sleep(*delay).await;
        }
        reply(self.categories.get(category))
    }

    async fn items_batch(
        &self,
        _venue: &str,
        item_ids: &[String],
        _language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.record(format!("items_batch:{}", item_ids.len()), auth)?;
        if let Some(status) = self.batch_status {
            return Err(UpstreamError::new(status, "batch failure").into());
        }
        let items: Vec<Value> = item_ids
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect();
        Ok(Payload::from_value_lossy(json!({"items": items})))
    }

    async fn assortment(
        &self,
        _venue: &str,
        _language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.record("assortment".to_string(), auth)?;
        reply(self.assortment.as_ref())
    }

    async fn item(
        &self,
        _venue: &str,
        item_id: &str,
        _language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.record(format!("item:{item_id}"), auth)?;
        reply(self.item.get(item_id))
    }

    async fn venue(&self, _venue: &str, auth: &AuthContext) -> Result<Payload, FetchError> {
        self.record("venue".to_string(), auth)?;
        reply(self.venue.as_ref())
    }

    async fn venue_content(
        &self,
        _venue: &str,
        page_token: Option<&str>,
        _language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        let token = page_token.unwrap_or_default();
        self.record(format!("content:{token}"), auth)?;
        reply(self.content.get(token))
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
        _auth: &AuthContext,
    ) -> Result<RotatedTokens, FetchError> {
        self.calls.lock().unwrap().push("refresh".to_string());
        match &self.refresh {
            Some(Ok(tokens)) => Ok(tokens.clone()),
            Some(Err(status)) => Err(UpstreamError::new(*status, "refresh rejected").into()),
            None => Err(UpstreamError::new(400, "refresh not scripted").into()),
        }
    }

    async fn baskets(&self, auth: &AuthContext) -> Result<Payload, FetchError> {
        self.record("baskets".to_string(), auth)?;
        let value = self.baskets.clone().unwrap_or_else(|| json!({"baskets": []}));
        Ok(Payload::from_value_lossy(value))
    }

    async fn delete_basket(&self, basket_id: &str, auth: &AuthContext) -> Result<(), FetchError> {
        self.record(format!("delete_basket:{basket_id}"), auth)?;
        self.deleted.lock().unwrap().push(basket_id.to_string());
        Ok(())
    }
}
