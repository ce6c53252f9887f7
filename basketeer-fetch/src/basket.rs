//! Basket listing and removal.

use basketeer_core::{BasketSummary, Payload};
use tracing::{info, instrument};

use crate::auth::AuthContext;
use crate::context::FetchContext;
use crate::error::FetchError;

/// Lists the signed-in user's baskets.
#[instrument(skip(ctx, auth))]
pub async fn list_baskets(
    ctx: &FetchContext,
    auth: &AuthContext,
) -> Result<Vec<BasketSummary>, FetchError> {
    if !auth.has_credentials() {
        return Err(FetchError::MissingCredentials(
            "baskets require a token or cookie".to_string(),
        ));
    }

    let api = ctx.api.as_ref();
    let payload = ctx
        .call(auth, |auth| async move { api.baskets(&auth).await })
        .await?;

    let listed = ["baskets", "results", "items"]
        .iter()
        .map(|key| payload.get_array(key))
        .find(|list| !list.is_empty())
        .unwrap_or_default();

    Ok(listed
        .iter()
        .filter_map(|value| Payload::from_value(value.clone()))
        .filter_map(|basket| BasketSummary::from_payload(&basket))
        .collect())
}

/// Removes a basket, or one line of it.
///
/// The upstream API can only delete whole baskets. Removing a single line
/// is therefore allowed only when it is the basket's only line; anything
/// else is refused with [`FetchError::Unsupported`].
#[instrument(skip(ctx, auth))]
pub async fn remove_from_basket(
    ctx: &FetchContext,
    auth: &AuthContext,
    basket_id: &str,
    item_id: Option<&str>,
) -> Result<BasketSummary, FetchError> {
    let basket = list_baskets(ctx, auth)
        .await?
        .into_iter()
        .find(|b| b.id == basket_id)
        .ok_or_else(|| FetchError::NotFound(format!("basket {basket_id}")))?;

    if let Some(item_id) = item_id {
        if !basket.item_ids.iter().any(|id| id == item_id) {
            return Err(FetchError::NotFound(format!(
                "item {item_id} in basket {basket_id}"
            )));
        }
        if basket.item_count() > 1 {
            return Err(FetchError::Unsupported(format!(
                "basket {basket_id} holds {} items; removing a single item is not supported, \
                 remove the whole basket instead",
                basket.item_count()
            )));
        }
    }

    let api = ctx.api.as_ref();
    ctx.call(auth, |auth| async move {
        api.delete_basket(basket_id, &auth).await
    })
    .await?;

    info!(basket = %basket_id, "Basket removed");
    Ok(basket)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUpstream;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> (Arc<MockUpstream>, FetchContext) {
        let api = Arc::new(MockUpstream::new().baskets(json!({"baskets": [
            {"id": "single", "venue": {"slug": "deli"}, "items": [{"id": "a"}]},
            {"id": "multi", "venue_slug": "pizza", "items": [{"id": "b"}, {"id": "c"}]}
        ]})));
        let ctx = FetchContext::new(api.clone());
        (api, ctx)
    }

    fn signed_in() -> AuthContext {
        AuthContext::new(Some("a.b.c".into()), None, vec![])
    }

    #[tokio::test]
    async fn test_list_baskets() {
        let (_api, ctx) = context();
        let baskets = list_baskets(&ctx, &signed_in()).await.unwrap();
        assert_eq!(baskets.len(), 2);
        assert_eq!(baskets[1].venue.as_deref(), Some("pizza"));
        assert_eq!(baskets[1].item_count(), 2);
    }

    #[tokio::test]
    async fn test_list_requires_credentials() {
        let (api, ctx) = context();
        let result = list_baskets(&ctx, &AuthContext::anonymous()).await;
        assert!(matches!(result, Err(FetchError::MissingCredentials(_))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_single_item_basket() {
        let (api, ctx) = context();
        let removed = remove_from_basket(&ctx, &signed_in(), "single", Some("a"))
            .await
            .unwrap();
        assert_eq!(removed.id, "single");
        assert_eq!(api.deleted(), vec!["single"]);
    }

    #[tokio::test]
    async fn test_remove_line_from_multi_item_basket_is_unsupported() {
        let (api, ctx) = context();
        let result = remove_from_basket(&ctx, &signed_in(), "multi", Some("b")).await;
        assert!(matches!(result, Err(FetchError::Unsupported(_))));
        assert!(api.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_remove_whole_multi_item_basket() {
        let (api, ctx) = context();
        remove_from_basket(&ctx, &signed_in(), "multi", None)
            .await
            .unwrap();
        assert_eq!(api.deleted(), vec!["multi"]);
    }

    #[tokio::test]
    async fn test_remove_unknown_basket_or_item() {
        let (_api, ctx) = context();
        let missing = remove_from_basket(&ctx, &signed_in(), "nope", None).await;
        assert!(missing.unwrap_err().is_not_found());

        let wrong_item = remove_from_basket(&ctx, &signed_in(), "single", Some("zzz")).await;
        assert!(wrong_item.unwrap_err().is_not_found());
    }
}
