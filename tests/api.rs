use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use trove::application::catalog::CatalogService;
use trove::application::economy::EconomyService;
use trove::application::metadata::MetadataService;
use trove::application::repos::{
    EconomyRepo, HealthRepo, ItemsRepo, MaterialList, MetadataRepo, RepoError,
};
use trove::cache::{CacheConfig, ManualClock, MemoryStorage, ReadThroughCache};
use trove::domain::entities::{
    CostRow, GLOBAL_VERSION_ID, ItemDetailRow, ItemRow, ItemSourceRow, MaterialRow,
    RepairEconomyRow, VersionRecord,
};
use trove::infra::http::{AdminState, HttpState, build_admin_router, build_router};

/// In-memory stand-in for the upstream views. `failure` makes every read fail
/// with that message.
#[derive(Default)]
struct FakeViews {
    items: Vec<ItemRow>,
    sources: Vec<ItemSourceRow>,
    economy: Vec<RepairEconomyRow>,
    version: Option<i64>,
    failure: Option<String>,
    item_reads: AtomicUsize,
}

impl FakeViews {
    fn check(&self) -> Result<(), RepoError> {
        match &self.failure {
            Some(message) => Err(RepoError::data_access(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ItemsRepo for FakeViews {
    async fn list_items(&self) -> Result<Vec<ItemRow>, RepoError> {
        self.item_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.items.clone())
    }

    async fn find_item(&self, id: &str) -> Result<Option<ItemDetailRow>, RepoError> {
        self.check()?;
        Ok(self
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .map(|item| ItemDetailRow {
                item,
                extra: serde_json::Map::new(),
            }))
    }

    async fn list_item_sources(&self, item_id: &str) -> Result<Vec<ItemSourceRow>, RepoError> {
        self.check()?;
        Ok(self
            .sources
            .iter()
            .filter(|source| source.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn list_item_materials(
        &self,
        item_id: &str,
        list: MaterialList,
    ) -> Result<Vec<MaterialRow>, RepoError> {
        self.check()?;
        let quantity = match list {
            MaterialList::Crafting => 3,
            MaterialList::Recycling => 1,
        };
        Ok(vec![MaterialRow {
            item_id: item_id.to_string(),
            material_id: "scrap".to_string(),
            material_name: Some("Scrap".to_string()),
            quantity,
        }])
    }
}

#[async_trait]
impl EconomyRepo for FakeViews {
    async fn list_repair_economy(&self) -> Result<Vec<RepairEconomyRow>, RepoError> {
        self.check()?;
        Ok(self.economy.clone())
    }

    async fn list_repair_costs(&self, item_id: &str) -> Result<Vec<CostRow>, RepoError> {
        self.check()?;
        Ok(vec![CostRow {
            item_id: item_id.to_string(),
            component_id: "gear".to_string(),
            component_name: None,
            quantity: 2,
            unit_cost: Some(12.5),
        }])
    }
}

#[async_trait]
impl MetadataRepo for FakeViews {
    async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
        self.check()?;
        Ok(self.version.map(|version| VersionRecord {
            id: GLOBAL_VERSION_ID.to_string(),
            version,
            last_synced_at: None,
        }))
    }
}

#[async_trait]
impl HealthRepo for FakeViews {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.check()
    }
}

fn item(id: &str, name: &str) -> ItemRow {
    ItemRow {
        id: id.to_string(),
        name: name.to_string(),
        icon: None,
        rarity: Some("uncommon".to_string()),
        item_type: Some("tool".to_string()),
    }
}

fn cache_for(views: &Arc<FakeViews>) -> Arc<ReadThroughCache> {
    Arc::new(ReadThroughCache::new(
        CacheConfig::default(),
        Arc::new(MemoryStorage::new(64)),
        views.clone(),
        Arc::new(ManualClock::new()),
    ))
}

fn routers(views: Arc<FakeViews>, cache: Option<Arc<ReadThroughCache>>) -> (Router, Router) {
    let http_state = HttpState {
        catalog: Arc::new(CatalogService::new(
            views.clone(),
            views.clone(),
            cache.clone(),
        )),
        economy: Arc::new(EconomyService::new(views.clone(), cache.clone())),
        metadata: Arc::new(MetadataService::new(views.clone(), cache.clone())),
    };
    let admin_state = AdminState {
        health: views,
        cache,
    };
    (build_router(http_state), build_admin_router(admin_state))
}

async fn send(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be json")
}

#[tokio::test]
async fn empty_items_view_returns_empty_array() {
    let (public, _) = routers(Arc::new(FakeViews::default()), None);

    let response = send(&public, Method::GET, "/api/items").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn items_database_error_returns_500_with_message() {
    let views = Arc::new(FakeViews {
        failure: Some("permission denied for view items_view".to_string()),
        ..Default::default()
    });
    let (public, _) = routers(views, None);

    let response = send(&public, Method::GET, "/api/items").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "permission denied for view items_view"})
    );
}

#[tokio::test]
async fn items_are_returned_as_rows() {
    let views = Arc::new(FakeViews {
        items: vec![item("anvil", "Anvil")],
        ..Default::default()
    });
    let (public, _) = routers(views, None);

    let response = send(&public, Method::GET, "/api/items").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!([{
            "id": "anvil",
            "name": "Anvil",
            "icon": null,
            "rarity": "uncommon",
            "item_type": "tool"
        }])
    );
}

#[tokio::test]
async fn unknown_item_sources_are_empty() {
    let (public, _) = routers(Arc::new(FakeViews::default()), None);

    let response = send(&public, Method::GET, "/items/unknown-id/sources").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn unknown_item_detail_is_404() {
    let (public, _) = routers(Arc::new(FakeViews::default()), None);

    let response = send(&public, Method::GET, "/api/items/ghost").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"error": "item not found"}));
}

#[tokio::test]
async fn repair_economy_is_served_on_both_paths() {
    let row: RepairEconomyRow = serde_json::from_value(json!({
        "item_id": "anvil",
        "name": "Anvil",
        "repair_cost": 40.0,
        "sell_value": 55.0,
        "weight": 8
    }))
    .expect("row");
    let views = Arc::new(FakeViews {
        economy: vec![row],
        ..Default::default()
    });
    let (public, _) = routers(views, None);

    for path in ["/repair-economy", "/adjustments_gpt/repair-economy"] {
        let response = send(&public, Method::GET, path).await;
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
        let body = json_body(response).await;
        assert_eq!(body[0]["item_id"], "anvil");
        assert_eq!(body[0]["weight"], 8);
    }
}

#[tokio::test]
async fn material_and_cost_endpoints_return_rows() {
    let (public, _) = routers(Arc::new(FakeViews::default()), None);

    let crafting = json_body(send(&public, Method::GET, "/api/items/anvil/crafting").await).await;
    assert_eq!(crafting[0]["quantity"], 3);

    let recycling = json_body(send(&public, Method::GET, "/api/items/anvil/recycling").await).await;
    assert_eq!(recycling[0]["quantity"], 1);

    let costs = json_body(send(&public, Method::GET, "/api/items/anvil/repair-costs").await).await;
    assert_eq!(costs[0]["unit_cost"], 12.5);
}

#[tokio::test]
async fn version_endpoint_reports_row_or_404() {
    let views = Arc::new(FakeViews {
        version: Some(9),
        ..Default::default()
    });
    let (public, _) = routers(views, None);
    let body = json_body(send(&public, Method::GET, "/api/meta/version").await).await;
    assert_eq!(body["version"], 9);
    assert_eq!(body["id"], "global");

    let (public, _) = routers(Arc::new(FakeViews::default()), None);
    let response = send(&public, Method::GET, "/api/meta/version").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({"error": "data version unavailable"})
    );
}

#[tokio::test]
async fn cached_items_are_served_without_touching_the_view() {
    let views = Arc::new(FakeViews {
        items: vec![item("anvil", "Anvil")],
        version: Some(1),
        ..Default::default()
    });
    let cache = cache_for(&views);
    let (public, _) = routers(views.clone(), Some(cache));

    for _ in 0..3 {
        let response = send(&public, Method::GET, "/api/items").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(views.item_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (public, _) = routers(Arc::new(FakeViews::default()), None);
    let response = send(&public, Method::GET, "/api/items").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn admin_health_reflects_row_store() {
    let (_, admin) = routers(Arc::new(FakeViews::default()), None);
    let response = send(&admin, Method::GET, "/health").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let failing = Arc::new(FakeViews {
        failure: Some("connection refused".to_string()),
        ..Default::default()
    });
    let (_, admin) = routers(failing, None);
    let response = send(&admin, Method::GET, "/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_cache_endpoints_manage_entries() {
    let views = Arc::new(FakeViews {
        items: vec![item("anvil", "Anvil")],
        version: Some(4),
        ..Default::default()
    });
    let cache = cache_for(&views);
    let (public, admin) = routers(views.clone(), Some(cache.clone()));

    send(&public, Method::GET, "/api/items").await;
    send(&public, Method::GET, "/repair-economy").await;
    assert_eq!(cache.len(), 2);

    let status = json_body(send(&admin, Method::GET, "/cache").await).await;
    assert_eq!(status, json!({"enabled": true, "entries": 2, "version": 4}));

    let response = send(&admin, Method::DELETE, "/cache/entries/items:list").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(cache.len(), 1);

    send(&public, Method::GET, "/api/items").await;
    assert_eq!(views.item_reads.load(Ordering::SeqCst), 2);

    let response = send(&admin, Method::POST, "/cache/clear").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn admin_cache_status_without_cache() {
    let (_, admin) = routers(Arc::new(FakeViews::default()), None);
    let status = json_body(send(&admin, Method::GET, "/cache").await).await;
    assert_eq!(
        status,
        json!({"enabled": false, "entries": 0, "version": null})
    );
}
