use provenance_common::{LedgerEvent, ProductId, ProductStatus};
use provenance_node::api::ErrorResponse;
use provenance_node_integration::harness::TestHarness;
use provenance_node_integration::random_identity;
use reqwest::StatusCode;

/// Ada registers a widget, Carl is authorized but locked out until granted
/// access, then records the move to Port-B.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn widget_journey_end_to_end() {
    let h = TestHarness::setup().await;

    let id = h
        .ada
        .register("Widget", "A widget", "Warehouse-A")
        .await
        .unwrap();
    assert_eq!(id, ProductId(1));

    let widget = h.ada.details(id).await.unwrap();
    assert_eq!(widget.status, ProductStatus::Created);
    assert_eq!(widget.location_history(), vec!["Warehouse-A"]);

    h.ada.authorize_user(&h.carl.identity).await.unwrap();
    let (status, _) = h
        .carl
        .append_journey(id, "Port-B", "InTransit")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    h.ada.grant_access(id, &h.carl.identity).await.unwrap();
    h.carl
        .append_journey(id, "Port-B", "InTransit")
        .await
        .unwrap();

    let widget = h.carl.details(id).await.unwrap();
    assert_eq!(widget.current_location, "Port-B");
    assert_eq!(widget.status, ProductStatus::InTransit);
    assert_eq!(widget.location_history(), vec!["Warehouse-A", "Port-B"]);
    assert_eq!(widget.time_history().len(), widget.history.len());
    assert_eq!(widget.handlers, vec![h.ada.identity.clone(), h.carl.identity.clone()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outsider_cannot_register_or_read() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();

    let (status, _) = h
        .olive
        .register("Knockoff", "", "Back alley")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.ada.total_count().await, 1);

    let (status, _) = h.olive.details(id).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.olive.history(id).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_register_leaves_count_unchanged() {
    let h = TestHarness::setup().await;

    let (status, _) = h.ada.register("", "nameless", "Warehouse-A").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = h.ada.register("Widget", "", "").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.ada.total_count().await, 0);
    assert_eq!(
        h.ada.register("Widget", "", "Warehouse-A").await.unwrap(),
        ProductId(1)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identical_updates_are_not_deduplicated() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();

    h.ada.append_journey(id, "Port-B", "InTransit").await.unwrap();
    h.ada.append_journey(id, "Port-B", "InTransit").await.unwrap();

    let history = h.ada.history(id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].location, "Port-B");
    assert_eq!(history[2].location, "Port-B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_status_is_bad_request() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();

    let (status, error) = h
        .ada
        .append_journey(id, "Port-B", "Teleported")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.contains("Teleported"));
    assert_eq!(h.ada.history(id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_product_is_not_found() {
    let h = TestHarness::setup().await;

    let (status, _) = h.ada.details(ProductId(999)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.ada.summary(ProductId(999)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h
        .ada
        .append_journey(ProductId(999), "Port-B", "Delivered")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(!h.olive.verify(ProductId(999)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn summary_is_public_and_redacted() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();
    h.ada.append_journey(id, "Port-B", "InTransit").await.unwrap();

    let summary = h.olive.summary(id).await.unwrap();
    assert_eq!(summary.name, "Widget");
    assert_eq!(summary.manufacturer, h.ada.identity);
    assert_eq!(summary.status, ProductStatus::InTransit);
    assert_eq!(summary.current_location, "Port-B");

    let raw = h.olive.summary_json(id).await.unwrap();
    let fields = raw.as_object().unwrap();
    assert!(!fields.contains_key("history"));
    assert!(!fields.contains_key("handlers"));

    assert!(h.olive.verify(id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn grant_requires_authorized_grantee_even_for_admin() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();

    let (status, _) = h.ada.grant_access(id, &h.olive.identity).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_manufacturer_or_admin_grants() {
    let h = TestHarness::setup().await;
    let maker = h.participant("Mia");
    h.ada.authorize_user(&maker.identity).await.unwrap();
    h.ada.authorize_user(&h.carl.identity).await.unwrap();

    let id = maker.register("Bolt", "", "Foundry").await.unwrap();

    let (status, _) = h
        .carl
        .grant_access(id, &h.carl.identity)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    maker.grant_access(id, &h.carl.identity).await.unwrap();
    h.carl.append_journey(id, "Yard", "Delivered").await.unwrap();
    // The administrator passes the access check with no grant.
    assert_eq!(h.ada.details(id).await.unwrap().status, ProductStatus::Delivered);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn authorize_user_is_admin_only_and_not_repeatable() {
    let h = TestHarness::setup().await;

    let (status, _) = h
        .carl
        .authorize_user(&h.olive.identity)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(!h.ada.is_authorized(&h.carl.identity).await);
    h.ada.authorize_user(&h.carl.identity).await.unwrap();
    assert!(h.olive.is_authorized(&h.carl.identity).await);

    let (status, _) = h
        .ada
        .authorize_user(&h.carl.identity)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    assert!(!h.ada.is_authorized(&random_identity()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_or_bad_caller_is_unauthorized() {
    let h = TestHarness::setup().await;
    let client = reqwest::Client::new();
    let url = format!("{}/products", h.node.base_url());
    let body = serde_json::json!({ "name": "Widget", "location": "Warehouse-A" });

    let resp = client.post(&url).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(&url)
        .header("x-caller", "zz-not-hex")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_are_served_in_emission_order() {
    let h = TestHarness::setup().await;
    let id = h.ada.register("Widget", "", "Warehouse-A").await.unwrap();
    h.ada.authorize_user(&h.carl.identity).await.unwrap();
    h.ada.append_journey(id, "Port-B", "InTransit").await.unwrap();

    let all = h.olive.events(0).await;
    let kinds: Vec<&str> = all
        .events
        .iter()
        .map(|e| match e.event {
            LedgerEvent::Registered { .. } => "registered",
            LedgerEvent::UserAuthorized { .. } => "authorized",
            LedgerEvent::Moved { .. } => "moved",
            LedgerEvent::StatusChanged { .. } => "status",
        })
        .collect();
    assert_eq!(kinds, vec!["registered", "authorized", "moved", "status"]);
    assert_eq!(all.next, 4);
    assert!(all.events.iter().enumerate().all(|(i, e)| e.seq == i));

    let tail = h.olive.events(2).await;
    assert_eq!(tail.events.len(), 2);
    assert_eq!(tail.events[0].seq, 2);
    assert!(h.olive.events(all.next).await.events.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undecodable_input_is_a_json_bad_request() {
    let h = TestHarness::setup().await;
    let client = reqwest::Client::new();
    let base = h.node.base_url();
    let caller = h.ada.identity.to_hex();

    let resp = client
        .get(format!("{base}/products/abc"))
        .header("x-caller", &caller)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(!body.error.is_empty());

    let resp = client
        .post(format!("{base}/products"))
        .header("x-caller", &caller)
        .json(&serde_json::json!({ "name": "Widget" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(body.error.contains("location"));

    let resp = client
        .get(format!("{base}/events?since=soon"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let _: ErrorResponse = resp.json().await.unwrap();

    assert_eq!(h.ada.total_count().await, 0);
}
