mod common;

use std::sync::Arc;

use oentex::cache::QueryKey;
use oentex::configuration::Settings;
use oentex::connectors::{BackendClient, DataGateway};
use oentex::models::{CompanyAggregate, Rating};
use oentex::services::{
    DealQuery, DealSort, MutationError, Notification, RatingSubmission, RecordingNotifier,
};
use oentex::startup::OentexApp;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    app: OentexApp,
    notifier: Arc<RecordingNotifier>,
}

/// Cached catalog, no user rating mocks yet.
async fn catalog_harness() -> Harness {
    let server = MockServer::start().await;
    common::mount_catalog(&server, (4.0, 9), (3.0, 2)).await;

    let gateway: Arc<dyn DataGateway> = Arc::new(
        BackendClient::new(common::backend_config(&server.uri()))
            .expect("Failed to build backend client"),
    );
    let notifier = Arc::new(RecordingNotifier::new());
    let app = OentexApp::with_gateway(Settings::default(), gateway, notifier.clone());

    // the catalog plus two differently sorted pages, all embedding Acme
    app.queries.deals().await.unwrap();
    app.queries.deals_page(&DealQuery::default()).await.unwrap();
    app.queries
        .deals_page(&DealQuery {
            sort: DealSort::Rating,
            ..DealQuery::default()
        })
        .await
        .unwrap();

    Harness {
        server,
        app,
        notifier,
    }
}

/// Cached catalog; nobody has rated anything yet.
async fn harness() -> Harness {
    let h = catalog_harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/user_ratings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;
    h
}

fn cached_copies(app: &OentexApp, company_id: Uuid) -> Vec<CompanyAggregate> {
    app.store
        .entries_embedding(company_id)
        .iter()
        .flat_map(|entry| {
            entry
                .refs_to(company_id)
                .map(|r| serde_json::from_value(entry.payload.pointer(&r.pointer).unwrap().clone()).unwrap())
                .collect::<Vec<CompanyAggregate>>()
        })
        .collect()
}

fn overall(company: &str, score: u8) -> RatingSubmission {
    RatingSubmission {
        user_id: Uuid::new_v4(),
        company_id: common::id(company),
        rating: Rating::overall(score).unwrap(),
    }
}

/// {4.0, 9} rated 5: ten reviews show at once, the server's 4.1 lands everywhere.
#[tokio::test]
async fn test_rating_reconciles_every_cached_copy() {
    let h = harness().await;
    let acme = common::id(common::ACME);
    assert_eq!(cached_copies(&h.app, acme).len(), 4);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"overall_rating": 4.1, "total_reviews": 10})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mutation = h.app.coordinator.begin(overall(common::ACME, 5)).await.unwrap();
    assert_eq!(mutation.provisional().unwrap().total_reviews, 10);
    assert!(cached_copies(&h.app, acme)
        .iter()
        .all(|c| c.total_reviews == 10));

    let aggregate = mutation.commit().await.unwrap();
    assert_eq!(
        aggregate,
        CompanyAggregate {
            overall_rating: 4.1,
            total_reviews: 10
        }
    );
    assert!(cached_copies(&h.app, acme).iter().all(|c| *c == aggregate));

    let page = h.app.queries.deals_page(&DealQuery::default()).await.unwrap();
    let card = page.items.iter().find(|c| c.deal.company_id == acme).unwrap();
    assert_eq!(
        card.company.as_ref().unwrap().rating_display().to_string(),
        "4.1 ★ (10 reviews)"
    );
    assert_eq!(
        h.notifier.messages(),
        vec![Notification::Success(
            oentex::services::coordinator::SUCCESS_MESSAGE.to_string()
        )]
    );
}

/// A failed write leaves every cached payload exactly as it was.
#[tokio::test]
async fn test_failed_rating_rolls_back() {
    let h = harness().await;
    let before: Vec<_> = h
        .app
        .store
        .keys()
        .into_iter()
        .map(|k| h.app.store.get(&k).unwrap().payload)
        .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .app
        .coordinator
        .submit(overall(common::ACME, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Connector(_)));

    let after: Vec<_> = h
        .app
        .store
        .keys()
        .into_iter()
        .map(|k| h.app.store.get(&k).unwrap().payload)
        .collect();
    assert_eq!(before, after);
    assert!(cached_copies(&h.app, common::id(common::ACME))
        .iter()
        .all(|c| c.overall_rating == 4.0 && c.total_reviews == 9));
    assert!(matches!(h.notifier.messages().as_slice(), [Notification::Error(_)]));
}

/// Two companies in flight at once: Acme's rollback does not disturb Nova.
#[tokio::test]
async fn test_independent_companies_share_list_entries() {
    let h = harness().await;
    let (acme, nova) = (common::id(common::ACME), common::id(common::NOVA));

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"overall_rating": 3.7, "total_reviews": 3}])),
        )
        .mount(&h.server)
        .await;

    let acme_pending = h.app.coordinator.begin(overall(common::ACME, 5)).await.unwrap();
    let nova_pending = h.app.coordinator.begin(overall(common::NOVA, 5)).await.unwrap();

    assert!(acme_pending.commit().await.is_err());
    let nova_final = nova_pending.commit().await.unwrap();

    assert!(cached_copies(&h.app, acme)
        .iter()
        .all(|c| c.overall_rating == 4.0 && c.total_reviews == 9));
    let nova_copies = cached_copies(&h.app, nova);
    assert_eq!(nova_copies.len(), 4);
    assert!(nova_copies.iter().all(|c| *c == nova_final));
}

/// After a rating the user's own entry is refetched on next read.
#[tokio::test]
async fn test_user_rating_entry_invalidated_after_submit() {
    let h = harness().await;
    let submission = overall(common::ACME, 4);
    let key = QueryKey::user_rating(submission.user_id, submission.company_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"overall_rating": 4.0, "total_reviews": 10})),
        )
        .mount(&h.server)
        .await;

    h.app
        .queries
        .user_rating(submission.user_id, submission.company_id)
        .await
        .unwrap();
    assert!(!h.app.store.get(&key).unwrap().invalidated);

    h.app.coordinator.submit(submission).await.unwrap();
    assert!(h.app.store.get(&key).unwrap().invalidated);
}

/// A second rating by the same user sends the stored row id and keeps the count.
#[tokio::test]
async fn test_second_rating_updates_existing_row() {
    let h = catalog_harness().await;
    let acme = common::id(common::ACME);
    let user_id = Uuid::new_v4();
    let rating_id = Uuid::new_v4();
    let rate = |score| RatingSubmission {
        user_id,
        company_id: acme,
        rating: Rating::overall(score).unwrap(),
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_ratings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/user_ratings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": rating_id,
            "user_id": user_id,
            "company_id": common::ACME,
            "overall_rating": 5.0,
            "created_at": "2024-05-04T10:00:00Z",
            "updated_at": "2024-05-04T10:00:00Z"
        }])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .and(body_partial_json(json!({"rating_id": null, "overall_rating": 5})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"overall_rating": 4.1, "total_reviews": 10})),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/submit_company_rating"))
        .and(body_partial_json(json!({"rating_id": rating_id, "overall_rating": 4})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"overall_rating": 4.0, "total_reviews": 10})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    h.app.coordinator.submit(rate(5)).await.unwrap();

    let second = h.app.coordinator.begin(rate(4)).await.unwrap();
    assert_eq!(second.existing_rating_id(), Some(rating_id));
    assert_eq!(
        second.provisional(),
        Some(CompanyAggregate {
            overall_rating: 4.0,
            total_reviews: 10
        })
    );

    let last = second.commit().await.unwrap();
    assert_eq!(last.total_reviews, 10);
    assert!(cached_copies(&h.app, acme).iter().all(|c| *c == last));
}
