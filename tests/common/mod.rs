#![allow(dead_code)]

use oentex::connectors::{BackendClient, BackendConfig};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-anon-key";

pub const ACME: &str = "11111111-1111-4111-8111-111111111111";
pub const NOVA: &str = "22222222-2222-4222-8222-222222222222";

pub struct TestBackend {
    pub server: MockServer,
    pub client: BackendClient,
}

pub async fn spawn_backend() -> TestBackend {
    let server = MockServer::start().await;
    let client = BackendClient::new(backend_config(&server.uri()))
        .expect("Failed to build backend client");

    TestBackend { server, client }
}

pub fn backend_config(base_url: &str) -> BackendConfig {
    BackendConfig {
        base_url: base_url.to_string(),
        api_key: Some(API_KEY.to_string()),
        timeout_secs: 5,
        retry_attempts: 3,
        ..Default::default()
    }
}

pub fn id(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap()
}

pub fn company_json(id: &str, name: &str, overall_rating: f64, total_reviews: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "logo_url": null,
        "category": "banking",
        "overall_rating": overall_rating,
        "total_reviews": total_reviews
    })
}

pub fn deal_json(deal_id: Uuid, company_id: &str, title: &str, created_at: &str) -> Value {
    json!({
        "id": deal_id,
        "company_id": company_id,
        "title": title,
        "description": null,
        "value": "$100 bonus",
        "terms": ["New customers only"],
        "affiliate_link": format!("https://partner.example/{}", deal_id),
        "is_active": true,
        "clicks": 3,
        "commission_rate": 0.1,
        "created_at": created_at
    })
}

/// Deal row with its company embedded under `company`, as the catalog
/// select returns it.
pub fn with_company(mut deal: Value, company: Value) -> Value {
    deal["company"] = company;
    deal
}

/// Catalog holding one Acme deal, one Nova deal and one deal whose company
/// row is missing.
pub async fn mount_catalog(server: &MockServer, acme: (f64, u32), nova: (f64, u32)) {
    let orphan_company = Uuid::new_v4().to_string();
    Mock::given(method("GET"))
        .and(path("/rest/v1/deals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            with_company(
                deal_json(Uuid::new_v4(), ACME, "Checking bonus", "2024-05-03T10:00:00Z"),
                company_json(ACME, "Acme Bank", acme.0, acme.1),
            ),
            with_company(
                deal_json(Uuid::new_v4(), NOVA, "Fee rebate", "2024-05-02T10:00:00Z"),
                company_json(NOVA, "Nova Exchange", nova.0, nova.1),
            ),
            with_company(
                deal_json(Uuid::new_v4(), &orphan_company, "Mystery offer", "2024-05-01T10:00:00Z"),
                Value::Null,
            ),
        ])))
        .mount(server)
        .await;
}
