#![allow(dead_code)]

use service_core::utils::jwt::Role;
use workflow_tests::WorkflowTestContext;

/// Create a course in catalog-service, returning its id.
pub async fn create_course(ctx: &WorkflowTestContext, price: f64) -> String {
    let response = reqwest::Client::new()
        .post(format!("{}/api/courses", ctx.catalog_address))
        .bearer_auth(WorkflowTestContext::token_for("uni_1", Role::University))
        .json(&serde_json::json!({
            "title": "Operating Systems from Scratch",
            "description": "Schedulers, allocators, and file systems",
            "category": "programming",
            "price": price,
            "published": true,
        }))
        .send()
        .await
        .expect("Failed to create course");

    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Create a discount code in catalog-service.
pub async fn create_discount(ctx: &WorkflowTestContext, body: serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/discount", ctx.catalog_address))
        .bearer_auth(WorkflowTestContext::token_for("admin_1", Role::Admin))
        .json(&body)
        .send()
        .await
        .expect("Failed to create discount");
    assert_eq!(response.status(), 201);
}

/// Initiate a payment, returning the initiation response body.
pub async fn initiate_payment(
    ctx: &WorkflowTestContext,
    user_id: &str,
    course_id: &str,
    discount_code: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({ "courseId": course_id, "mode": "elements" });
    if let Some(code) = discount_code {
        body["discountCode"] = serde_json::json!(code);
    }

    let response = reqwest::Client::new()
        .post(format!("{}/api/payment/initiate", ctx.payment_address))
        .bearer_auth(WorkflowTestContext::token_for(user_id, Role::Student))
        .json(&body)
        .send()
        .await
        .expect("Failed to initiate payment");

    assert_eq!(response.status(), 201, "initiation failed");
    response.json().await.unwrap()
}

/// Drive the mock gateway simulator for a transaction and follow its
/// callback redirect, completing the round trip a real browser would make.
pub async fn complete_via_mock_gateway(
    ctx: &WorkflowTestContext,
    transaction_id: &str,
    amount: &str,
    outcome: &str,
) {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let callback_url = format!("{}/api/payment/callback", ctx.payment_address);
    let query = serde_urlencoded::to_string([
        ("transactionId", transaction_id),
        ("amount", amount),
        ("callbackUrl", callback_url.as_str()),
        ("outcome", outcome),
    ])
    .unwrap();

    let response = client
        .get(format!(
            "{}/mock-gateway/simulate?{}",
            ctx.payment_address, query
        ))
        .send()
        .await
        .expect("Failed to reach mock gateway simulator");
    assert_eq!(response.status(), 303);

    let location = response.headers()["location"].to_str().unwrap().to_string();
    let callback_response = client
        .get(&location)
        .send()
        .await
        .expect("Failed to follow callback redirect");
    assert_eq!(callback_response.status(), 303);
}

/// Fetch the transaction view from the status endpoint.
pub async fn fetch_transaction(
    ctx: &WorkflowTestContext,
    transaction_id: &str,
    user_id: &str,
) -> serde_json::Value {
    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/payment/status/{}",
            ctx.payment_address, transaction_id
        ))
        .bearer_auth(WorkflowTestContext::token_for(user_id, Role::Student))
        .send()
        .await
        .expect("Failed to fetch status");
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    body["transaction"].clone()
}
