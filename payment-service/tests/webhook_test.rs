mod common;

use chrono::Utc;
use common::{
    STRIPE_WEBHOOK_SECRET, TestApp, TestAppOptions, initiate_mock_payment, no_redirect_client,
    signed_callback_url, stub_catalog_course, stub_catalog_fulfillment,
};
use service_core::utils::signature::sign_payload;
use wiremock::MockServer;

fn stripe_signature(body: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let signature =
        sign_payload(STRIPE_WEBHOOK_SECRET, &format!("{}.{}", timestamp, body)).unwrap();
    format!("t={},v1={}", timestamp, signature)
}

async fn post_webhook(app: &TestApp, body: &str, signature: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/payment/webhook", app.address))
        .header("Stripe-Signature", signature)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("Failed to post webhook")
}

async fn spawn_with_course() -> Option<(TestApp, MockServer, String)> {
    let catalog = MockServer::start().await;
    let course_id = uuid::Uuid::new_v4().to_string();
    stub_catalog_course(&catalog, &course_id, 1000.0).await;
    stub_catalog_fulfillment(&catalog).await;

    let app = TestApp::try_spawn(TestAppOptions {
        catalog_url: catalog.uri(),
        ..Default::default()
    })
    .await?;

    Some((app, catalog, course_id))
}

fn success_event(transaction_id: &str) -> String {
    serde_json::json!({
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_webhook_1",
            "metadata": { "transaction_id": transaction_id },
        }}
    })
    .to_string()
}

#[tokio::test]
async fn signed_success_webhook_completes_the_transaction() {
    let Some((app, _catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;
    let body = success_event(&transaction_id);

    let response = post_webhook(&app, &body, &stripe_signature(&body)).await;
    assert_eq!(response.status(), 200);

    let transaction = app.fetch_status(&transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "success");
    assert_eq!(transaction["gatewayTransactionId"], "pi_webhook_1");

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let Some((app, _catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;
    let body = success_event(&transaction_id);

    let response = post_webhook(&app, &body, "t=1,v1=deadbeef").await;
    assert_eq!(response.status(), 401);

    let transaction = app.fetch_status(&transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "pending");

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_without_signature_header_is_rejected() {
    let Some((app, _catalog, _course_id)) = spawn_with_course().await else {
        return;
    };

    let response = reqwest::Client::new()
        .post(format!("{}/api/payment/webhook", app.address))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    app.cleanup().await;
}

#[tokio::test]
async fn replayed_webhook_is_acknowledged_but_not_reapplied() {
    let Some((app, catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;
    let body = success_event(&transaction_id);

    assert_eq!(
        post_webhook(&app, &body, &stripe_signature(&body)).await.status(),
        200
    );
    assert_eq!(
        post_webhook(&app, &body, &stripe_signature(&body)).await.status(),
        200
    );

    let enrollments: Vec<_> = catalog
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/enrollments")
        .collect();
    assert_eq!(enrollments.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn failure_webhook_records_provider_diagnostics() {
    let Some((app, _catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;
    let body = serde_json::json!({
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": "pi_webhook_2",
            "metadata": { "transaction_id": transaction_id },
            "last_payment_error": {
                "code": "card_declined",
                "message": "Your card was declined.",
            },
        }}
    })
    .to_string();

    let response = post_webhook(&app, &body, &stripe_signature(&body)).await;
    assert_eq!(response.status(), 200);

    let transaction = app.fetch_status(&transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "failed");
    assert_eq!(transaction["errorCategory"], "card_declined");
    assert_eq!(transaction["errorMessage"], "Your card was declined.");

    app.cleanup().await;
}

#[tokio::test]
async fn refund_webhook_moves_success_to_refunded() {
    let Some((app, _catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;

    // Complete via signed callback first
    let url = signed_callback_url(&app, &transaction_id, "success", "MOCK1", "1180.00", None);
    no_redirect_client().get(&url).send().await.unwrap();

    let body = serde_json::json!({
        "type": "charge.refunded",
        "data": { "object": {
            "id": "re_1",
            "metadata": { "transaction_id": transaction_id },
            "amount_refunded": 118000,
        }}
    })
    .to_string();

    let response = post_webhook(&app, &body, &stripe_signature(&body)).await;
    assert_eq!(response.status(), 200);

    let transaction = app.fetch_status(&transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "refunded");
    assert_eq!(transaction["refund"]["refundId"], "re_1");
    assert_eq!(transaction["refund"]["amount"], 1180.0);

    app.cleanup().await;
}

#[tokio::test]
async fn refund_webhook_is_ignored_for_non_successful_transactions() {
    let Some((app, _catalog, course_id)) = spawn_with_course().await else {
        return;
    };

    let transaction_id = initiate_mock_payment(&app, "student_1", &course_id, None).await;

    let body = serde_json::json!({
        "type": "charge.refunded",
        "data": { "object": {
            "id": "re_2",
            "metadata": { "transaction_id": transaction_id },
            "amount_refunded": 118000,
        }}
    })
    .to_string();

    assert_eq!(
        post_webhook(&app, &body, &stripe_signature(&body)).await.status(),
        200
    );

    let transaction = app.fetch_status(&transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "pending");

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_for_unknown_transaction_is_acknowledged() {
    let Some((app, _catalog, _course_id)) = spawn_with_course().await else {
        return;
    };

    let body = success_event("txn_unknown");
    let response = post_webhook(&app, &body, &stripe_signature(&body)).await;
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}
