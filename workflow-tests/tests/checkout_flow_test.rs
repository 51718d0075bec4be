//! End-to-end checkout flows across catalog-service and payment-service.

mod common;

use common::{
    complete_via_mock_gateway, create_course, create_discount, fetch_transaction,
    initiate_payment,
};
use mongodb::bson::doc;
use service_core::utils::jwt::Role;
use workflow_tests::WorkflowTestContext;

#[tokio::test]
async fn discounted_purchase_completes_and_fulfills() {
    let Some(ctx) = WorkflowTestContext::try_spawn().await else {
        return;
    };

    let course_id = create_course(&ctx, 1000.0).await;
    create_discount(
        &ctx,
        serde_json::json!({
            "code": "LAUNCH10",
            "type": "percentage",
            "value": 10.0,
            "maxRedemptions": 5,
        }),
    )
    .await;

    // Initiation re-validates the code and prices the checkout server-side
    let initiation = initiate_payment(&ctx, "student_1", &course_id, Some("launch10")).await;
    let transaction_id = initiation["transactionId"].as_str().unwrap().to_string();
    assert!(initiation["clientSecret"].as_str().is_some());

    let transaction = fetch_transaction(&ctx, &transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "pending");
    assert_eq!(transaction["originalAmount"], 1000.0);
    assert_eq!(transaction["discountAmount"], 100.0);
    assert_eq!(transaction["gstAmount"], 162.0);
    assert_eq!(transaction["finalAmount"], 1062.0);

    // The mock gateway settles and redirects through the callback route
    complete_via_mock_gateway(&ctx, &transaction_id, "1062.00", "success").await;

    let transaction = fetch_transaction(&ctx, &transaction_id, "student_1").await;
    assert_eq!(transaction["status"], "success");
    let timeline = transaction["timeline"].as_array().unwrap();
    assert!(timeline.iter().all(|step| step["completed"] == true));

    // Fulfillment: the buyer is enrolled in catalog-service
    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/enrollments/user/student_1",
            ctx.catalog_address
        ))
        .bearer_auth(WorkflowTestContext::token_for("student_1", Role::Student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let enrollments: serde_json::Value = response.json().await.unwrap();
    let enrollments = enrollments.as_array().unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0]["courseId"].as_str().unwrap(), course_id);
    assert_eq!(
        enrollments[0]["transactionId"].as_str().unwrap(),
        transaction_id
    );

    // ...and the discount redemption was consumed exactly once
    let discount = ctx
        .catalog_db
        .collection::<mongodb::bson::Document>("discount_codes")
        .find_one(doc! { "code": "LAUNCH10" }, None)
        .await
        .unwrap()
        .expect("discount code missing");
    let redemption_count = discount
        .get("redemption_count")
        .and_then(|value| value.as_i64().or_else(|| value.as_i32().map(i64::from)))
        .unwrap_or(0);
    assert_eq!(redemption_count, 1);

    // Receipt is now downloadable as a PDF
    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/payment/receipt/{}",
            ctx.payment_address, transaction_id
        ))
        .bearer_auth(WorkflowTestContext::token_for("student_1", Role::Student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.bytes().await.unwrap().starts_with(b"%PDF"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn failed_purchase_keeps_diagnostics_and_grants_nothing() {
    let Some(ctx) = WorkflowTestContext::try_spawn().await else {
        return;
    };

    let course_id = create_course(&ctx, 500.0).await;
    let initiation = initiate_payment(&ctx, "student_2", &course_id, None).await;
    let transaction_id = initiation["transactionId"].as_str().unwrap().to_string();

    complete_via_mock_gateway(&ctx, &transaction_id, "590.00", "failure").await;

    let transaction = fetch_transaction(&ctx, &transaction_id, "student_2").await;
    assert_eq!(transaction["status"], "failed");
    assert_eq!(transaction["errorCategory"], "MOCK_ERROR_001");
    assert!(transaction["errorMessage"].as_str().is_some());

    // No enrollment was granted
    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/enrollments/user/student_2",
            ctx.catalog_address
        ))
        .bearer_auth(WorkflowTestContext::token_for("student_2", Role::Student))
        .send()
        .await
        .unwrap();
    let enrollments: serde_json::Value = response.json().await.unwrap();
    assert_eq!(enrollments.as_array().unwrap().len(), 0);

    // Receipt stays unavailable
    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/payment/receipt/{}",
            ctx.payment_address, transaction_id
        ))
        .bearer_auth(WorkflowTestContext::token_for("student_2", Role::Student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    ctx.cleanup().await;
}

#[tokio::test]
async fn scoped_discount_is_rejected_at_initiation_for_other_courses() {
    let Some(ctx) = WorkflowTestContext::try_spawn().await else {
        return;
    };

    let course_a = create_course(&ctx, 1000.0).await;
    let course_b = create_course(&ctx, 1000.0).await;
    create_discount(
        &ctx,
        serde_json::json!({
            "code": "ONLYB",
            "type": "flat",
            "value": 200.0,
            "scope": { "kind": "course", "value": course_b },
        }),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/payment/initiate", ctx.payment_address))
        .bearer_auth(WorkflowTestContext::token_for("student_3", Role::Student))
        .json(&serde_json::json!({ "courseId": course_a, "discountCode": "ONLYB" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Same code on the scoped course works
    let initiation = initiate_payment(&ctx, "student_3", &course_b, Some("ONLYB")).await;
    let transaction =
        fetch_transaction(&ctx, initiation["transactionId"].as_str().unwrap(), "student_3").await;
    assert_eq!(transaction["discountAmount"], 200.0);
    assert_eq!(transaction["finalAmount"], 944.0);

    ctx.cleanup().await;
}

#[tokio::test]
async fn repeat_purchase_collapses_onto_existing_enrollment() {
    let Some(ctx) = WorkflowTestContext::try_spawn().await else {
        return;
    };

    let course_id = create_course(&ctx, 100.0).await;

    // First purchase
    let initiation = initiate_payment(&ctx, "student_4", &course_id, None).await;
    let first_txn = initiation["transactionId"].as_str().unwrap().to_string();
    complete_via_mock_gateway(&ctx, &first_txn, "118.00", "success").await;

    // Second purchase of the same course settles but does not duplicate
    // the enrollment
    let initiation = initiate_payment(&ctx, "student_4", &course_id, None).await;
    let second_txn = initiation["transactionId"].as_str().unwrap().to_string();
    assert_ne!(first_txn, second_txn);
    complete_via_mock_gateway(&ctx, &second_txn, "118.00", "success").await;

    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/enrollments/user/student_4",
            ctx.catalog_address
        ))
        .bearer_auth(WorkflowTestContext::token_for("student_4", Role::Student))
        .send()
        .await
        .unwrap();
    let enrollments: serde_json::Value = response.json().await.unwrap();
    assert_eq!(enrollments.as_array().unwrap().len(), 1);

    ctx.cleanup().await;
}
