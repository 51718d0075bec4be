mod common;

use common::{TestApp, seed_course};
use service_core::utils::jwt::Role;

async fn create_discount(app: &TestApp, body: serde_json::Value) -> reqwest::Response {
    let client = reqwest::Client::new();
    let token = TestApp::token_for("partner_1", Role::Partner);

    client
        .post(format!("{}/api/discount", app.address))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to create discount")
}

async fn validate(app: &TestApp, code: &str, course_id: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/discount/validate", app.address))
        .json(&serde_json::json!({ "code": code, "courseId": course_id }))
        .send()
        .await
        .expect("Failed to validate discount")
}

#[tokio::test]
async fn validate_known_percentage_code() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    let response = create_discount(
        &app,
        serde_json::json!({ "code": "WELCOME10", "type": "percentage", "value": 10.0 }),
    )
    .await;
    assert_eq!(response.status(), 201);

    let response = validate(&app, "welcome10", &course_id).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["type"], "percentage");
    assert_eq!(body["value"], 10.0);

    app.cleanup().await;
}

#[tokio::test]
async fn validation_is_idempotent() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    create_discount(
        &app,
        serde_json::json!({ "code": "FLAT200", "type": "flat", "value": 200.0 }),
    )
    .await;

    let first: serde_json::Value = validate(&app, "FLAT200", &course_id)
        .await
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = validate(&app, "FLAT200", &course_id)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(first, second);

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_code_returns_not_found() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    let response = validate(&app, "NOSUCHCODE", &course_id).await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn inactive_code_returns_not_found() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    create_discount(
        &app,
        serde_json::json!({ "code": "RETIRED", "type": "flat", "value": 50.0, "active": false }),
    )
    .await;

    let response = validate(&app, "RETIRED", &course_id).await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn code_scoped_to_other_course_is_rejected() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;
    let other_course_id = seed_course(&app, 500.0, None).await;

    create_discount(
        &app,
        serde_json::json!({
            "code": "ONLYHERE",
            "type": "percentage",
            "value": 15.0,
            "scope": { "kind": "course", "value": other_course_id },
        }),
    )
    .await;

    let response = validate(&app, "ONLYHERE", &course_id).await;
    assert_eq!(response.status(), 400);

    let response = validate(&app, "ONLYHERE", &other_course_id).await;
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
async fn partner_scoped_code_applies_to_partner_courses_only() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let partner_course = seed_course(&app, 800.0, Some("partner_7")).await;
    let plain_course = seed_course(&app, 800.0, None).await;

    create_discount(
        &app,
        serde_json::json!({
            "code": "PARTNER20",
            "type": "percentage",
            "value": 20.0,
            "scope": { "kind": "partner", "value": "partner_7" },
        }),
    )
    .await;

    assert_eq!(validate(&app, "PARTNER20", &partner_course).await.status(), 200);
    assert_eq!(validate(&app, "PARTNER20", &plain_course).await.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn duplicate_code_creation_conflicts() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };

    let body = serde_json::json!({ "code": "ONCE", "type": "flat", "value": 10.0 });
    assert_eq!(create_discount(&app, body.clone()).await.status(), 201);
    assert_eq!(create_discount(&app, body).await.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn single_use_code_admits_exactly_one_winner() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    create_discount(
        &app,
        serde_json::json!({
            "code": "SINGLEUSE",
            "type": "flat",
            "value": 100.0,
            "maxRedemptions": 1,
        }),
    )
    .await;

    let client = reqwest::Client::new();
    let token = TestApp::token_for("payment-service", Role::Finance);

    // Two concurrent redemptions of a single-use code
    let redeem = |client: reqwest::Client, token: String, address: String, course_id: String| async move {
        client
            .post(format!("{}/api/discount/redeem", address))
            .bearer_auth(token)
            .json(&serde_json::json!({ "code": "SINGLEUSE", "courseId": course_id }))
            .send()
            .await
            .unwrap()
            .status()
    };

    let (first, second) = tokio::join!(
        redeem(
            client.clone(),
            token.clone(),
            app.address.clone(),
            course_id.clone()
        ),
        redeem(client.clone(), token.clone(), app.address.clone(), course_id)
    );

    let statuses = [first.as_u16(), second.as_u16()];
    assert!(
        statuses.contains(&200),
        "one redemption should win: {statuses:?}"
    );
    assert!(
        statuses.contains(&409) || statuses.contains(&404),
        "the other redemption should lose: {statuses:?}"
    );

    app.cleanup().await;
}

#[tokio::test]
async fn redeem_requires_service_role() {
    let Some(app) = TestApp::try_spawn().await else {
        return;
    };
    let course_id = seed_course(&app, 1000.0, None).await;

    create_discount(
        &app,
        serde_json::json!({ "code": "NOSTUDENTS", "type": "flat", "value": 10.0 }),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/discount/redeem", app.address))
        .bearer_auth(TestApp::token_for("student_1", Role::Student))
        .json(&serde_json::json!({ "code": "NOSTUDENTS", "courseId": course_id }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);

    app.cleanup().await;
}
