//! Mock gateway simulator.
//!
//! A standalone page that stands in for the real provider's hosted checkout
//! in non-production environments. It shows the transaction summary with
//! "Simulate Success" / "Simulate Failure" actions; simulation fabricates a
//! gateway transaction id, signs the callback payload, and performs a full
//! browser redirect to the callback URL. These routes are only mounted when
//! the mock gateway is enabled, and config validation refuses that in
//! production.

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::utils::signature::sign_payload;
use std::str::FromStr;

use crate::AppState;

pub const MOCK_FAILURE_CODE: &str = "MOCK_ERROR_001";
const MOCK_FAILURE_MESSAGE: &str = "Mock gateway simulated a payment failure";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPageParams {
    pub transaction_id: String,
    pub amount: String,
    pub callback_url: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub merchant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateParams {
    pub transaction_id: String,
    pub amount: String,
    pub callback_url: String,
    pub outcome: String,
}

pub async fn gateway_page(
    State(_state): State<AppState>,
    Query(params): Query<GatewayPageParams>,
) -> Result<Html<String>, AppError> {
    let simulate_query = |outcome: &str| {
        serde_urlencoded::to_string([
            ("transactionId", params.transaction_id.as_str()),
            ("amount", params.amount.as_str()),
            ("callbackUrl", params.callback_url.as_str()),
            ("outcome", outcome),
        ])
        .unwrap_or_default()
    };

    let customer = params.customer_name.as_deref().unwrap_or("-");
    let email = params.customer_email.as_deref().unwrap_or("-");
    let phone = params.customer_phone.as_deref().unwrap_or("-");
    let merchant = params.merchant_id.as_deref().unwrap_or("MOCK_MERCHANT");

    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Mock Payment Gateway</title>
  <style>
    body {{ font-family: sans-serif; max-width: 480px; margin: 48px auto; }}
    .card {{ border: 1px solid #ccc; border-radius: 8px; padding: 24px; }}
    .warn {{ color: #a15c00; font-size: 0.85em; }}
    table {{ width: 100%; margin: 16px 0; }}
    td:first-child {{ color: #666; }}
    a.btn {{ display: inline-block; padding: 10px 18px; border-radius: 6px;
             text-decoration: none; color: white; margin-right: 12px; }}
    .ok {{ background: #1a7f37; }}
    .fail {{ background: #b42318; }}
  </style>
</head>
<body>
  <div class="card">
    <h2>Mock Payment Gateway</h2>
    <p class="warn">Development simulator &mdash; no real money moves here.</p>
    <table>
      <tr><td>Transaction</td><td>{transaction_id}</td></tr>
      <tr><td>Amount</td><td>{amount}</td></tr>
      <tr><td>Merchant</td><td>{merchant}</td></tr>
      <tr><td>Customer</td><td>{customer}</td></tr>
      <tr><td>Email</td><td>{email}</td></tr>
      <tr><td>Phone</td><td>{phone}</td></tr>
    </table>
    <a class="btn ok" href="/mock-gateway/simulate?{success_query}">Simulate Success</a>
    <a class="btn fail" href="/mock-gateway/simulate?{failure_query}">Simulate Failure</a>
  </div>
</body>
</html>"#,
        transaction_id = params.transaction_id,
        amount = params.amount,
        merchant = merchant,
        customer = customer,
        email = email,
        phone = phone,
        success_query = simulate_query("success"),
        failure_query = simulate_query("failure"),
    );

    Ok(Html(page))
}

/// Fabricate a signed gateway callback and redirect the browser to it.
pub async fn simulate(
    State(state): State<AppState>,
    Query(params): Query<SimulateParams>,
) -> Result<Redirect, AppError> {
    let amount = Decimal::from_str(&params.amount)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid amount")))?;
    let amount = format!("{:.2}", amount);

    // Artificial settlement delay, as a real gateway would have.
    tokio::time::sleep(tokio::time::Duration::from_millis(
        state.config.mock_gateway.delay_ms,
    ))
    .await;

    let status = match params.outcome.as_str() {
        "success" => "success",
        _ => "failed",
    };
    let gateway_transaction_id = format!("MOCK{}", DateTime::now().timestamp_millis());

    let payload = format!(
        "{}|{}|{}|{}",
        params.transaction_id, status, gateway_transaction_id, amount
    );
    let signature = sign_payload(
        state.config.mock_gateway.callback_secret.expose_secret(),
        &payload,
    )
    .map_err(AppError::InternalError)?;

    let mut query = vec![
        ("transactionId", params.transaction_id.clone()),
        ("status", status.to_string()),
        ("gatewayTransactionId", gateway_transaction_id),
        ("amount", amount),
        ("signature", signature),
    ];
    if status == "failed" {
        query.push(("errorCode", MOCK_FAILURE_CODE.to_string()));
        query.push(("errorMessage", MOCK_FAILURE_MESSAGE.to_string()));
    }

    let encoded = serde_urlencoded::to_string(&query)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
    let join = if params.callback_url.contains('?') {
        '&'
    } else {
        '?'
    };

    let callback = format!("{}{}{}", params.callback_url, join, encoded);

    tracing::info!(
        transaction_id = %params.transaction_id,
        outcome = %status,
        "Mock gateway issuing callback"
    );

    Ok(Redirect::to(&callback))
}
