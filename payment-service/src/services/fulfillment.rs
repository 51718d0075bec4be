//! Post-success side effects.
//!
//! Once a transaction reaches `success`, the buyer is enrolled and any
//! applied discount is redeemed. Failures here are logged and left to the
//! reconciliation sweep; they are never surfaced to the redirecting browser.

use crate::AppState;
use crate::models::Transaction;
use crate::services::metrics::record_transaction;

pub async fn fulfill_success(state: &AppState, transaction: &Transaction) {
    record_transaction("success");

    if let Err(e) = state
        .catalog
        .create_enrollment(&transaction.user_id, transaction.course_id, &transaction.id)
        .await
    {
        tracing::error!(
            transaction_id = %transaction.id,
            user_id = %transaction.user_id,
            error = %e,
            "Enrollment creation failed after successful payment"
        );
    }

    if let Some(code) = &transaction.discount_code {
        if let Err(e) = state
            .catalog
            .redeem_discount(code, transaction.course_id)
            .await
        {
            tracing::error!(
                transaction_id = %transaction.id,
                code = %code,
                error = %e,
                "Discount redemption failed after successful payment"
            );
        }
    }
}
