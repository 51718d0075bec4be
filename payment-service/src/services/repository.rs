use anyhow::Result;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, doc},
};
use uuid::Uuid;

use crate::models::{RefundDetails, Transaction, TransactionStatus};

#[derive(Clone)]
pub struct PaymentRepository {
    transaction_collection: Collection<Transaction>,
}

impl PaymentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            transaction_collection: db.collection("transactions"),
        }
    }

    pub async fn init_indexes(&self) -> Result<()> {
        // (user_id, course_id, status) backs the idempotent-initiation lookup
        let user_course_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "course_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_course_status_idx".to_string())
                    .build(),
            )
            .build();

        // (status, updated_at) backs the reconciliation sweep
        let stale_index = IndexModel::builder()
            .keys(doc! { "status": 1, "updated_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_updated_idx".to_string())
                    .build(),
            )
            .build();

        let provider_ref_index = IndexModel::builder()
            .keys(doc! { "provider_ref": 1 })
            .options(
                IndexOptions::builder()
                    .name("provider_ref_idx".to_string())
                    .build(),
            )
            .build();

        self.transaction_collection
            .create_indexes([user_course_index, stale_index, provider_ref_index], None)
            .await?;

        tracing::info!("Payment service indexes initialized");
        Ok(())
    }

    pub async fn create_transaction(&self, transaction: Transaction) -> Result<()> {
        self.transaction_collection
            .insert_one(transaction, None)
            .await?;
        Ok(())
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let filter = doc! { "_id": id };
        let transaction = self.transaction_collection.find_one(filter, None).await?;
        Ok(transaction)
    }

    pub async fn find_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Transaction>> {
        let filter = doc! { "provider_ref": provider_ref };
        let transaction = self.transaction_collection.find_one(filter, None).await?;
        Ok(transaction)
    }

    /// An open transaction for the same buyer and course, if one exists.
    pub async fn find_pending_for_user_course(
        &self,
        user_id: &str,
        course_id: Uuid,
    ) -> Result<Option<Transaction>> {
        let filter = doc! {
            "user_id": user_id,
            "course_id": course_id.to_string(),
            "status": "pending",
        };
        let transaction = self.transaction_collection.find_one(filter, None).await?;
        Ok(transaction)
    }

    /// Move a pending transaction to processing. Returns false when the
    /// transaction already left the pending state.
    pub async fn mark_processing(&self, id: &str) -> Result<bool> {
        let now = DateTime::now();
        let filter = doc! { "_id": id, "status": "pending" };
        let update = doc! {
            "$set": {
                "status": "processing",
                "callback_received_at": now,
                "updated_at": now,
            }
        };
        let result = self
            .transaction_collection
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Terminal success transition. The filter restricts the update to the
    /// legal prior states, so replayed callbacks and late webhooks can never
    /// regress or re-complete a finished transaction.
    pub async fn record_success(&self, id: &str, gateway_transaction_id: &str) -> Result<bool> {
        let now = DateTime::now();
        let filter = doc! { "_id": id, "status": { "$in": ["pending", "processing"] } };
        let update = doc! {
            "$set": {
                "status": "success",
                "gateway_transaction_id": gateway_transaction_id,
                "callback_received_at": now,
                "completed_at": now,
                "updated_at": now,
            }
        };
        let result = self
            .transaction_collection
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Terminal failure transition, preserving the gateway's diagnostics.
    pub async fn record_failure(
        &self,
        id: &str,
        gateway_transaction_id: Option<&str>,
        error_category: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let now = DateTime::now();
        let filter = doc! { "_id": id, "status": { "$in": ["pending", "processing"] } };
        let mut fields = doc! {
            "status": "failed",
            "callback_received_at": now,
            "completed_at": now,
            "updated_at": now,
        };
        if let Some(gateway_transaction_id) = gateway_transaction_id {
            fields.insert("gateway_transaction_id", gateway_transaction_id);
        }
        if let Some(error_category) = error_category {
            fields.insert("error_category", error_category);
        }
        if let Some(error_message) = error_message {
            fields.insert("error_message", error_message);
        }

        let result = self
            .transaction_collection
            .update_one(filter, doc! { "$set": fields }, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Administrative refund transition; only a successful transaction can
    /// be refunded.
    pub async fn record_refund(&self, id: &str, refund: &RefundDetails) -> Result<bool> {
        let now = DateTime::now();
        let filter = doc! { "_id": id, "status": "success" };
        let update = doc! {
            "$set": {
                "status": "refunded",
                "refund": mongodb::bson::to_bson(refund)?,
                "updated_at": now,
            }
        };
        let result = self
            .transaction_collection
            .update_one(filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    pub async fn list_transactions(
        &self,
        status_filter: Option<TransactionStatus>,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<Transaction>, i64)> {
        let mut filter = doc! {};
        if let Some(status) = status_filter {
            filter.insert("status", status.as_str());
        }

        let total_count = self
            .transaction_collection
            .count_documents(filter.clone(), None)
            .await? as i64;

        let options = FindOptions::builder()
            .sort(doc! { "initiated_at": -1 })
            .skip(offset)
            .limit(limit)
            .build();

        let cursor = self
            .transaction_collection
            .find(filter, Some(options))
            .await?;
        let transactions: Vec<Transaction> = cursor.try_collect().await?;

        Ok((transactions, total_count))
    }

    /// Non-terminal transactions that have not moved since `cutoff`;
    /// candidates for the reconciliation sweep.
    pub async fn find_stale_nonterminal(&self, cutoff: DateTime) -> Result<Vec<Transaction>> {
        let filter = doc! {
            "status": { "$in": ["pending", "processing"] },
            "updated_at": { "$lt": cutoff },
        };
        let cursor = self.transaction_collection.find(filter, None).await?;
        let transactions: Vec<Transaction> = cursor.try_collect().await?;
        Ok(transactions)
    }
}
