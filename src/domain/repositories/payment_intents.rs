use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payment_intents::{InsertPaymentIntentEntity, PaymentIntentEntity};
use crate::domain::value_objects::enums::payment_intent_statuses::PaymentIntentStatus;

#[async_trait]
#[automock]
pub trait PaymentIntentRepository {
    async fn insert(&self, intent: InsertPaymentIntentEntity) -> Result<PaymentIntentEntity>;

    async fn find_by_id(&self, intent_id: &str) -> Result<Option<PaymentIntentEntity>>;

    /// Compare-and-swap on the current status. Returns false when the row's
    /// status no longer matches `from`, i.e. a concurrent transition won.
    async fn transition_status(
        &self,
        intent_id: &str,
        from: PaymentIntentStatus,
        to: PaymentIntentStatus,
    ) -> Result<bool>;

    async fn set_receipt_url(&self, intent_id: &str, receipt_url: &str) -> Result<()>;
}
