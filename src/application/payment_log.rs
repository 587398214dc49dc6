use crate::domain::payment::PaymentRecord;
use crate::domain::ports::KeyValueStoreBox;
use crate::error::Result;
use tracing::{debug, warn};

/// The append-only list of payment records, kept as one JSON array under a
/// fixed key.
///
/// Reads are forgiving: a missing key or a payload that no longer decodes
/// reads as an empty log.
pub struct PaymentLog {
    store: KeyValueStoreBox,
    key: String,
}

impl PaymentLog {
    pub fn new(store: KeyValueStoreBox, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn all(&self) -> Result<Vec<PaymentRecord>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(key = %self.key, "Discarding unreadable payment log: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn append(&self, record: PaymentRecord) -> Result<()> {
        let mut records = self.all().await?;
        debug!(order_id = %record.order_id, existing = records.len(), "Appending payment record");
        records.push(record);
        let payload = serde_json::to_string(&records)?;
        self.store.set(&self.key, payload).await
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentRecord>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|r| r.order_id == order_id))
    }
}
