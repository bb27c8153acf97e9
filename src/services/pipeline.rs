//! src/services/pipeline.rs
//!
//! Drives a notification batch through fetch -> extract -> persist, one
//! record at a time and in order. Per-record outcomes are collected into a
//! `BatchReport`; the invoking framework only reads `succeeded()` to decide
//! whether to redeliver.

use crate::{
    extract::build_record,
    models::notification::{KeyDecodeError, NotificationBatch, NotificationRecord, ObjectLocator},
    services::{
        catalog_store::{CatalogError, CatalogStore},
        object_store::{ObjectSource, ObjectStoreError},
    },
};
use chrono::Utc;
use serde::Serialize;
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::{error, info, warn};

/// What to do with the rest of a batch once one record fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure; later records are not attempted.
    #[default]
    Abort,
    /// Attempt every record and report each outcome.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "unknown failure policy `{}` (expected `abort` or `continue`)",
                other
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    KeyDecode(#[from] KeyDecodeError),
    #[error("failed to retrieve {bucket}/{key}: {source}")]
    Retrieval {
        bucket: String,
        key: String,
        #[source]
        source: ObjectStoreError,
    },
    #[error("failed to persist record `{file_id}`: {source}")]
    Persist {
        file_id: String,
        #[source]
        source: CatalogError,
    },
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::KeyDecode(_) => FailureKind::KeyDecode,
            IngestError::Retrieval { .. } => FailureKind::Retrieval,
            IngestError::Persist { .. } => FailureKind::Persist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    KeyDecode,
    Retrieval,
    Persist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Persisted { file_id: String },
    Failed { kind: FailureKind, error: String },
    NotAttempted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub index: usize,
    pub bucket: String,
    /// Key as delivered, before decoding.
    pub key: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Processing(usize),
    Completed,
    FailedBatch,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => f.write_str("idle"),
            BatchState::Processing(i) => write!(f, "processing({})", i),
            BatchState::Completed => f.write_str("completed"),
            BatchState::FailedBatch => f.write_str("failed_batch"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub state: BatchState,
    pub policy: FailurePolicy,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    /// Aggregate signal: false means the batch should be redelivered.
    pub fn succeeded(&self) -> bool {
        self.state == BatchState::Completed
    }

    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Persisted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Sequential batch processor over injected store capabilities.
#[derive(Clone)]
pub struct IngestionPipeline {
    objects: Arc<dyn ObjectSource>,
    catalog: Arc<dyn CatalogStore>,
    policy: FailurePolicy,
}

impl IngestionPipeline {
    pub fn new(
        objects: Arc<dyn ObjectSource>,
        catalog: Arc<dyn CatalogStore>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            objects,
            catalog,
            policy,
        }
    }

    /// Process every record in order and report per-record outcomes.
    ///
    /// Records persisted before a failure stay persisted.
    pub async fn process_batch(&self, batch: &NotificationBatch) -> BatchReport {
        let mut state = BatchState::Idle;
        let mut records = Vec::with_capacity(batch.records.len());
        let mut any_failed = false;

        info!(
            "[{}] received batch of {} record(s), {:?} policy",
            state,
            batch.records.len(),
            self.policy
        );

        for (index, record) in batch.records.iter().enumerate() {
            let entity = &record.entity;
            let outcome = if any_failed && self.policy == FailurePolicy::Abort {
                RecordOutcome::NotAttempted
            } else {
                state = BatchState::Processing(index);
                info!(
                    "[{}] s3://{}/{}",
                    state, entity.bucket.name, entity.object.key
                );
                match self.process_record(record).await {
                    Ok(file_id) => {
                        info!("Stored catalog record for file {}", file_id);
                        RecordOutcome::Persisted { file_id }
                    }
                    Err(err) => {
                        error!("Record {} failed: {}", index, err);
                        any_failed = true;
                        RecordOutcome::Failed {
                            kind: err.kind(),
                            error: err.to_string(),
                        }
                    }
                }
            };

            records.push(RecordReport {
                index,
                bucket: entity.bucket.name.clone(),
                key: entity.object.key.clone(),
                outcome,
            });
        }

        state = if any_failed {
            BatchState::FailedBatch
        } else {
            BatchState::Completed
        };

        let report = BatchReport {
            state,
            policy: self.policy,
            records,
        };
        if report.succeeded() {
            info!("Batch completed: {} record(s) persisted", report.persisted());
        } else {
            warn!(
                "Batch failed: {} persisted, {} failed, {} not attempted",
                report.persisted(),
                report.failed(),
                report.records.len() - report.persisted() - report.failed()
            );
        }
        report
    }

    /// Fetch, extract, and upsert one record. Returns the stored file id.
    pub async fn process_record(&self, record: &NotificationRecord) -> Result<String, IngestError> {
        let locator = ObjectLocator::from_notification(record)?;

        let stored = self
            .objects
            .get_object(&locator)
            .await
            .map_err(|source| IngestError::Retrieval {
                bucket: locator.bucket.clone(),
                key: locator.key.clone(),
                source,
            })?;

        let content = stored.into_content(locator.file_name());
        let catalog_record = build_record(&locator, &content, Utc::now());

        self.catalog
            .upsert(&catalog_record)
            .await
            .map_err(|source| IngestError::Persist {
                file_id: catalog_record.file_id.clone(),
                source,
            })?;

        Ok(catalog_record.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::png::tests::synthetic_png;
    use crate::models::{
        notification::{BucketRef, ObjectRef, StorageEntity},
        record::CatalogRecord,
    };
    use crate::services::{
        catalog_store::{CatalogResult, tests::memory_store},
        object_store::{ObjectStoreResult, StoredObject},
    };
    use bytes::Bytes;
    use futures::{FutureExt, future::BoxFuture};
    use std::{
        collections::{BTreeMap, HashMap, HashSet},
        sync::Mutex,
    };

    #[derive(Default)]
    struct MemoryObjects {
        objects: HashMap<ObjectLocator, StoredObject>,
    }

    impl MemoryObjects {
        fn with(mut self, bucket: &str, key: &str, content_type: &str, body: &[u8]) -> Self {
            self.objects.insert(
                ObjectLocator::new(bucket, key),
                StoredObject {
                    body: Bytes::copy_from_slice(body),
                    content_type: Some(content_type.to_string()),
                    metadata: BTreeMap::new(),
                },
            );
            self
        }
    }

    impl ObjectSource for MemoryObjects {
        fn get_object<'a>(
            &'a self,
            locator: &'a ObjectLocator,
        ) -> BoxFuture<'a, ObjectStoreResult<StoredObject>> {
            let found = self.objects.get(locator).cloned().ok_or_else(|| {
                ObjectStoreError::ObjectNotFound {
                    bucket: locator.bucket.clone(),
                    key: locator.key.clone(),
                }
            });
            async move { found }.boxed()
        }
    }

    #[derive(Default)]
    struct RecordingCatalog {
        writes: Mutex<Vec<CatalogRecord>>,
        reject: HashSet<String>,
    }

    impl CatalogStore for RecordingCatalog {
        fn upsert<'a>(&'a self, record: &'a CatalogRecord) -> BoxFuture<'a, CatalogResult<()>> {
            let result = if self.reject.contains(&record.file_id) {
                Err(CatalogError::Sqlx(sqlx::Error::PoolTimedOut))
            } else {
                self.writes.lock().unwrap().push(record.clone());
                Ok(())
            };
            async move { result }.boxed()
        }

        fn get<'a>(
            &'a self,
            file_id: &'a str,
        ) -> BoxFuture<'a, CatalogResult<Option<CatalogRecord>>> {
            let found = self
                .writes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| r.file_id == file_id)
                .cloned();
            async move { Ok(found) }.boxed()
        }
    }

    fn notification(bucket: &str, key: &str) -> NotificationRecord {
        NotificationRecord {
            entity: StorageEntity {
                bucket: BucketRef {
                    name: bucket.into(),
                },
                object: ObjectRef {
                    key: key.into(),
                    size: None,
                },
            },
        }
    }

    fn batch(keys: &[&str]) -> NotificationBatch {
        NotificationBatch {
            records: keys.iter().map(|k| notification("uploads", k)).collect(),
        }
    }

    fn pipeline(
        objects: MemoryObjects,
        catalog: Arc<RecordingCatalog>,
        policy: FailurePolicy,
    ) -> IngestionPipeline {
        IngestionPipeline::new(Arc::new(objects), catalog, policy)
    }

    #[tokio::test]
    async fn all_records_persisted_completes() {
        let objects = MemoryObjects::default()
            .with("uploads", "a.txt", "text/plain", b"one two three")
            .with("uploads", "b.png", "image/png", &synthetic_png(4, 2));
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(objects, catalog.clone(), FailurePolicy::Abort)
            .process_batch(&batch(&["a.txt", "b.png"]))
            .await;

        assert!(report.succeeded());
        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.persisted(), 2);

        let writes = catalog.writes.lock().unwrap();
        assert_eq!(writes[0].file_id, "a");
        assert_eq!(writes[0].attributes.word_count, Some(3));
        assert_eq!(writes[1].file_id, "b");
        assert!(writes[1].attributes.image_dimensions.is_some());
    }

    #[tokio::test]
    async fn second_fetch_failure_fails_batch_after_first_write() {
        let objects = MemoryObjects::default().with("uploads", "a.txt", "text/plain", b"hi");
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(objects, catalog.clone(), FailurePolicy::Abort)
            .process_batch(&batch(&["a.txt", "missing.pdf"]))
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.state, BatchState::FailedBatch);
        assert_eq!(
            report.records[0].outcome,
            RecordOutcome::Persisted {
                file_id: "a".into()
            }
        );
        assert!(matches!(
            report.records[1].outcome,
            RecordOutcome::Failed {
                kind: FailureKind::Retrieval,
                ..
            }
        ));
        // the first write is not rolled back
        assert_eq!(catalog.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abort_policy_skips_records_after_failure() {
        let objects = MemoryObjects::default().with("uploads", "c.txt", "text/plain", b"x");
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(objects, catalog.clone(), FailurePolicy::Abort)
            .process_batch(&batch(&["missing.txt", "c.txt"]))
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.records[1].outcome, RecordOutcome::NotAttempted);
        assert!(catalog.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn continue_policy_attempts_every_record() {
        let objects = MemoryObjects::default().with("uploads", "c.txt", "text/plain", b"x");
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(objects, catalog.clone(), FailurePolicy::Continue)
            .process_batch(&batch(&["missing.txt", "c.txt"]))
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.failed(), 1);
        assert_eq!(report.persisted(), 1);
        assert_eq!(catalog.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persist_failure_is_reported() {
        let objects = MemoryObjects::default().with("uploads", "d.txt", "text/plain", b"x");
        let catalog = Arc::new(RecordingCatalog {
            reject: HashSet::from(["d".to_string()]),
            ..Default::default()
        });
        let report = pipeline(objects, catalog, FailurePolicy::Abort)
            .process_batch(&batch(&["d.txt"]))
            .await;

        assert!(!report.succeeded());
        assert!(matches!(
            report.records[0].outcome,
            RecordOutcome::Failed {
                kind: FailureKind::Persist,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn undecodable_key_fails_the_record() {
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(MemoryObjects::default(), catalog, FailurePolicy::Abort)
            .process_batch(&batch(&["bad%FF.txt"]))
            .await;

        assert!(matches!(
            report.records[0].outcome,
            RecordOutcome::Failed {
                kind: FailureKind::KeyDecode,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn encoded_key_is_decoded_before_fetch() {
        let objects =
            MemoryObjects::default().with("uploads", "dir/my report.txt", "text/plain", b"a b");
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(objects, catalog.clone(), FailurePolicy::Abort)
            .process_batch(&batch(&["dir/my+report.txt"]))
            .await;

        assert!(report.succeeded());
        let writes = catalog.writes.lock().unwrap();
        assert_eq!(writes[0].file_id, "my report");
        assert_eq!(writes[0].s3_object_key, "dir/my report.txt");
    }

    #[tokio::test]
    async fn empty_batch_completes() {
        let catalog = Arc::new(RecordingCatalog::default());
        let report = pipeline(MemoryObjects::default(), catalog, FailurePolicy::Abort)
            .process_batch(&NotificationBatch::default())
            .await;
        assert!(report.succeeded());
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn redelivery_overwrites_with_equal_record() {
        let objects = MemoryObjects::default().with(
            "uploads",
            "9b2e.pdf",
            "application/pdf",
            b"%PDF-1.4\n%%EOF\n%%EOF",
        );
        let catalog = Arc::new(RecordingCatalog::default());
        let pipeline = pipeline(objects, catalog.clone(), FailurePolicy::Abort);
        let event = batch(&["9b2e.pdf"]);

        assert!(pipeline.process_batch(&event).await.succeeded());
        assert!(pipeline.process_batch(&event).await.succeeded());

        let writes = catalog.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        let mut second = writes[1].clone();
        assert_eq!(second.file_id, writes[0].file_id);
        second.extracted_at = writes[0].extracted_at;
        assert_eq!(second, writes[0]);
        assert_eq!(second.attributes.number_of_pages, Some(2));
    }

    #[tokio::test]
    async fn redelivery_keeps_a_single_sqlite_row() {
        let objects = MemoryObjects::default().with("uploads", "77.txt", "text/plain", b"w");
        let store = Arc::new(memory_store().await);
        let pipeline = IngestionPipeline::new(
            Arc::new(objects),
            store.clone(),
            FailurePolicy::Abort,
        );
        let event = batch(&["77.txt"]);

        pipeline.process_batch(&event).await;
        pipeline.process_batch(&event).await;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_records")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let stored = store.get("77").await.unwrap().unwrap();
        assert_eq!(stored.attributes.text_content_length, Some(1));
    }
}
