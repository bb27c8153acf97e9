//! src/services/object_store.rs
//!
//! Read side of the object store. `ObjectSource` is the capability the
//! ingestion pipeline is handed; `FsObjectStore` serves it from the on-disk
//! layout `base_path/{bucket}/{shard}/{shard}/{key}`, with the declared
//! content type and user metadata kept in a JSON sidecar next to the payload.

use crate::models::{content::RawFileContent, notification::ObjectLocator};
use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("bucket `{0}` invalid")]
    InvalidBucketName(String),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("object metadata unreadable: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Payload plus the attributes declared when it was uploaded.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl StoredObject {
    pub fn into_content(self, file_name: impl Into<String>) -> RawFileContent {
        RawFileContent {
            body: self.body,
            content_type: self.content_type,
            file_name: file_name.into(),
            metadata: self.metadata,
        }
    }
}

/// Object-store read capability.
pub trait ObjectSource: Send + Sync {
    fn get_object<'a>(
        &'a self,
        locator: &'a ObjectLocator,
    ) -> BoxFuture<'a, ObjectStoreResult<StoredObject>>;
}

/// Sidecar written beside each payload.
#[derive(Serialize, Deserialize, Default, Debug)]
struct ObjectSidecar {
    content_type: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Clone, Debug)]
pub struct FsObjectStore {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Rejects keys that are empty, absolute, have a `.` or `..` path
    /// component, or carry control characters. Dots inside a name are fine.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.split('/').any(|seg| seg == ".." || seg == ".") {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        Ok(())
    }

    /// S3-style names only: 3-63 chars of lowercase letters, digits, `.` and `-`.
    fn ensure_bucket_name_safe(name: &str) -> ObjectStoreResult<()> {
        let len_ok = (BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&name.len());
        let chars_ok = name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'));
        let edges_ok = !name.starts_with(['.', '-']) && !name.ends_with(['.', '-']);
        if len_ok && chars_ok && edges_ok && !name.contains("..") {
            Ok(())
        } else {
            Err(ObjectStoreError::InvalidBucketName(name.to_string()))
        }
    }

    /// Two-level shard directories from MD5(bucket/key).
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, locator: &ObjectLocator) -> ObjectStoreResult<PathBuf> {
        Self::ensure_bucket_name_safe(&locator.bucket)?;
        Self::ensure_key_safe(&locator.key)?;
        let (shard_a, shard_b) = Self::object_shards(&locator.bucket, &locator.key);
        let mut path = self.base_path.clone();
        path.push(&locator.bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(&locator.key);
        Ok(path)
    }

    fn sidecar_path(payload: &Path) -> PathBuf {
        let mut raw = payload.as_os_str().to_os_string();
        raw.push(SIDECAR_SUFFIX);
        PathBuf::from(raw)
    }

    async fn read_object(&self, locator: &ObjectLocator) -> ObjectStoreResult<StoredObject> {
        let path = self.object_path(locator)?;
        let body = fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::ObjectNotFound {
                    bucket: locator.bucket.clone(),
                    key: locator.key.clone(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        })?;

        let sidecar = match fs::read(Self::sidecar_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<ObjectSidecar>(&raw)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no sidecar for {}", path.display());
                ObjectSidecar::default()
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        };

        Ok(StoredObject {
            body: Bytes::from(body),
            content_type: sidecar.content_type,
            metadata: sidecar.metadata,
        })
    }
}

impl ObjectSource for FsObjectStore {
    fn get_object<'a>(
        &'a self,
        locator: &'a ObjectLocator,
    ) -> BoxFuture<'a, ObjectStoreResult<StoredObject>> {
        self.read_object(locator).boxed()
    }
}

/// Write side, used to seed fixtures. Production objects arrive through an
/// external uploader that shares this layout.
#[cfg(test)]
impl FsObjectStore {
    /// Store a payload and its sidecar, replacing any previous version.
    ///
    /// Both files are written to a temp name, synced, then renamed into place.
    pub(crate) async fn put_object(
        &self,
        locator: &ObjectLocator,
        body: &[u8],
        content_type: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> ObjectStoreResult<PathBuf> {
        let path = self.object_path(locator)?;
        let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let sidecar = serde_json::to_vec(&ObjectSidecar {
            content_type,
            metadata,
        })?;
        write_atomic(&parent, &path, body).await?;
        write_atomic(&parent, &Self::sidecar_path(&path), &sidecar).await?;
        debug!("stored {}/{} at {}", locator.bucket, locator.key, path.display());
        Ok(path)
    }
}

#[cfg(test)]
async fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> ObjectStoreResult<()> {
    use tokio::{fs::File, io::AsyncWriteExt};

    let tmp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    let result = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, dest).await
    }
    .await;

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(ObjectStoreError::Io(err));
    }
    Ok(())
}
