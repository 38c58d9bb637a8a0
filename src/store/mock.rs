use std::collections::HashMap;
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use rusoto_core::RusotoError;
use url::Url;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::listing::ListingImage;
use crate::store::Store;

/// An in-memory store for tests. Records uploads and deletions in call
/// order and can be told to fail the n-th upload, hang on the n-th
/// upload, or fail every deletion.
#[derive(Default)]
pub struct MockStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    uploaded: RwLock<Vec<String>>,
    deleted: RwLock<Vec<String>>,
    fail_upload_at: Option<usize>,
    hang_upload_at: Option<usize>,
    fail_deletes: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Fails the upload with the given zero-based index.
    pub fn failing_upload_at(index: usize) -> Self {
        MockStore {
            fail_upload_at: Some(index),
            ..Default::default()
        }
    }

    /// Never completes the upload with the given zero-based index.
    pub fn hanging_upload_at(index: usize) -> Self {
        MockStore {
            hang_upload_at: Some(index),
            ..Default::default()
        }
    }

    pub fn failing_deletes() -> Self {
        MockStore {
            fail_deletes: true,
            ..Default::default()
        }
    }

    /// The handles uploaded so far, in upload order.
    pub fn uploaded_handles(&self) -> Vec<String> {
        self.uploaded.read().unwrap().clone()
    }

    /// The handles deleted so far, in deletion order.
    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted.read().unwrap().clone()
    }

    /// The number of objects currently held.
    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn object(&self, handle: &str) -> Option<Vec<u8>> {
        self.objects.read().unwrap().get(handle).cloned()
    }
}

impl Store for MockStore {
    fn upload(
        &self,
        key: &Uuid,
        _content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<ListingImage, BackendError>> {
        mock_upload(self, *key, raw).boxed()
    }

    fn delete(&self, handle: &str) -> BoxFuture<Result<(), BackendError>> {
        mock_delete(self, handle.to_owned()).boxed()
    }
}

async fn mock_upload(
    store: &MockStore,
    key: Uuid,
    raw: Vec<u8>,
) -> Result<ListingImage, BackendError> {
    let index = store.uploaded.read().unwrap().len();

    if store.hang_upload_at == Some(index) {
        futures::future::pending::<()>().await;
    }

    if store.fail_upload_at == Some(index) {
        return Err(BackendError::UploadFailed {
            source: RusotoError::Validation("injected upload failure".to_owned()),
        });
    }

    let handle = key.to_string();
    let url = Url::parse(&format!("https://store.test/{}", handle)).expect("parse mock URL");

    store.objects.write().unwrap().insert(handle.clone(), raw);
    store.uploaded.write().unwrap().push(handle.clone());

    Ok(ListingImage { url, handle })
}

async fn mock_delete(store: &MockStore, handle: String) -> Result<(), BackendError> {
    if store.fail_deletes {
        return Err(BackendError::DeleteFailed {
            source: RusotoError::Validation("injected delete failure".to_owned()),
        });
    }

    store.objects.write().unwrap().remove(&handle);
    store.deleted.write().unwrap().push(handle);

    Ok(())
}
