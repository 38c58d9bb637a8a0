use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::listing::ListingImage;
use crate::log::{error, trace, Logger};
use crate::store::Store;

/// The most images a single listing may carry.
pub const MAX_IMAGES: usize = 10;

/// A file attached to a submission, ready for upload.
#[derive(Clone, Debug)]
pub struct ImageFile {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Uploads a batch of files to the store, in order. The result list
/// corresponds index-for-index to the input. If any upload fails, every
/// already-uploaded object is deleted again before the error propagates,
/// so a rejected submission never leaves orphans behind.
pub async fn upload_batch(
    logger: &Logger,
    store: &Arc<dyn Store>,
    timeout: Duration,
    files: Vec<ImageFile>,
) -> Result<Vec<ListingImage>, BackendError> {
    if files.is_empty() {
        return Err(BackendError::NoImagesProvided);
    }

    if files.len() > MAX_IMAGES {
        return Err(BackendError::TooManyImages { limit: MAX_IMAGES });
    }

    let mut uploaded: Vec<ListingImage> = Vec::with_capacity(files.len());

    for file in files {
        let key = Uuid::new_v4();
        let result = bounded(timeout, store.upload(&key, file.content_type, file.data)).await;

        match result {
            Ok(image) => {
                trace!(logger, "Uploaded image"; "handle" => &image.handle);
                uploaded.push(image);
            }
            Err(e) => {
                let handles = uploaded
                    .iter()
                    .map(|image| image.handle.clone())
                    .collect::<Vec<_>>();

                if let Err(release_error) = release_batch(logger, store, timeout, &handles).await {
                    error!(logger, "Failed to roll back partial upload"; "error" => format!("{}", release_error));
                }

                return Err(e);
            }
        }
    }

    Ok(uploaded)
}

/// Deletes a set of handles from the store. Keeps going past individual
/// failures and reports the handles that could not be released.
pub async fn release_batch(
    logger: &Logger,
    store: &Arc<dyn Store>,
    timeout: Duration,
    handles: &[String],
) -> Result<(), BackendError> {
    let mut failed = vec![];

    for handle in handles {
        match bounded(timeout, store.delete(handle)).await {
            Ok(()) => trace!(logger, "Released image"; "handle" => handle.as_str()),
            Err(e) => {
                error!(logger, "Failed to release image"; "handle" => handle.as_str(), "error" => format!("{}", e));
                failed.push(handle.clone());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(BackendError::ReleaseFailed { handles: failed })
    }
}

async fn bounded<T>(
    timeout: Duration,
    future: BoxFuture<'_, Result<T, BackendError>>,
) -> Result<T, BackendError> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| BackendError::StoreTimeout)?
}
