use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use thiserror::Error;
use uuid::Uuid;
use warp::reject;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A listing field failed one of the validation rules.
    #[error("{message}")]
    InvalidField { message: String },

    /// A mutating request arrived without a session.
    #[error("you need to log in")]
    AuthenticationRequired,

    /// The session identity does not own the listing it tried to mutate.
    #[error("you are not the owner of listing {id}")]
    OwnershipViolation { id: Uuid },

    /// Represents an ID that could not be parsed.
    #[error("invalid ID: {0}")]
    InvalidId(String),

    /// Represents an ID that does not resolve to a listing.
    #[error("listing {0} does not exist")]
    NonExistentId(Uuid),

    /// A multipart submission could not be parsed.
    #[error("malformed form submission")]
    MalformedFormSubmission,

    /// A creation request carried no image files.
    #[error("no images attached")]
    NoImagesProvided,

    /// A creation request carried more image files than allowed.
    #[error("too many images attached (limit is {limit})")]
    TooManyImages { limit: usize },

    /// The asset store rejected an upload.
    #[error("failed to upload image to store")]
    UploadFailed {
        source: RusotoError<PutObjectError>,
    },

    /// The asset store rejected a deletion.
    #[error("failed to delete image from store")]
    DeleteFailed {
        source: RusotoError<DeleteObjectError>,
    },

    /// A call to the asset store exceeded the configured timeout.
    #[error("store call timed out")]
    StoreTimeout,

    /// Some image handles could not be released from the store.
    #[error("failed to release image handles: {handles:?}")]
    ReleaseFailed { handles: Vec<String> },

    /// Represents an error generating the public URL for an object.
    #[error("failed to generate URL")]
    FailedToGenerateUrl { source: url::ParseError },

    /// Represents an SQL error.
    #[error("database error")]
    Sqlx { source: sqlx::Error },
}

impl BackendError {
    pub fn invalid_field(message: impl Into<String>) -> Self {
        BackendError::InvalidField {
            message: message.into(),
        }
    }
}

impl reject::Reject for BackendError {}
