use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use uuid::Uuid;
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::auth::{authorize, require_login, Identity, Sessions};
use crate::db::Db;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::images::{release_batch, upload_batch};
use crate::io::parse_submission;
use crate::listing::{Listing, ListingImage, UpdateFields};
use crate::log::{debug, error, Logger};
use crate::routes::{
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::sanitize::{sanitize, sanitize_fields};
use crate::store::Store;
use crate::validation::{validate, ValidatedFields};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

/// The body of a comment submission.
#[derive(Debug, Deserialize)]
pub struct CommentSubmission {
    pub comment: String,
}

pub async fn list(environment: Environment) -> RouteResult {
    timed! {
        let listings = environment
            .db
            .get_all()
            .await
            .map_err(|e: BackendError| Rejection::new(Context::list(), e))?;

        json(&listings)
    }
}

pub async fn create(
    environment: Environment,
    session: Option<String>,
    content: FormData,
) -> RouteResult {
    timed! {
        let Environment {
            logger,
            db,
            sessions,
            store,
            urls,
            config,
        } = environment.clone();

        let error_handler = |e: BackendError| Rejection::new(Context::create(), e);

        let owner = current_identity(sessions, session)
            .await
            .map_err(error_handler)?;

        debug!(logger, "Parsing submission...");
        let submission = parse_submission(content).await.map_err(error_handler)?;

        debug!(logger, "Validating fields...");
        let fields = validate(&sanitize_fields(submission.fields)).map_err(error_handler)?;

        debug!(logger, "Uploading images..."; "count" => submission.images.len());
        let images = upload_batch(&logger, &store, config.store_timeout, submission.images)
            .await
            .map_err(error_handler)?;

        debug!(logger, "Writing listing to database...");
        let listing = persist_listing(
            logger.clone(),
            db,
            store,
            config.store_timeout,
            &owner,
            &fields,
            images,
        )
        .await
        .map_err(error_handler)?;

        let id = *listing.id();

        with_header(
            with_status(
                json(&SuccessResponse::Created {
                    id: format!("{}", id),
                }),
                StatusCode::CREATED,
            ),
            "location",
            urls.listing(&id).as_str(),
        )
    }
}

pub async fn retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::retrieve(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving listing..."; "id" => format!("{}", &id));

        let option = environment.db.get_by_id(&id).await.map_err(error_handler)?;

        match option {
            Some(listing) => {
                let reviews = environment
                    .db
                    .reviews_for_listing(&id)
                    .await
                    .map_err(error_handler)?;

                with_status(
                    json(&SuccessResponse::Detail {
                        listing: &listing,
                        reviews,
                    }),
                    StatusCode::OK,
                )
            }
            None => with_status(json(&()), StatusCode::NOT_FOUND),
        }
    }
}

pub async fn update(
    environment: Environment,
    id: String,
    session: Option<String>,
    fields: UpdateFields,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::update(id.clone()), e);

        let Environment {
            logger,
            db,
            sessions,
            ..
        } = environment.clone();

        let identity = current_identity(sessions, session)
            .await
            .map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;

        debug!(logger, "Updating listing..."; "id" => format!("{}", &id));

        let listing = db
            .get_by_id(&id)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NonExistentId(id))
            .map_err(error_handler)?;

        authorize(&identity, listing.owner(), &id).map_err(error_handler)?;

        // overlay the changes on the stored record and re-validate the
        // whole, so a partial update obeys the same rules as a creation
        let mut merged = listing.to_field_map();
        sanitize_update(fields).merge_into(&mut merged);
        let validated = validate(&merged).map_err(error_handler)?;

        let updated = db.update(&id, &validated).await.map_err(error_handler)?;

        json(&updated)
    }
}

pub async fn delete(environment: Environment, id: String, session: Option<String>) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::delete(id.clone()), e);

        let Environment {
            logger,
            db,
            sessions,
            store,
            config,
            ..
        } = environment.clone();

        let identity = current_identity(sessions, session)
            .await
            .map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;

        debug!(logger, "Deleting listing..."; "id" => format!("{}", &id));

        let listing = db
            .get_by_id(&id)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NonExistentId(id))
            .map_err(error_handler)?;

        authorize(&identity, listing.owner(), &id).map_err(error_handler)?;

        let handles = listing
            .images()
            .iter()
            .map(|image| image.handle.clone())
            .collect::<Vec<_>>();

        release_batch(&logger, &store, config.store_timeout, &handles)
            .await
            .map_err(error_handler)?;

        db.remove(&id).await.map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn comment(
    environment: Environment,
    id: String,
    session: Option<String>,
    submission: CommentSubmission,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::comment(id.clone()), e);

        let Environment {
            logger,
            db,
            sessions,
            ..
        } = environment.clone();

        let author = current_identity(sessions, session)
            .await
            .map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;

        let body = non_empty_comment(&submission.comment).map_err(error_handler)?;

        let _listing = db
            .get_by_id(&id)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NonExistentId(id))
            .map_err(error_handler)?;

        debug!(logger, "Creating comment..."; "listing_id" => format!("{}", &id));

        let comment = db
            .create_comment(&id, &author, &body)
            .await
            .map_err(error_handler)?;

        with_status(json(&comment), StatusCode::CREATED)
    }
}

/// Resolves the bearer token in the authorization header to an
/// identity. Every mutation goes through here before doing anything
/// else.
async fn current_identity(
    sessions: Arc<dyn Sessions>,
    header: Option<String>,
) -> Result<Identity, BackendError> {
    let header = header.ok_or(BackendError::AuthenticationRequired)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(BackendError::AuthenticationRequired)?;
    let identity = sessions.lookup(token).await?;

    require_login(identity)
}

/// Writes the listing row. If the insert fails, the freshly uploaded
/// images are released again so the store holds no orphans.
async fn persist_listing(
    logger: Arc<Logger>,
    db: Arc<dyn Db + Send + Sync>,
    store: Arc<dyn Store>,
    timeout: Duration,
    owner: &Identity,
    fields: &ValidatedFields,
    images: Vec<ListingImage>,
) -> Result<Listing, BackendError> {
    match db.create(owner, fields, &images).await {
        Ok(listing) => Ok(listing),
        Err(e) => {
            let handles = images
                .iter()
                .map(|image| image.handle.clone())
                .collect::<Vec<_>>();

            if let Err(release_error) = release_batch(&logger, &store, timeout, &handles).await {
                error!(logger, "Failed to release images after database error"; "error" => format!("{}", release_error));
            }

            Err(e)
        }
    }
}

fn sanitize_update(fields: UpdateFields) -> UpdateFields {
    UpdateFields {
        room_type: fields.room_type.as_deref().map(sanitize),
        category: fields.category.as_deref().map(sanitize),
        gender: fields.gender.as_deref().map(sanitize),
        city: fields.city.as_deref().map(sanitize),
        state: fields.state.as_deref().map(sanitize),
        rent: fields.rent.as_deref().map(sanitize),
        description: fields.description.as_deref().map(sanitize),
    }
}

fn non_empty_comment(raw: &str) -> Result<String, BackendError> {
    let body = sanitize(raw).trim().to_owned();

    if body.is_empty() {
        Err(BackendError::invalid_field("comment must not be empty"))
    } else {
        Ok(body)
    }
}

fn parse_id(raw: &str) -> Result<Uuid, BackendError> {
    Uuid::parse_str(raw).map_err(|_| BackendError::InvalidId(raw.to_owned()))
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
