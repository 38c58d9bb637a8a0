use std::sync::Arc;

use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::BackendError;
use crate::log::{error, Logger};

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form data size to accept. This should be enforced by
/// the HTTP gateway, so on the Rust side it’s set to an unreasonably
/// large number.
const MAX_CONTENT_LENGTH: u64 = 2 * 1024 * 1024 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status_code_for(e), "message" => %r.error);
        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status_code_for(e)));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        InvalidField { .. }
        | AuthenticationRequired
        | OwnershipViolation { .. }
        | InvalidId { .. }
        | MalformedFormSubmission
        | NoImagesProvided
        | TooManyImages { .. } => StatusCode::BAD_REQUEST,
        NonExistentId { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::body::json as json_body;
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete as del, get as g, path as p, path::param as par, post, put, reject};

    use super::{handlers, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;
    use crate::listing::UpdateFields;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let r = environment.urls.listings_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_list_route => list, rt; end(), g());
    route!(make_create_route => create, rt; end(), post(), session(), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_retrieve_route => retrieve, rt; par::<String>(), end(), g());
    route!(make_update_route => update, rt; par::<String>(), end(), put(), session(), json_body::<UpdateFields>());
    route!(make_delete_route => delete, rt; par::<String>(), end(), del(), session());
    route!(make_comment_route => comment, rt; par::<String>(), p("comments"), end(), post(), session(), json_body::<handlers::CommentSubmission>());

    /// Extracts the raw authorization header, if any. Resolving it to
    /// an identity happens in the handlers.
    fn session() -> impl Filter<Extract = (Option<String>,), Error = reject::Rejection> + Clone {
        warp::header::optional::<String>("authorization")
    }
}
