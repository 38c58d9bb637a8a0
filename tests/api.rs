use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::{Filter, Reply};

use roomboard::auth::Identity;
use roomboard::db::mock::{MockDb, MockSessions};
use roomboard::environment::{Config, Environment};
use roomboard::routes;
use roomboard::store::mock::MockStore;
use roomboard::urls::Urls;

const BOUNDARY: &str = "thisisaboundary1234";
const ALICE_TOKEN: &str = "alice-token";
const BOB_TOKEN: &str = "bob-token";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreationResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorResponse {
    id: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ListingResponse {
    id: String,
    owner: String,
    room_type: String,
    category: String,
    gender: String,
    city: String,
    state: String,
    rent: f64,
    description: String,
    images: Vec<ImageResponse>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DetailResponse {
    id: String,
    owner: String,
    room_type: String,
    category: String,
    gender: String,
    city: String,
    state: String,
    rent: f64,
    description: String,
    images: Vec<ImageResponse>,
    created_at: i64,
    updated_at: i64,
    reviews: Vec<ReviewResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageResponse {
    url: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ReviewResponse {
    id: String,
    listing_id: String,
    reviewer: String,
    rating: i16,
    body: String,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CommentResponse {
    id: String,
    listing_id: String,
    author: String,
    body: String,
    created_at: i64,
}

struct TestHarness {
    db: Arc<MockDb>,
    store: Arc<MockStore>,
    environment: Environment,
}

fn harness_with_store(store: MockStore) -> TestHarness {
    let logger = Arc::new(slog::Logger::root(slog::Discard, slog::o!()));
    let db = Arc::new(MockDb::new());
    let store = Arc::new(store);
    let sessions = Arc::new(MockSessions::new(vec![
        (ALICE_TOKEN.to_owned(), Identity::new("alice@example.com")),
        (BOB_TOKEN.to_owned(), Identity::new("bob@example.com")),
    ]));
    let urls = Arc::new(Urls::new("https://api.example.com/", "listings"));
    let config = Config::new(Duration::from_secs(5));

    let environment = Environment::new(
        logger,
        db.clone(),
        sessions,
        store.clone(),
        urls,
        config,
    );

    TestHarness {
        db,
        store,
        environment,
    }
}

fn harness() -> TestHarness {
    harness_with_store(MockStore::new())
}

fn api(
    environment: Environment,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let logger = environment.logger.clone();

    routes::make_list_route(environment.clone())
        .or(routes::make_create_route(environment.clone()))
        .or(routes::make_comment_route(environment.clone()))
        .or(routes::make_retrieve_route(environment.clone()))
        .or(routes::make_update_route(environment.clone()))
        .or(routes::make_delete_route(environment))
        .recover(move |r| routes::format_rejection(logger.clone(), r))
}

fn valid_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("roomType", "2bhk"),
        ("category", "private"),
        ("gender", "any"),
        ("city", "Boston"),
        ("state", "Massachusetts"),
        ("rent", "1200"),
        ("description", "Near campus"),
    ]
}

fn make_multipart_body(boundary: &str, fields: &[(&str, &str)], images: &[&[u8]]) -> Vec<u8> {
    let mut body = vec![];
    let boundary_line = format!("--{}\r\n", boundary);

    for (name, value) in fields {
        body.extend_from_slice(boundary_line.as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    for image in images {
        body.extend_from_slice(boundary_line.as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"images\"; filename=\"room.jpg\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    body
}

fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}

async fn create_listing(
    harness: &TestHarness,
    token: &str,
    fields: &[(&str, &str)],
    images: &[&[u8]],
) -> warp::http::Response<bytes::Bytes> {
    let api = api(harness.environment.clone());

    warp::test::request()
        .method("POST")
        .path("/listings")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", multipart_content_type(BOUNDARY))
        .body(make_multipart_body(BOUNDARY, fields, images))
        .reply(&api)
        .await
}

#[tokio::test]
async fn creating_a_listing_works() {
    let harness = harness();

    let response = create_listing(
        &harness,
        ALICE_TOKEN,
        &valid_fields(),
        &[b"first image", b"second image"],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let location = response
        .headers()
        .get("location")
        .expect("location header")
        .to_str()
        .expect("location header as string");
    assert_eq!(
        location,
        format!("https://api.example.com/listings/{}", created.id)
    );

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let detail: DetailResponse =
        serde_json::from_slice(response.body()).expect("parse detail response");

    assert_eq!(detail.id, created.id);
    assert_eq!(detail.owner, "alice@example.com");
    assert_eq!(detail.room_type, "2bhk");
    assert_eq!(detail.category, "private");
    assert_eq!(detail.gender, "any");
    assert_eq!(detail.city, "boston");
    assert_eq!(detail.state, "Massachusetts");
    assert!((detail.rent - 1200.0).abs() < f64::EPSILON);
    assert_eq!(detail.description, "Near campus");
    assert!(detail.reviews.is_empty());
    assert!(detail.created_at > 0);
    assert!(detail.updated_at >= detail.created_at);

    // uploads happen in submission order and end up in the store
    assert_eq!(detail.images.len(), 2);
    let handles = harness.store.uploaded_handles();
    assert_eq!(
        detail.images.iter().map(|i| i.handle.clone()).collect::<Vec<_>>(),
        handles
    );
    assert_eq!(harness.store.object(&handles[0]).unwrap(), b"first image");
    assert_eq!(harness.store.object(&handles[1]).unwrap(), b"second image");

    for image in &detail.images {
        assert!(image.url.contains(&image.handle));
    }

    let response = warp::test::request()
        .method("GET")
        .path("/listings")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let listings: Vec<ListingResponse> =
        serde_json::from_slice(response.body()).expect("parse listings response");
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id, created.id);
}

#[tokio::test]
async fn creating_requires_a_session() {
    let harness = harness();
    let api = api(harness.environment.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/listings")
        .header("content-type", multipart_content_type(BOUNDARY))
        .body(make_multipart_body(BOUNDARY, &valid_fields(), &[b"image"]))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.db.listing_count(), 0);
    assert!(harness.store.uploaded_handles().is_empty());
}

#[tokio::test]
async fn unknown_session_tokens_are_rejected() {
    let harness = harness();

    let response =
        create_listing(&harness, "expired-token", &valid_fields(), &[b"image"]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.db.listing_count(), 0);
}

#[tokio::test]
async fn out_of_set_choices_fail_before_any_upload() {
    let harness = harness();

    let mut fields = valid_fields();
    fields[0] = ("roomType", "4bhk");

    let response = create_listing(&harness, ALICE_TOKEN, &fields, &[b"image"]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(response.body()).expect("parse error");
    assert!(error.message.contains("roomType"));

    // validation runs before the store is ever touched
    assert!(harness.store.uploaded_handles().is_empty());
    assert_eq!(harness.db.listing_count(), 0);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let harness = harness();

    let fields = valid_fields()
        .into_iter()
        .filter(|(name, _)| *name != "city")
        .collect::<Vec<_>>();

    let response = create_listing(&harness, ALICE_TOKEN, &fields, &[b"image"]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(response.body()).expect("parse error");
    assert!(error.message.contains("city"));
}

#[tokio::test]
async fn markup_is_stripped_before_validation() {
    let harness = harness();

    let mut fields = valid_fields();
    fields[6] = ("description", "<script>alert(1)</script>Sunny <b>room</b>");

    let response = create_listing(&harness, ALICE_TOKEN, &fields, &[b"image"]).await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;

    let detail: DetailResponse =
        serde_json::from_slice(response.body()).expect("parse detail response");
    assert_eq!(detail.description, "Sunny room");
}

#[tokio::test]
async fn listings_without_images_are_rejected() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(response.body()).expect("parse error");
    assert!(error.message.contains("images"));
    assert_eq!(harness.db.listing_count(), 0);
}

#[tokio::test]
async fn a_failed_upload_rolls_back_the_earlier_ones() {
    let harness = harness_with_store(MockStore::failing_upload_at(1));

    let response = create_listing(
        &harness,
        ALICE_TOKEN,
        &valid_fields(),
        &[b"first", b"second", b"third"],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let uploaded = harness.store.uploaded_handles();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(harness.store.deleted_handles(), uploaded);
    assert_eq!(harness.store.object_count(), 0);
    assert_eq!(harness.db.listing_count(), 0);
}

#[tokio::test]
async fn a_failed_insert_releases_the_uploaded_images() {
    let harness = harness();
    harness.db.fail_next_write();

    let response =
        create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"first", b"second"]).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let uploaded = harness.store.uploaded_handles();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(harness.store.deleted_handles(), uploaded);
    assert_eq!(harness.store.object_count(), 0);
    assert_eq!(harness.db.listing_count(), 0);
}

#[tokio::test]
async fn only_the_owner_can_update() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", BOB_TOKEN))
        .json(&serde_json::json!({ "city": "Cambridge" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(response.body()).expect("parse error");
    assert_eq!(error.id, Some(created.id.clone()));
    assert!(error.message.contains("owner"));

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;
    let detail: DetailResponse =
        serde_json::from_slice(response.body()).expect("parse detail response");
    assert_eq!(detail.city, "boston");
}

#[tokio::test]
async fn the_owner_can_update_a_subset_of_fields() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", ALICE_TOKEN))
        .json(&serde_json::json!({ "city": "Cambridge", "rent": "1500" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let updated: ListingResponse =
        serde_json::from_slice(response.body()).expect("parse updated listing");
    assert_eq!(updated.city, "cambridge");
    assert!((updated.rent - 1500.0).abs() < f64::EPSILON);

    // untouched fields keep their stored values
    assert_eq!(updated.room_type, "2bhk");
    assert_eq!(updated.state, "Massachusetts");
    assert_eq!(updated.owner, "alice@example.com");
    assert!(updated.updated_at >= updated.created_at);
}

#[tokio::test]
async fn updates_obey_the_same_rules_as_creations() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", ALICE_TOKEN))
        .json(&serde_json::json!({ "state": "Narnia" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(response.body()).expect("parse error");
    assert!(error.message.contains("state"));
}

#[tokio::test]
async fn updates_cannot_reassign_the_owner() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", ALICE_TOKEN))
        .json(&serde_json::json!({ "owner": "bob@example.com" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;
    let detail: DetailResponse =
        serde_json::from_slice(response.body()).expect("parse detail response");
    assert_eq!(detail.owner, "alice@example.com");
}

#[tokio::test]
async fn only_the_owner_can_delete() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("DELETE")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", BOB_TOKEN))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.db.listing_count(), 1);
    assert!(harness.store.deleted_handles().is_empty());
}

#[tokio::test]
async fn deleting_releases_the_images_and_removes_the_record() {
    let harness = harness();

    let response =
        create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"first", b"second"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("DELETE")
        .path(&format!("/listings/{}", created.id))
        .header("authorization", format!("Bearer {}", ALICE_TOKEN))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(harness.store.deleted_handles(), harness.store.uploaded_handles());
    assert_eq!(harness.store.object_count(), 0);
    assert_eq!(harness.db.listing_count(), 0);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retrieving_an_unknown_listing_is_not_found() {
    let harness = harness();
    let api = api(harness.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", uuid::Uuid::new_v4()))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = warp::test::request()
        .method("GET")
        .path("/listings/not-a-uuid")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commenting_works() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/listings/{}/comments", created.id))
        .header("authorization", format!("Bearer {}", BOB_TOKEN))
        .json(&serde_json::json!({ "comment": "Is the <b>room</b> still free?" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let comment: CommentResponse =
        serde_json::from_slice(response.body()).expect("parse comment response");
    assert_eq!(comment.listing_id, created.id);
    assert_eq!(comment.author, "bob@example.com");
    assert_eq!(comment.body, "Is the room still free?");
    assert!(comment.created_at > 0);
    assert_eq!(harness.db.comment_count(), 1);
}

#[tokio::test]
async fn empty_comments_are_rejected() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/listings/{}/comments", created.id))
        .header("authorization", format!("Bearer {}", BOB_TOKEN))
        .json(&serde_json::json!({ "comment": "   " }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.db.comment_count(), 0);
}

#[tokio::test]
async fn commenting_on_an_unknown_listing_is_not_found() {
    let harness = harness();
    let api = api(harness.environment.clone());

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/listings/{}/comments", uuid::Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", BOB_TOKEN))
        .json(&serde_json::json!({ "comment": "hello" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_show_up_in_the_detail_view() {
    let harness = harness();

    let response = create_listing(&harness, ALICE_TOKEN, &valid_fields(), &[b"image"]).await;
    let created: CreationResponse =
        serde_json::from_slice(response.body()).expect("parse creation response");
    let id = uuid::Uuid::parse_str(&created.id).expect("parse created ID");

    harness.db.add_review(&id, "carol@example.com", 4);

    let api = api(harness.environment.clone());
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/listings/{}", created.id))
        .reply(&api)
        .await;

    let detail: DetailResponse =
        serde_json::from_slice(response.body()).expect("parse detail response");
    assert_eq!(detail.reviews.len(), 1);
    assert_eq!(detail.reviews[0].reviewer, "carol@example.com");
    assert_eq!(detail.reviews[0].rating, 4);
}

#[tokio::test]
async fn healthz_reports_the_version() {
    let harness = harness();
    let route = routes::admin::make_healthz_route(harness.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path("/healthz")
        .reply(&route)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value =
        serde_json::from_slice(response.body()).expect("parse healthz response");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
