use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{Identity, Sessions};
use crate::db::Db;
use crate::errors::BackendError;
use crate::listing::{Comment, Listing, ListingImage, Review, Times};
use crate::validation::ValidatedFields;

/// An in-memory database for tests. Listings keep insertion order; the
/// next write can be told to fail to exercise persistence error paths.
#[derive(Default)]
pub struct MockDb {
    listings: RwLock<Vec<Listing>>,
    comments: RwLock<Vec<Comment>>,
    reviews: RwLock<Vec<Review>>,
    fail_next_write: AtomicBool,
}

impl MockDb {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes the next mutating call fail with a database error.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn listing_count(&self) -> usize {
        self.listings.read().unwrap().len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.read().unwrap().len()
    }

    pub fn add_review(&self, listing_id: &Uuid, reviewer: impl Into<String>, rating: i16) {
        self.reviews.write().unwrap().push(Review {
            id: Uuid::new_v4(),
            listing_id: *listing_id,
            reviewer: reviewer.into(),
            rating,
            body: "review body".to_owned(),
            created_at: OffsetDateTime::now_utc(),
        });
    }

    fn take_injected_failure(&self) -> Result<(), BackendError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            Err(BackendError::Sqlx {
                source: sqlx::Error::PoolClosed,
            })
        } else {
            Ok(())
        }
    }
}

impl Db for MockDb {
    fn get_all(&self) -> BoxFuture<Result<Vec<Listing>, BackendError>> {
        let listings = self.listings.read().unwrap().clone();

        async move { Ok(listings) }.boxed()
    }

    fn get_by_id(&self, id: &Uuid) -> BoxFuture<Result<Option<Listing>, BackendError>> {
        let listing = self
            .listings
            .read()
            .unwrap()
            .iter()
            .find(|listing| listing.id() == id)
            .cloned();

        async move { Ok(listing) }.boxed()
    }

    fn create(
        &self,
        owner: &Identity,
        fields: &ValidatedFields,
        images: &[ListingImage],
    ) -> BoxFuture<Result<Listing, BackendError>> {
        let result = self.take_injected_failure().map(|()| {
            let now = OffsetDateTime::now_utc();
            let listing = Listing::new(
                Uuid::new_v4(),
                owner.clone(),
                fields.clone(),
                images.to_vec(),
                Times {
                    created_at: now,
                    updated_at: now,
                },
            );

            self.listings.write().unwrap().push(listing.clone());

            listing
        });

        async move { result }.boxed()
    }

    fn update(
        &self,
        id: &Uuid,
        fields: &ValidatedFields,
    ) -> BoxFuture<Result<Listing, BackendError>> {
        let result = self.take_injected_failure().and_then(|()| {
            let mut listings = self.listings.write().unwrap();

            let listing = listings
                .iter_mut()
                .find(|listing| listing.id() == id)
                .ok_or(BackendError::NonExistentId(*id))?;

            listing.room_type = fields.room_type;
            listing.category = fields.category;
            listing.gender = fields.gender;
            listing.city = fields.city.clone();
            listing.state = fields.state.clone();
            listing.rent = fields.rent;
            listing.description = fields.description.clone();
            listing.times.updated_at = OffsetDateTime::now_utc();

            Ok(listing.clone())
        });

        async move { result }.boxed()
    }

    fn remove(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        let result = self.take_injected_failure().and_then(|()| {
            let mut listings = self.listings.write().unwrap();
            let before = listings.len();

            listings.retain(|listing| listing.id() != id);

            if listings.len() == before {
                Err(BackendError::NonExistentId(*id))
            } else {
                Ok(())
            }
        });

        async move { result }.boxed()
    }

    fn create_comment(
        &self,
        listing_id: &Uuid,
        author: &Identity,
        body: &str,
    ) -> BoxFuture<Result<Comment, BackendError>> {
        let result = self.take_injected_failure().map(|()| {
            let comment = Comment {
                id: Uuid::new_v4(),
                listing_id: *listing_id,
                author: author.clone(),
                body: body.to_owned(),
                created_at: OffsetDateTime::now_utc(),
            };

            self.comments.write().unwrap().push(comment.clone());

            comment
        });

        async move { result }.boxed()
    }

    fn reviews_for_listing(&self, listing_id: &Uuid) -> BoxFuture<Result<Vec<Review>, BackendError>> {
        let reviews = self
            .reviews
            .read()
            .unwrap()
            .iter()
            .filter(|review| review.listing_id == *listing_id)
            .cloned()
            .collect::<Vec<_>>();

        async move { Ok(reviews) }.boxed()
    }
}

/// A session lookup over a fixed token table.
#[derive(Default)]
pub struct MockSessions {
    tokens: HashMap<String, Identity>,
}

impl MockSessions {
    pub fn new(tokens: impl IntoIterator<Item = (String, Identity)>) -> Self {
        MockSessions {
            tokens: tokens.into_iter().collect(),
        }
    }
}

impl Sessions for MockSessions {
    fn lookup(&self, token: &str) -> BoxFuture<Result<Option<Identity>, BackendError>> {
        let identity = self.tokens.get(token).cloned();

        async move { Ok(identity) }.boxed()
    }
}
