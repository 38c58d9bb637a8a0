use futures::future::BoxFuture;
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::BackendError;
use crate::listing::{Comment, Listing, ListingImage, Review};
use crate::validation::ValidatedFields;

pub mod mock;

pub trait Db {
    fn get_all(&self) -> BoxFuture<Result<Vec<Listing>, BackendError>>;

    fn get_by_id(&self, id: &Uuid) -> BoxFuture<Result<Option<Listing>, BackendError>>;

    /// Persists a new listing. The owner is bound here, exactly once;
    /// callers must have validated the fields and uploaded the images
    /// already.
    fn create(
        &self,
        owner: &Identity,
        fields: &ValidatedFields,
        images: &[ListingImage],
    ) -> BoxFuture<Result<Listing, BackendError>>;

    /// Replaces the mutable fields of an existing listing. Owner and
    /// images stay untouched.
    fn update(
        &self,
        id: &Uuid,
        fields: &ValidatedFields,
    ) -> BoxFuture<Result<Listing, BackendError>>;

    fn remove(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>>;

    /// Attaches a comment to a listing; a single atomic insert.
    fn create_comment(
        &self,
        listing_id: &Uuid,
        author: &Identity,
        body: &str,
    ) -> BoxFuture<Result<Comment, BackendError>>;

    fn reviews_for_listing(&self, listing_id: &Uuid) -> BoxFuture<Result<Vec<Review>, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::str::FromStr;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
        types::Json,
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::auth::{Identity, Sessions};
    use crate::errors::BackendError;
    use crate::listing::{Category, Comment, Gender, Listing, ListingImage, Review, RoomType, Times};
    use crate::validation::ValidatedFields;

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn get_all(&self) -> BoxFuture<Result<Vec<Listing>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/get_all.sql"));

                let listings: Vec<Listing> = query
                    .try_map(|row: PgRow| listing_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(listings)
            }
            .boxed()
        }

        fn get_by_id(&self, id: &Uuid) -> BoxFuture<Result<Option<Listing>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/get_by_id.sql"));

                let listing: Option<Listing> = query
                    .bind(id)
                    .try_map(|row: PgRow| listing_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(listing)
            }
            .boxed()
        }

        fn create(
            &self,
            owner: &Identity,
            fields: &ValidatedFields,
            images: &[ListingImage],
        ) -> BoxFuture<Result<Listing, BackendError>> {
            let owner = owner.clone();
            let fields = fields.clone();
            let images = images.to_vec();

            async move {
                let query = sqlx::query_as(include_str!("queries/create.sql"));

                let (id, created_at, updated_at): (Uuid, OffsetDateTime, OffsetDateTime) = query
                    .bind(owner.as_str())
                    .bind(fields.room_type.as_str())
                    .bind(fields.category.as_str())
                    .bind(fields.gender.as_str())
                    .bind(&fields.city)
                    .bind(&fields.state)
                    .bind(fields.rent)
                    .bind(&fields.description)
                    .bind(Json(images.clone()))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Listing::new(
                    id,
                    owner,
                    fields,
                    images,
                    Times {
                        created_at,
                        updated_at,
                    },
                ))
            }
            .boxed()
        }

        fn update(
            &self,
            id: &Uuid,
            fields: &ValidatedFields,
        ) -> BoxFuture<Result<Listing, BackendError>> {
            let id = *id;
            let fields = fields.clone();

            async move {
                let query = sqlx::query(include_str!("queries/update.sql"));

                let listing: Option<Listing> = query
                    .bind(id)
                    .bind(fields.room_type.as_str())
                    .bind(fields.category.as_str())
                    .bind(fields.gender.as_str())
                    .bind(&fields.city)
                    .bind(&fields.state)
                    .bind(fields.rent)
                    .bind(&fields.description)
                    .try_map(|row: PgRow| listing_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                listing.ok_or(BackendError::NonExistentId(id))
            }
            .boxed()
        }

        fn remove(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentId(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn create_comment(
            &self,
            listing_id: &Uuid,
            author: &Identity,
            body: &str,
        ) -> BoxFuture<Result<Comment, BackendError>> {
            let listing_id = *listing_id;
            let author = author.clone();
            let body = body.to_owned();

            async move {
                let query = sqlx::query_as(include_str!("queries/create_comment.sql"));

                let (id, created_at): (Uuid, OffsetDateTime) = query
                    .bind(listing_id)
                    .bind(author.as_str())
                    .bind(&body)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Comment {
                    id,
                    listing_id,
                    author,
                    body,
                    created_at,
                })
            }
            .boxed()
        }

        fn reviews_for_listing(
            &self,
            listing_id: &Uuid,
        ) -> BoxFuture<Result<Vec<Review>, BackendError>> {
            let listing_id = *listing_id;

            async move {
                let query = sqlx::query(include_str!("queries/reviews_for_listing.sql"));

                let reviews: Vec<Review> = query
                    .bind(listing_id)
                    .try_map(|row: PgRow| {
                        Ok(Review {
                            id: try_get(&row, "id")?,
                            listing_id: try_get(&row, "listing_id")?,
                            reviewer: try_get(&row, "reviewer")?,
                            rating: try_get(&row, "rating")?,
                            body: try_get(&row, "body")?,
                            created_at: try_get(&row, "created_at")?,
                        })
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(reviews)
            }
            .boxed()
        }
    }

    /// A session lookup backed by the sessions table. Tokens are issued
    /// elsewhere; unknown or unparseable tokens resolve to no identity.
    pub struct PgSessions {
        pool: PgPool,
    }

    impl PgSessions {
        pub fn new(pool: PgPool) -> Self {
            PgSessions { pool }
        }
    }

    impl Sessions for PgSessions {
        fn lookup(&self, token: &str) -> BoxFuture<Result<Option<Identity>, BackendError>> {
            let token = token.to_owned();

            async move {
                let token = match Uuid::parse_str(&token) {
                    Ok(token) => token,
                    Err(_) => return Ok(None),
                };

                let query = sqlx::query_as(include_str!("queries/lookup_session.sql"));

                let identity: Option<(String,)> = query
                    .bind(token)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(identity.map(|(identity,)| Identity::new(identity)))
            }
            .boxed()
        }
    }

    fn listing_from_row(row: &PgRow) -> Result<Listing, sqlx::Error> {
        let images: Json<Vec<ListingImage>> = try_get(row, "images")?;

        Ok(Listing {
            id: try_get(row, "id")?,
            owner: Identity::new(try_get::<String>(row, "owner")?),
            room_type: parse_label::<RoomType>(row, "room_type")?,
            category: parse_label::<Category>(row, "category")?,
            gender: parse_label::<Gender>(row, "gender")?,
            city: try_get(row, "city")?,
            state: try_get(row, "state")?,
            rent: try_get(row, "rent")?,
            description: try_get(row, "description")?,
            images: images.0,
            times: Times {
                created_at: try_get(row, "created_at")?,
                updated_at: try_get(row, "updated_at")?,
            },
        })
    }

    fn parse_label<T: FromStr>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
        let raw: String = try_get(row, column)?;

        raw.parse().map_err(|_| {
            // we control the values that go into these columns, so this
            // only fires on a corrupted row
            sqlx::Error::Decode(format!("unrecognized {} value: {}", column, raw).into())
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }
}
