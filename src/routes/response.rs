use serde::Serialize;

use crate::listing::{Listing, Review};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Created {
        id: String,
    },
    Detail {
        #[serde(flatten)]
        listing: &'a Listing,
        reviews: Vec<Review>,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
}
