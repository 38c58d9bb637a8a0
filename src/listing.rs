use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::auth::Identity;
use crate::validation;

/// The size of a listed room.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RoomType {
    #[serde(rename = "1bhk")]
    OneBhk,
    #[serde(rename = "2bhk")]
    TwoBhk,
    #[serde(rename = "3bhk")]
    ThreeBhk,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::OneBhk => "1bhk",
            RoomType::TwoBhk => "2bhk",
            RoomType::ThreeBhk => "3bhk",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "1bhk" => Ok(RoomType::OneBhk),
            "2bhk" => Ok(RoomType::TwoBhk),
            "3bhk" => Ok(RoomType::ThreeBhk),
            _ => Err(()),
        }
    }
}

/// Whether a room is rented out privately or shared.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Private,
    Shared,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Private => "private",
            Category::Shared => "shared",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "private" => Ok(Category::Private),
            "shared" => Ok(Category::Shared),
            _ => Err(()),
        }
    }
}

/// The gender a listing accepts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Any,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Any => "any",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "any" => Ok(Gender::Any),
            _ => Err(()),
        }
    }
}

/// One uploaded image of a listing: the public URL and the private
/// handle under which the store can delete it again.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ListingImage {
    pub url: Url,
    pub handle: String,
}

/// A single published listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// The ID of the listing.
    pub(crate) id: Uuid,

    /// The identity that created the listing. Set once, never reassigned.
    pub(crate) owner: Identity,

    pub(crate) room_type: RoomType,

    pub(crate) category: Category,

    pub(crate) gender: Gender,

    /// The city, normalized to lower case.
    pub(crate) city: String,

    /// One of the 50 recognized state names, in canonical form.
    pub(crate) state: String,

    pub(crate) rent: f64,

    pub(crate) description: String,

    /// The uploaded images, in submission order. Never empty.
    pub(crate) images: Vec<ListingImage>,

    /// The times it was created and updated.
    #[serde(flatten)]
    pub(crate) times: Times,
}

impl Listing {
    pub fn new(
        id: Uuid,
        owner: Identity,
        fields: validation::ValidatedFields,
        images: Vec<ListingImage>,
        times: Times,
    ) -> Self {
        Listing {
            id,
            owner,
            room_type: fields.room_type,
            category: fields.category,
            gender: fields.gender,
            city: fields.city,
            state: fields.state,
            rent: fields.rent,
            description: fields.description,
            images,
            times,
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn images(&self) -> &[ListingImage] {
        &self.images
    }

    /// Renders the mutable fields back into the field-map form the
    /// validator accepts, so a partial update can be merged over them
    /// and re-validated as a whole.
    pub fn to_field_map(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();

        fields.insert(validation::ROOM_TYPE.to_owned(), self.room_type.to_string());
        fields.insert(validation::CATEGORY.to_owned(), self.category.to_string());
        fields.insert(validation::GENDER.to_owned(), self.gender.to_string());
        fields.insert(validation::CITY.to_owned(), self.city.clone());
        fields.insert(validation::STATE.to_owned(), self.state.clone());
        fields.insert(validation::RENT.to_owned(), self.rent.to_string());
        fields.insert(
            validation::DESCRIPTION.to_owned(),
            self.description.clone(),
        );

        fields
    }
}

/// A partial update to a listing's mutable fields. The owner and the
/// images are not updatable, and unknown fields are rejected outright.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateFields {
    pub room_type: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub rent: Option<String>,
    pub description: Option<String>,
}

impl UpdateFields {
    /// Lays the provided fields over an existing field map.
    pub fn merge_into(self, fields: &mut HashMap<String, String>) {
        let UpdateFields {
            room_type,
            category,
            gender,
            city,
            state,
            rent,
            description,
        } = self;

        let overrides = vec![
            (validation::ROOM_TYPE, room_type),
            (validation::CATEGORY, category),
            (validation::GENDER, gender),
            (validation::CITY, city),
            (validation::STATE, state),
            (validation::RENT, rent),
            (validation::DESCRIPTION, description),
        ];

        for (name, value) in overrides {
            if let Some(value) = value {
                fields.insert(name.to_owned(), value);
            }
        }
    }
}

/// A comment attached to a listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub(crate) id: Uuid,

    pub(crate) listing_id: Uuid,

    pub(crate) author: Identity,

    pub(crate) body: String,

    #[serde(with = "timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

/// A review of a listing, read through the reviews collaborator.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub(crate) id: Uuid,

    pub(crate) listing_id: Uuid,

    pub(crate) reviewer: String,

    pub(crate) rating: i16,

    pub(crate) body: String,

    #[serde(with = "timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

/// The creation and modification times of a record.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    /// The date and time it was created.
    #[serde(with = "timestamp")]
    pub(crate) created_at: OffsetDateTime,

    /// The date and time it was last modified.
    #[serde(with = "timestamp")]
    pub(crate) updated_at: OffsetDateTime,
}

pub(crate) mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(t: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(t.unix_timestamp())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        Ok(OffsetDateTime::from_unix_timestamp(i64::deserialize(d)?))
    }
}
