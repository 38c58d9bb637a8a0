use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::BackendError;
use crate::listing::{Category, Gender, RoomType};
use crate::normalization::normalize_field;

pub const ROOM_TYPE: &str = "roomType";
pub const CATEGORY: &str = "category";
pub const GENDER: &str = "gender";
pub const CITY: &str = "city";
pub const STATE: &str = "state";
pub const RENT: &str = "rent";
pub const DESCRIPTION: &str = "description";

const REQUIRED_FIELDS: [&str; 7] = [ROOM_TYPE, CATEGORY, GENDER, CITY, STATE, RENT, DESCRIPTION];

/// The 50 recognized U.S. state names, in canonical form.
pub const STATES: [&str; 50] = [
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

/// The outcome of a successful validation: every field parsed, trimmed
/// and normalized.
#[derive(Clone, Debug)]
pub struct ValidatedFields {
    pub room_type: RoomType,
    pub category: Category,
    pub gender: Gender,
    pub city: String,
    pub state: String,
    pub rent: f64,
    pub description: String,
}

/// Checks the submitted fields against the listing rules, first failure
/// wins. Expects already-sanitized input; returns the typed, normalized
/// record on success.
pub fn validate(fields: &HashMap<String, String>) -> Result<ValidatedFields, BackendError> {
    for name in REQUIRED_FIELDS.iter() {
        match fields.get(*name) {
            None => {
                return Err(BackendError::invalid_field(format!(
                    "missing required field: {}",
                    name
                )))
            }
            Some(value) if value.is_empty() => {
                return Err(BackendError::invalid_field(format!(
                    "missing required field: {}",
                    name
                )))
            }
            Some(_) => {}
        }
    }

    for name in REQUIRED_FIELDS.iter() {
        if fields[*name].trim().is_empty() {
            return Err(BackendError::invalid_field(format!(
                "field {} must not be blank",
                name
            )));
        }
    }

    let room_type = parse_choice::<RoomType>(
        &fields[ROOM_TYPE],
        "roomType must be one of 1bhk, 2bhk or 3bhk",
    )?;
    let category = parse_choice::<Category>(
        &fields[CATEGORY],
        "category must be either private or shared",
    )?;
    let gender = parse_choice::<Gender>(&fields[GENDER], "gender must be male, female or any")?;

    let rent = fields[RENT]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|rent| rent.is_finite() && *rent > 0.0)
        .ok_or_else(|| BackendError::invalid_field("rent must be a positive number"))?;

    let state = canonical_state(&fields[STATE])
        .ok_or_else(|| BackendError::invalid_field("state must be one of the 50 U.S. states"))?;

    let city = normalize_field(&fields[CITY]).to_lowercase();
    let description = normalize_field(&fields[DESCRIPTION]);

    Ok(ValidatedFields {
        room_type,
        category,
        gender,
        city,
        state,
        rent,
        description,
    })
}

fn parse_choice<T: FromStr>(raw: &str, message: &str) -> Result<T, BackendError> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| BackendError::invalid_field(message))
}

fn canonical_state(raw: &str) -> Option<String> {
    let normalized = normalize_field(raw);

    STATES
        .iter()
        .find(|state| state.eq_ignore_ascii_case(&normalized))
        .map(|state| (*state).to_string())
}
