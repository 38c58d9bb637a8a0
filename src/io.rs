use std::collections::HashMap;
use std::io;

use bytes::{Buf, Bytes};
use futures::stream::{StreamExt, TryStreamExt};
use warp::multipart::{FormData, Part};

use crate::errors::BackendError;
use crate::images::{ImageFile, MAX_IMAGES};

/// The multipart field name under which image files are submitted.
pub const IMAGES_FIELD: &str = "images";

/// A parsed multipart submission: the text fields plus the attached
/// image files, in submission order.
#[derive(Debug)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub images: Vec<ImageFile>,
}

/// Splits a multipart form into text fields and image files. More than
/// [`MAX_IMAGES`] image parts fail the whole submission.
///
/// Each part's body must be fully drained before the next part is
/// polled, so the stream is consumed one part at a time.
pub async fn parse_submission(mut content: FormData) -> Result<Submission, BackendError> {
    let mut fields = HashMap::new();
    let mut images = vec![];

    while let Some(part) = next_part(&mut content).await? {
        let name = part.name().to_owned();

        if name == IMAGES_FIELD {
            if images.len() == MAX_IMAGES {
                return Err(BackendError::TooManyImages { limit: MAX_IMAGES });
            }

            let content_type = part
                .content_type()
                .map(str::to_owned)
                .unwrap_or_else(|| "application/octet-stream".to_owned());
            let data = part_as_vec(part)
                .await
                .map_err(|_| BackendError::MalformedFormSubmission)?;

            images.push(ImageFile { content_type, data });
        } else {
            let raw = part_as_vec(part)
                .await
                .map_err(|_| BackendError::MalformedFormSubmission)?;
            let value =
                String::from_utf8(raw).map_err(|_| BackendError::MalformedFormSubmission)?;

            fields.insert(name, value);
        }
    }

    Ok(Submission { fields, images })
}

async fn next_part(content: &mut FormData) -> Result<Option<Part>, BackendError> {
    content
        .try_next()
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(raw: Part) -> Result<Vec<u8>, ()> {
    let vec_of_results = part_as_stream(raw).collect::<Vec<_>>().await;

    let vec_of_vecs = vec_of_results
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ())?;

    Ok(vec_of_vecs.concat())
}

/// Collects raw data from [`Part`].
pub fn part_as_stream(raw: Part) -> impl futures::Stream<Item = Result<Bytes, io::Error>> {
    raw.stream().map(|r| {
        r.map(|mut buf| buf.copy_to_bytes(buf.remaining()))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "could not retrieve chunk"))
    })
}
