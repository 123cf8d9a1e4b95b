use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// JSON form of a submission: both images as base64 strings.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSubmission {
    #[serde(default)]
    pub person_image: Option<String>,
    #[serde(default)]
    pub clothing_image: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A try-on request after transport decoding, before validation.
#[derive(Clone, Validate)]
pub struct TryOnSubmission {
    #[garde(length(min = 1))]
    pub person_image: Vec<u8>,

    #[garde(length(min = 1))]
    pub clothing_image: Vec<u8>,

    #[garde(length(min = 1))]
    pub api_key: String,
}

impl fmt::Debug for TryOnSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryOnSubmission")
            .field("person_image_bytes", &self.person_image.len())
            .field("clothing_image_bytes", &self.clothing_image.len())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Response after submitting a try-on job.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: Uuid,
}

/// Everything the background worker needs to run one job.
#[derive(Clone, Serialize, Deserialize)]
pub struct TryOnTask {
    pub job_id: Uuid,
    /// Creation time of the job; every record written for it keeps this.
    pub created_at: DateTime<Utc>,
    pub images: TryOnImages,
    pub api_key: String,
}

impl TryOnTask {
    pub fn new(job_id: Uuid, submission: TryOnSubmission) -> Self {
        Self {
            job_id,
            created_at: Utc::now(),
            images: TryOnImages {
                person: submission.person_image,
                clothing: submission.clothing_image,
            },
            api_key: submission.api_key,
        }
    }
}

impl fmt::Debug for TryOnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryOnTask")
            .field("job_id", &self.job_id)
            .field("created_at", &self.created_at)
            .field("images", &self.images)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Raw person and clothing image bytes, base64 encoded when serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct TryOnImages {
    #[serde(with = "base64_bytes")]
    pub person: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub clothing: Vec<u8>,
}

impl fmt::Debug for TryOnImages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryOnImages")
            .field("person_bytes", &self.person.len())
            .field("clothing_bytes", &self.clothing.len())
            .finish()
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
