use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// A request to relay one submitted file back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    pub submission_url: String,
    pub user_email: String,
    pub assignment_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Record {
    sns: SnsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SnsPayload {
    message: String,
}

/// Decode a `{ "Records": [ { "Sns": { "Message": "..." } } ] }` notification.
///
/// Exactly one record is accepted. The message must decode into a
/// [`SubmissionEvent`] whose `userEmail` is a deliverable address, since a
/// run that cannot notify anyone has no way to report its outcome.
pub fn parse_envelope(body: &[u8]) -> Result<SubmissionEvent, EventError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| EventError::Envelope(e.to_string()))?;

    let record = match envelope.records.len() {
        0 => return Err(EventError::NoRecords),
        1 => &envelope.records[0],
        n => return Err(EventError::MultipleRecords(n)),
    };

    let event: SubmissionEvent = serde_json::from_str(&record.sns.message)
        .map_err(|e| EventError::Message(e.to_string()))?;

    if event.user_email.parse::<lettre::Address>().is_err() {
        return Err(EventError::Email(event.user_email));
    }

    Ok(event)
}
