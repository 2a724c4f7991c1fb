//! Idempotent read-mutate-write patching of the job payload
//!
//! The remote job embeds the autoscaler configuration as a JSON array of
//! records. Reconfiguring the deployment means rewriting exactly one field
//! of the first record and pushing the payload back through a partial
//! update, so the job's schedule, target endpoint and every other
//! attribute stay untouched.

use crate::clients::JobConfigClient;
use crate::error::PatchError;
use crate::types::JobId;
use serde_json::{Map, Value};

/// Field rewritten inside the first configuration record
pub const MIN_SIZE_FIELD: &str = "minSize";

/// Sub-path named in the partial update; everything else is untouched
pub const PAYLOAD_DATA_PATH: &str = "pubsub_target.data";

/// Set `minSize` of the first configuration record to `new_value`
///
/// The round trip is loss-less for everything else: untouched fields,
/// record order and key order all survive re-serialization, so applying
/// the same value twice writes byte-identical payloads.
///
/// This does not wait for the downstream autoscaler to act on the new
/// configuration; that is the caller's job via the convergence poller.
///
/// # Errors
/// - `PatchError::Fetch` when the job lookup fails
/// - `PatchError::Parse` / `EmptyConfig` / `NotAnObject` when the payload
///   is not a non-empty JSON array of objects
/// - `PatchError::Write` when the partial update fails
pub async fn patch_min_size(
    client: &dyn JobConfigClient,
    job: &JobId,
    new_value: u32,
) -> Result<(), PatchError> {
    let raw = client
        .fetch_payload(job)
        .await
        .map_err(PatchError::Fetch)?;

    let mut records: Vec<Value> = serde_json::from_slice(&raw)?;
    let first = records.first_mut().ok_or(PatchError::EmptyConfig)?;
    let record: &mut Map<String, Value> =
        first.as_object_mut().ok_or(PatchError::NotAnObject)?;

    record.insert(MIN_SIZE_FIELD.to_string(), Value::from(new_value));
    let updated = serde_json::to_vec(&records)?;

    tracing::info!("setting {MIN_SIZE_FIELD}={new_value} on job {job}");
    client
        .update_payload(job, &updated, &[PAYLOAD_DATA_PATH])
        .await
        .map_err(PatchError::Write)
}
