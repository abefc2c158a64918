//! [`VersionLister`] backed by the AWS S3 SDK.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::primitives::DateTime as AwsDateTime;
use aws_sdk_s3::types::BucketVersioningStatus;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rewind_core::ObjectVersionRecord;

use crate::lister::{ListError, ListVersionsPage, ListVersionsRequest, VersionLister, VersioningStatus};

/// Version id S3 reports for objects written while versioning was off.
const NULL_VERSION_ID: &str = "null";

/// Lists object versions through an S3 client.
#[derive(Debug, Clone)]
pub struct S3Lister {
    client: Client,
}

impl S3Lister {
    /// Wrap a configured client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl VersionLister for S3Lister {
    async fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus, ListError> {
        let output = self
            .client
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| ListError::remote(DisplayErrorContext(&err).to_string()))?;

        Ok(match output.status() {
            Some(BucketVersioningStatus::Enabled) => VersioningStatus::Enabled,
            Some(BucketVersioningStatus::Suspended) => VersioningStatus::Suspended,
            _ => VersioningStatus::Disabled,
        })
    }

    async fn list_versions(&self, request: &ListVersionsRequest) -> Result<ListVersionsPage, ListError> {
        debug!(
            bucket = %request.bucket,
            prefix = %request.prefix,
            key_marker = ?request.key_marker,
            "listing object versions"
        );

        let output = self
            .client
            .list_object_versions()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.map(String::from))
            .set_key_marker(request.key_marker.clone())
            .set_version_id_marker(request.version_id_marker.clone())
            .send()
            .await
            .map_err(|err| {
                ListError::remote(format!(
                    "failed to list object versions for bucket {} with prefix {}: {}",
                    request.bucket,
                    request.prefix,
                    DisplayErrorContext(&err)
                ))
            })?;

        Ok(to_page(&output))
    }
}

/// Convert one SDK response page. Entries that cannot become records are
/// counted as unreadable.
fn to_page(output: &ListObjectVersionsOutput) -> ListVersionsPage {
    let delete_markers: Vec<ObjectVersionRecord> = output
        .delete_markers()
        .iter()
        .filter_map(|marker| {
            to_record(
                marker.key(),
                marker.version_id(),
                marker.last_modified(),
                marker.is_latest(),
                true,
            )
        })
        .collect();

    let versions: Vec<ObjectVersionRecord> = output
        .versions()
        .iter()
        .filter_map(|version| {
            to_record(
                version.key(),
                version.version_id(),
                version.last_modified(),
                version.is_latest(),
                false,
            )
        })
        .collect();

    let listed = output.delete_markers().len() + output.versions().len();
    let unreadable = listed - delete_markers.len() - versions.len();

    let common_prefixes = output
        .common_prefixes()
        .iter()
        .filter_map(|prefix| prefix.prefix().map(str::to_string))
        .collect();

    ListVersionsPage {
        delete_markers,
        versions,
        common_prefixes,
        truncated: output.is_truncated().unwrap_or(false),
        next_key_marker: output.next_key_marker().map(str::to_string),
        next_version_id_marker: output.next_version_id_marker().map(str::to_string),
        unreadable,
    }
}

fn to_record(
    key: Option<&str>,
    version_id: Option<&str>,
    last_modified: Option<&AwsDateTime>,
    is_latest: Option<bool>,
    is_delete_marker: bool,
) -> Option<ObjectVersionRecord> {
    let Some(key) = key else {
        warn!("skipping listing entry without a key");
        return None;
    };
    let Some(last_modified) = last_modified.and_then(to_utc) else {
        warn!(key, "skipping listing entry without a valid timestamp");
        return None;
    };

    Some(ObjectVersionRecord {
        key: key.into(),
        version_id: version_id.unwrap_or(NULL_VERSION_ID).into(),
        last_modified,
        is_delete_marker,
        is_latest: is_latest.unwrap_or(false),
    })
}

fn to_utc(timestamp: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
