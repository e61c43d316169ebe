//! Instagram: a single extraction-tool run.

use tracing::{info, instrument};

use super::{Job, run_tool};
use crate::download::error::MediaError;
use crate::download::extractor::{ExtractorRequest, MediaExtractor};
use crate::download::media::MediaDescriptor;

#[instrument(skip_all, fields(url = %job.url, media_id = %job.media_id))]
pub(crate) async fn download(
    job: &Job<'_>,
    extractor: &dyn MediaExtractor,
) -> Result<MediaDescriptor, MediaError> {
    let request = ExtractorRequest::new(job.url, job.output_template())
        .no_warnings()
        .quiet();
    let path = run_tool(job, extractor, &request).await?;
    let descriptor = job.finish(path).await?;
    info!(file = %descriptor.file_name, kind = %descriptor.kind, "instagram media ready");
    Ok(descriptor)
}
