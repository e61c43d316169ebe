//! TikTok: a browser-dressed tool run, then one simplified retry.

use tracing::{info, instrument, warn};

use super::{Job, remove_outputs, run_tool};
use crate::download::error::MediaError;
use crate::download::extractor::{ExtractorRequest, MediaExtractor};
use crate::download::media::MediaDescriptor;
use crate::user_agent::{BROWSER_ACCEPT_LANGUAGE, BROWSER_USER_AGENT};

/// First attempt: browser user-agent with referer and accept-language.
pub(crate) fn primary_request(job: &Job<'_>) -> ExtractorRequest {
    ExtractorRequest::new(job.url, job.output_template())
        .no_warnings()
        .user_agent(BROWSER_USER_AGENT)
        .header("Referer", job.url)
        .header("Accept-Language", BROWSER_ACCEPT_LANGUAGE)
}

/// Second attempt: best single format with certificate checks off.
pub(crate) fn fallback_request(job: &Job<'_>) -> ExtractorRequest {
    ExtractorRequest::new(job.url, job.output_template())
        .format("best")
        .no_check_certificate()
}

#[instrument(skip_all, fields(url = %job.url, media_id = %job.media_id))]
pub(crate) async fn download(
    job: &Job<'_>,
    extractor: &dyn MediaExtractor,
) -> Result<MediaDescriptor, MediaError> {
    let path = match run_tool(job, extractor, &primary_request(job)).await {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "primary tiktok extraction failed; trying fallback");
            remove_outputs(job.scratch_dir, &job.prefix()).await;
            run_tool(job, extractor, &fallback_request(job)).await?
        }
    };
    let descriptor = job.finish(path).await?;
    info!(file = %descriptor.file_name, kind = %descriptor.kind, "tiktok media ready");
    Ok(descriptor)
}
