use std::sync::Arc;

use avatar_core::{AvatarService, AvatarVideoRequest};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Launch avatar video generation without waiting for it. Failures are
/// logged inside the task and never reach the caller.
pub fn dispatch_best_effort(
    service: Arc<dyn AvatarService>,
    request: AvatarVideoRequest,
    agent: String,
) -> JoinHandle<()> {
    info!(agent = %agent, avatar_id = %request.avatar_id, "Dispatching utterance to avatar service");
    tokio::spawn(async move {
        match service.create_avatar_video(&request).await {
            Ok(job) => info!(
                agent = %agent,
                avatar_id = %request.avatar_id,
                video_id = ?job.video_id,
                "Avatar video requested"
            ),
            Err(e) => warn!(
                agent = %agent,
                avatar_id = %request.avatar_id,
                error = %e,
                "Avatar dispatch failed"
            ),
        }
    })
}
