//! Throttled draining of uploaded model files.

use axum::body::Body;
use futures_util::StreamExt;

use crate::config::UploadConfig;

/// Read and discard `body`, sleeping `chunk_delay` for every `chunk_size`
/// bytes (a trailing partial chunk counts as one). Returns the byte count.
pub async fn drain_throttled(body: Body, config: &UploadConfig) -> Result<u64, axum::Error> {
    let chunk_size = config.chunk_size.max(1);
    let delay = config.chunk_delay();
    let mut stream = body.into_data_stream();
    let mut total: u64 = 0;
    let mut buffered = 0usize;

    while let Some(frame) = stream.next().await {
        let data = frame?;
        total += data.len() as u64;
        buffered += data.len();
        while buffered >= chunk_size {
            buffered -= chunk_size;
            tokio::time::sleep(delay).await;
        }
    }
    if buffered > 0 {
        tokio::time::sleep(delay).await;
    }
    Ok(total)
}
