use super::{Result, TransferError};
use futures::StreamExt;
use gwas_common::HttpPath;
use tracing::{debug, info};

/// Stream an HTTP(S) resource into memory
pub async fn download(client: &reqwest::Client, source: &HttpPath) -> Result<Vec<u8>> {
    debug!("Requesting {}", source);
    let response = client.get(source.url().clone()).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::HttpStatus {
            url: source.to_string(),
            status: status.as_u16(),
        });
    }

    let capacity = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }

    info!("Downloaded {} bytes from {}", data.len(), source);
    Ok(data)
}
