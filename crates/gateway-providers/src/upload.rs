//! Default upload collaborator.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use gateway_core::{GatewayResult, UploadSink};

/// Inlines uploads as `data:` URLs instead of storing them anywhere
///
/// Used when no image host is configured. Clients that render Markdown
/// display the image directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlUploadSink;

impl DataUrlUploadSink {
    fn mime_for(filename: &str) -> &'static str {
        let extension = filename.rsplit_once('.').map_or("", |(_, ext)| ext);
        match extension.to_ascii_lowercase().as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl UploadSink for DataUrlUploadSink {
    async fn upload(&self, bytes: Bytes, filename: &str) -> GatewayResult<String> {
        Ok(format!(
            "data:{};base64,{}",
            Self::mime_for(filename),
            BASE64.encode(&bytes)
        ))
    }
}
