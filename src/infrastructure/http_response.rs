// HTTP response utilities for CSV downloads
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
};
use tokio::io::AsyncReadExt;

/// True when the client lists Brotli in `Accept-Encoding`
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// CSV attachment, optionally Brotli-compressed
pub async fn csv_response(body: String, file_name: &str, compress: bool) -> Result<Response<Body>, StatusCode> {
    let csv_bytes = body.into_bytes();

    let (body_bytes, content_encoding) = if compress {
        let original_len = csv_bytes.len();
        let mut encoder = BrotliEncoder::new(std::io::Cursor::new(csv_bytes));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await.map_err(|e| {
            tracing::error!("Brotli compression error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tracing::debug!("Compressed CSV: {} → {} bytes", original_len, compressed.len());
        (compressed, Some("br"))
    } else {
        (csv_bytes, None)
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name.replace('"', "")))
        .map_err(|e| {
            tracing::error!("Invalid file name {}: {}", file_name, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut response_builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, body_bytes.len());

    if let Some(encoding) = content_encoding {
        response_builder = response_builder.header(header::CONTENT_ENCODING, encoding);
    }

    response_builder.body(Body::from(body_bytes)).map_err(|e| {
        tracing::error!("Response build error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
