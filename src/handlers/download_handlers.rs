//! `GET /download/{batch_id}/{file_name}` — stream a converted file or
//! archive back to the client as an attachment.

use crate::{errors::AppError, services::batch_service::BatchService};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

pub async fn download_file(
    State(service): State<BatchService>,
    Path((batch_id, file_name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (file, len) = service
        .open_download(&batch_id, &file_name)
        .await
        .map_err(|err| AppError::from_batch(err, "Failed to read file"))?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_download_headers(response.headers_mut(), &file_name, len);
    Ok(response)
}

fn set_download_headers(headers: &mut HeaderMap, file_name: &str, len: u64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(file_name)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    // names reaching this point are plain segments; quotes are the only
    // thing that could break the header value
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', "_"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    } else {
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment"),
        );
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webp" => "image/webp",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" | "heif" => "image/heic",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("1-a.WEBP"), "image/webp");
        assert_eq!(content_type_for("convert-jpg-x.zip"), "application/zip");
        assert_eq!(content_type_for("1-a.heic"), "image/heic");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }

    #[test]
    fn attachment_headers() {
        let mut headers = HeaderMap::new();
        set_download_headers(&mut headers, "1-photo.jpg", 42);
        assert_eq!(headers[header::CONTENT_LENGTH], "42");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"1-photo.jpg\""
        );
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    }
}
