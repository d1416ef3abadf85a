//! HTTP handlers for batch conversion.
//! Streams each uploaded image straight to the staging directory and hands
//! the staged set to `BatchService`.

use crate::{
    errors::AppError,
    models::{
        batch::{BatchResponse, UploadedFile},
        options::ConversionOptions,
    },
    services::batch_service::{BatchError, BatchService, MAX_FILES},
};
use axum::{
    Json,
    extract::{Multipart, State},
};
use std::collections::HashMap;

/// Multipart field carrying the images.
pub const FILES_FIELD: &str = "images";

const WEBP_FAILURE: &str = "Failed to convert to WebP. For HEIC/HEIF input install libheif \
     and reinstall ImageMagick (e.g. `brew install libheif && brew reinstall imagemagick`).";
const CONVERT_FAILURE: &str = "Failed to convert images. For HEIC/HEIF support install libheif \
     and reinstall ImageMagick (e.g. `brew install libheif && brew reinstall imagemagick`).";

/// Files staged from one request plus its plain form fields.
#[derive(Debug, Default)]
pub struct ReceivedUpload {
    pub files: Vec<UploadedFile>,
    pub fields: HashMap<String, String>,
}

/// `POST /api/webp` — compress a batch to WebP.
pub async fn compress_webp(
    State(service): State<BatchService>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, AppError> {
    let upload = receive_upload(&service, multipart)
        .await
        .map_err(|err| AppError::from_batch(err, WEBP_FAILURE))?;
    run(&service, upload, ConversionOptions::from_webp_form, WEBP_FAILURE).await
}

/// `POST /api/convert` — convert a batch to JPEG, PNG, HEIC or WebP.
pub async fn convert_images(
    State(service): State<BatchService>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, AppError> {
    let upload = receive_upload(&service, multipart)
        .await
        .map_err(|err| AppError::from_batch(err, CONVERT_FAILURE))?;
    run(
        &service,
        upload,
        ConversionOptions::from_convert_form,
        CONVERT_FAILURE,
    )
    .await
}

async fn run<P, E>(
    service: &BatchService,
    upload: ReceivedUpload,
    parse_options: P,
    failure_message: &str,
) -> Result<Json<BatchResponse>, AppError>
where
    P: Fn(&HashMap<String, String>) -> Result<ConversionOptions, E>,
    BatchError: From<E>,
{
    if upload.files.is_empty() {
        return Err(AppError::from_batch(BatchError::NoFiles, failure_message));
    }

    let options = match parse_options(&upload.fields) {
        Ok(options) => options,
        Err(err) => {
            service.discard_staged(&upload.files).await;
            return Err(AppError::from_batch(err.into(), failure_message));
        }
    };

    let count = upload.files.len();
    let batch = service
        .run_batch(upload.files, &options)
        .await
        .map_err(|err| AppError::from_batch(err, failure_message))?;

    tracing::info!(
        batch_id = %batch.id,
        created_at = %batch.created_at,
        files = count,
        format = %options.target,
        saved = batch.total_saved(),
        "batch converted"
    );
    Ok(Json(batch.into_response()))
}

/// Read the whole multipart body: files under `images` are staged in
/// arrival order, every other text field is collected by name.
///
/// On any error the files staged so far are removed again.
pub async fn receive_upload(
    service: &BatchService,
    mut multipart: Multipart,
) -> Result<ReceivedUpload, BatchError> {
    let mut upload = ReceivedUpload::default();
    match read_fields(service, &mut multipart, &mut upload).await {
        Ok(()) => Ok(upload),
        Err(err) => {
            service.discard_staged(&upload.files).await;
            Err(err)
        }
    }
}

async fn read_fields(
    service: &BatchService,
    multipart: &mut Multipart,
    upload: &mut ReceivedUpload,
) -> Result<(), BatchError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BatchError::Multipart(e.to_string()))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) if name == FILES_FIELD && !file_name.is_empty() => {
                if upload.files.len() >= MAX_FILES {
                    return Err(BatchError::TooManyFiles { limit: MAX_FILES });
                }
                let staged = service.stage_upload_stream(&file_name, field).await?;
                upload.files.push(staged);
            }
            Some(_) => {
                tracing::debug!("ignoring file in unexpected field `{}`", name);
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| BatchError::Multipart(e.to_string()))?;
                upload.fields.insert(name, value);
            }
        }
    }
    Ok(())
}
