//! src/services/batch_service.rs
//!
//! BatchService — stages uploads, drives the image converter over each
//! staged file in upload order, measures the savings and optionally packs the
//! outputs into a ZIP. Everything lives on disk: staged inputs under
//! `upload_dir`, outputs under `output_dir/{batch_id}/`.

use crate::{
    models::{
        batch::{
            Batch, ConversionResult, UploadedFile, batch_id_from_millis, client_base_name,
            is_plain_segment, sanitize_filename, with_numbered_extension,
        },
        options::{BatchMode, ConversionOptions, OptionsError},
    },
    services::{
        archive_service::{self, ArchiveError},
        conversion_service::{ConvertError, ImageConverter},
    },
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::{Stream, StreamExt, pin_mut};
use std::{
    collections::HashSet,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};

/// Maximum number of files accepted in one batch.
pub const MAX_FILES: usize = 200;

/// How many times a colliding name or batch id is bumped before giving up.
const MAX_NAME_ATTEMPTS: u64 = 1000;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no images were received")]
    NoFiles,
    #[error("too many images: at most {limit} per batch")]
    TooManyFiles { limit: usize },
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
    #[error("malformed upload: {0}")]
    Multipart(String),
    #[error("converting `{file}` failed: {source}")]
    Conversion {
        file: String,
        #[source]
        source: ConvertError,
    },
    #[error("packaging batch `{batch_id}` failed: {source}")]
    Archive {
        batch_id: String,
        #[source]
        source: ArchiveError,
    },
    #[error("file `{file_name}` not found in batch `{batch_id}`")]
    FileNotFound { batch_id: String, file_name: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BatchError {
    /// Errors caused by the request itself rather than by the server.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            BatchError::NoFiles
                | BatchError::TooManyFiles { .. }
                | BatchError::InvalidOptions(_)
                | BatchError::Multipart(_)
        )
    }
}

pub type BatchResult<T> = Result<T, BatchError>;

/// Cheap to clone; shared as router state by every handler.
#[derive(Clone)]
pub struct BatchService {
    /// Staging directory for uploads awaiting conversion.
    pub upload_dir: PathBuf,

    /// Root holding one directory per batch.
    pub output_dir: PathBuf,

    converter: Arc<dyn ImageConverter>,
}

impl BatchService {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        converter: Arc<dyn ImageConverter>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            converter,
        }
    }

    /// Stream one uploaded file into the staging directory.
    ///
    /// The staged name is `{millis}-{sanitized original}`; the file is
    /// created exclusively, bumping the timestamp on a clash. A failing
    /// stream removes the partial file.
    pub async fn stage_upload_stream<S, E>(
        &self,
        original_name: &str,
        stream: S,
    ) -> BatchResult<UploadedFile>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let original_name = client_base_name(original_name);
        let safe = sanitize_filename(&original_name);
        fs::create_dir_all(&self.upload_dir).await?;
        let (staged_path, mut file) = create_exclusive(now_millis(), |millis| {
            self.upload_dir.join(format!("{}-{}", millis, safe))
        })
        .await?;

        let mut size: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&staged_path).await;
                    return Err(BatchError::Multipart(err.to_string()));
                }
            };
            size += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&staged_path).await;
                return Err(BatchError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&staged_path).await;
            return Err(BatchError::Io(err));
        }

        debug!("staged {} ({} bytes) at {}", original_name, size, staged_path.display());
        Ok(UploadedFile {
            original_name,
            staged_path,
            size,
        })
    }

    /// Best-effort removal of staged inputs that will never be converted.
    pub async fn discard_staged(&self, files: &[UploadedFile]) {
        for file in files {
            match fs::remove_file(&file.staged_path).await {
                Ok(_) => debug!("discarded staged file {}", file.staged_path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(
                    "failed to discard staged file {}: {}",
                    file.staged_path.display(),
                    err
                ),
            }
        }
    }

    /// Convert every staged file in upload order and build the batch record.
    ///
    /// Each input is deleted as soon as its own conversion succeeded. The
    /// first failure aborts the batch: inputs not yet converted are
    /// discarded, outputs already written stay until the janitor runs.
    pub async fn run_batch(
        &self,
        files: Vec<UploadedFile>,
        options: &ConversionOptions,
    ) -> BatchResult<Batch> {
        if files.is_empty() {
            return Err(BatchError::NoFiles);
        }
        if files.len() > MAX_FILES {
            self.discard_staged(&files).await;
            return Err(BatchError::TooManyFiles { limit: MAX_FILES });
        }

        let (id, dir, created_at) = match self.create_batch_dir().await {
            Ok(created) => created,
            Err(err) => {
                self.discard_staged(&files).await;
                return Err(err);
            }
        };

        let mut results = Vec::with_capacity(files.len());
        let mut taken = HashSet::new();
        for (index, file) in files.iter().enumerate() {
            match self.convert_one(file, &dir, options, &mut taken).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    self.discard_staged(&files[index..]).await;
                    return Err(err);
                }
            }
        }

        let archive = if options.archive {
            let name = archive_name_for(&id, options);
            archive_service::create_zip(&dir, &name)
                .await
                .map_err(|source| BatchError::Archive {
                    batch_id: id.clone(),
                    source,
                })?;
            Some(name)
        } else {
            None
        };

        Ok(Batch {
            id,
            dir,
            created_at,
            results,
            archive,
        })
    }

    async fn convert_one(
        &self,
        file: &UploadedFile,
        dir: &Path,
        options: &ConversionOptions,
        taken: &mut HashSet<String>,
    ) -> BatchResult<ConversionResult> {
        let staged_name = file
            .staged_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| sanitize_filename(&file.original_name));
        let converted = output_name(&staged_name, options.target.extension(), taken)?;
        let output_path = dir.join(&converted);

        self.converter
            .convert(&file.staged_path, &output_path, options)
            .await
            .map_err(|source| BatchError::Conversion {
                file: file.original_name.clone(),
                source,
            })?;

        let converted_size = fs::metadata(&output_path).await?.len();
        if let Err(err) = fs::remove_file(&file.staged_path).await {
            warn!(
                "failed to remove staged input {}: {}",
                file.staged_path.display(),
                err
            );
        }

        debug!(
            "converted {} -> {} ({} -> {} bytes)",
            file.original_name, converted, file.size, converted_size
        );
        Ok(ConversionResult::new(
            file.original_name.clone(),
            converted,
            file.size,
            converted_size,
        ))
    }

    /// Create a fresh batch directory. The id is the creation instant in
    /// base 36; an existing directory bumps it by one millisecond.
    async fn create_batch_dir(&self) -> BatchResult<(String, PathBuf, DateTime<Utc>)> {
        fs::create_dir_all(&self.output_dir).await?;
        let start = now_millis();
        for offset in 0..MAX_NAME_ATTEMPTS {
            let millis = start + offset;
            let id = batch_id_from_millis(millis);
            let dir = self.output_dir.join(&id);
            match fs::create_dir(&dir).await {
                Ok(_) => {
                    let created_at = Utc
                        .timestamp_millis_opt(millis as i64)
                        .single()
                        .unwrap_or_else(Utc::now);
                    return Ok((id, dir, created_at));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(BatchError::Io(err)),
            }
        }
        Err(BatchError::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a batch directory",
        )))
    }

    /// Open a converted file (or archive) for download.
    ///
    /// Both segments must be plain names; anything else, or a missing
    /// file, is reported as not found.
    pub async fn open_download(&self, batch_id: &str, file_name: &str) -> BatchResult<(File, u64)> {
        let not_found = || BatchError::FileNotFound {
            batch_id: batch_id.to_string(),
            file_name: file_name.to_string(),
        };
        if !is_plain_segment(batch_id) || !is_plain_segment(file_name) {
            return Err(not_found());
        }
        // hidden entries include archives still being written
        if file_name.starts_with('.') {
            return Err(not_found());
        }

        let path = self.output_dir.join(batch_id).join(file_name);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                not_found()
            } else {
                BatchError::Io(err)
            }
        })?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(not_found());
        }
        Ok((file, meta.len()))
    }
}

fn archive_name_for(batch_id: &str, options: &ConversionOptions) -> String {
    let target = match options.mode {
        BatchMode::Compress => None,
        BatchMode::Convert => Some(options.target.extension()),
    };
    archive_service::archive_name(batch_id, target)
}

/// Pick the output name for one staged file and reserve it for the batch.
/// Inputs sharing a stem (`1-a.png`, `1-a.jpg`) get `-1`, `-2`, ... suffixes.
/// Names are compared case-insensitively.
fn output_name(staged_name: &str, ext: &str, taken: &mut HashSet<String>) -> BatchResult<String> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let name = with_numbered_extension(staged_name, ext, n);
        if taken.insert(name.to_ascii_lowercase()) {
            return Ok(name);
        }
    }
    Err(BatchError::Io(io::Error::new(
        ErrorKind::AlreadyExists,
        "could not allocate an output name",
    )))
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Create a new file at the first free path produced by `path_for`,
/// starting from `start` and bumping by one on each clash.
async fn create_exclusive<F>(start: u64, path_for: F) -> BatchResult<(PathBuf, File)>
where
    F: Fn(u64) -> PathBuf,
{
    for offset in 0..MAX_NAME_ATTEMPTS {
        let path = path_for(start + offset);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(BatchError::Io(err)),
        }
    }
    Err(BatchError::Io(io::Error::new(
        ErrorKind::AlreadyExists,
        "could not allocate a staging name",
    )))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::options::TargetFormat;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes `ratio` times the input size to the output path, or fails on
    /// the file whose name contains `fail_on`. With `blocks_archive` it also
    /// squats on the batch's archive name with a directory.
    pub(crate) struct FakeConverter {
        pub ratio: f64,
        pub fail_on: Option<String>,
        pub blocks_archive: bool,
        pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl FakeConverter {
        pub(crate) fn shrinking() -> Self {
            Self::with_ratio(0.5)
        }

        pub(crate) fn with_ratio(ratio: f64) -> Self {
            Self {
                ratio,
                fail_on: None,
                blocks_archive: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn blocking_archive() -> Self {
            Self {
                blocks_archive: true,
                ..Self::shrinking()
            }
        }

        pub(crate) fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Self::shrinking()
            }
        }
    }

    #[async_trait]
    impl ImageConverter for FakeConverter {
        async fn convert(
            &self,
            input: &Path,
            output: &Path,
            options: &ConversionOptions,
        ) -> Result<(), ConvertError> {
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf()));
            let name = input.to_string_lossy().to_string();
            if self.fail_on.as_deref().is_some_and(|f| name.contains(f)) {
                return Err(ConvertError::Spawn {
                    program: "fake".into(),
                    source: io::Error::new(ErrorKind::NotFound, "no delegate for this format"),
                });
            }
            let len = std::fs::metadata(input).unwrap().len();
            let out_len = (len as f64 * self.ratio) as usize;
            std::fs::write(output, vec![7u8; out_len]).unwrap();
            if self.blocks_archive {
                let dir = output.parent().unwrap();
                let id = dir.file_name().unwrap().to_string_lossy().to_string();
                let squat = dir.join(archive_name_for(&id, options));
                std::fs::create_dir_all(squat.join("occupied")).unwrap();
            }
            Ok(())
        }
    }

    pub(crate) fn service_with(converter: FakeConverter) -> (TempDir, BatchService, Arc<FakeConverter>) {
        let root = TempDir::new().unwrap();
        let upload = root.path().join("uploads");
        let output = root.path().join("output");
        std::fs::create_dir_all(&upload).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        let converter = Arc::new(converter);
        let service = BatchService::new(upload, output, converter.clone());
        (root, service, converter)
    }

    async fn stage(service: &BatchService, name: &str, len: usize) -> UploadedFile {
        let chunks = vec![Ok::<_, io::Error>(Bytes::from(vec![1u8; len]))];
        service
            .stage_upload_stream(name, futures::stream::iter(chunks))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn staged_names_are_sanitized_and_unique() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let a = stage(&service, "../my photo.heic", 10).await;
        let b = stage(&service, "../my photo.heic", 10).await;

        assert_eq!(a.original_name, "my photo.heic");
        assert_eq!(a.size, 10);
        assert_ne!(a.staged_path, b.staged_path);
        let name = a.staged_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-my_photo.heic"), "{}", name);
        assert_eq!(a.staged_path.parent().unwrap(), service.upload_dir);
    }

    #[tokio::test]
    async fn failing_stream_leaves_nothing_staged() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err("connection reset".to_string()),
        ];
        let err = service
            .stage_upload_stream("a.png", futures::stream::iter(chunks))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(std::fs::read_dir(&service.upload_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn converts_every_file_in_order() {
        let (_root, service, converter) = service_with(FakeConverter::shrinking());
        let files = vec![
            stage(&service, "one.heic", 2_000).await,
            stage(&service, "two.png", 1_000).await,
            stage(&service, "three.jpg", 400).await,
        ];
        let staged: Vec<PathBuf> = files.iter().map(|f| f.staged_path.clone()).collect();

        let opts = ConversionOptions {
            quality: 85,
            resize: Some("1024x1024".into()),
            ..ConversionOptions::default()
        };
        let batch = service.run_batch(files, &opts).await.unwrap();

        assert_eq!(batch.results.len(), 3);
        let originals: Vec<&str> = batch.results.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, ["one.heic", "two.png", "three.jpg"]);
        assert!(batch.results.iter().all(|r| r.converted.ends_with(".jpg")));
        assert_eq!(batch.results[0].original_size, 2_000);
        assert_eq!(batch.results[0].converted_size, 1_000);
        assert_eq!(batch.results[0].saved, 1_000);
        assert_eq!(
            batch.total_saved(),
            batch.results.iter().map(|r| r.saved).sum::<u64>()
        );
        assert!(batch.archive.is_none());

        // inputs consumed, outputs in the batch directory
        assert!(staged.iter().all(|p| !p.exists()));
        for r in &batch.results {
            assert!(batch.dir.join(&r.converted).is_file());
        }
        assert_eq!(batch.dir, service.output_dir.join(&batch.id));

        let calls = converter.calls.lock().unwrap();
        assert_eq!(calls.iter().map(|c| c.0.clone()).collect::<Vec<_>>(), staged);
    }

    #[tokio::test]
    async fn grown_files_report_zero_savings() {
        let (_root, service, _) = service_with(FakeConverter::with_ratio(3.0));
        let files = vec![stage(&service, "tiny.png", 100).await];
        let batch = service
            .run_batch(files, &ConversionOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.results[0].converted_size, 300);
        assert_eq!(batch.results[0].saved, 0);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_without_side_effects() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let err = service
            .run_batch(Vec::new(), &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NoFiles));
        assert_eq!(std::fs::read_dir(&service.output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failure_aborts_batch_and_clears_pending_inputs() {
        let (_root, service, converter) = service_with(FakeConverter::failing_on("broken"));
        let files = vec![
            stage(&service, "good.png", 100).await,
            stage(&service, "broken.heic", 100).await,
            stage(&service, "later.png", 100).await,
        ];

        let err = service
            .run_batch(files, &ConversionOptions::default())
            .await
            .unwrap_err();
        match &err {
            BatchError::Conversion { file, .. } => assert_eq!(file, "broken.heic"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_input_error());

        // no retry, nothing after the failure was attempted
        assert_eq!(converter.calls.lock().unwrap().len(), 2);
        assert_eq!(std::fs::read_dir(&service.upload_dir).unwrap().count(), 0);

        // the first output survives in its batch directory
        let batches: Vec<_> = std::fs::read_dir(&service.output_dir).unwrap().collect();
        assert_eq!(batches.len(), 1);
        let batch_dir = batches.into_iter().next().unwrap().unwrap().path();
        assert_eq!(std::fs::read_dir(batch_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn archive_requested_packs_all_outputs() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let files = vec![
            stage(&service, "a.heic", 100).await,
            stage(&service, "b.heic", 100).await,
            stage(&service, "c.heic", 100).await,
        ];
        let opts = ConversionOptions {
            target: TargetFormat::Png,
            archive: true,
            ..ConversionOptions::default()
        };
        let batch = service.run_batch(files, &opts).await.unwrap();

        let name = batch.archive.clone().unwrap();
        assert_eq!(name, format!("convert-png-{}.zip", batch.id));
        let archive = std::fs::File::open(batch.dir.join(&name)).unwrap();
        assert_eq!(zip::ZipArchive::new(archive).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn webp_batches_use_webp_archive_name() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let files = vec![stage(&service, "a.png", 100).await];
        let opts = ConversionOptions {
            mode: BatchMode::Compress,
            target: TargetFormat::Webp,
            archive: true,
            ..ConversionOptions::default()
        };
        let batch = service.run_batch(files, &opts).await.unwrap();
        assert_eq!(batch.archive, Some(format!("webp-{}.zip", batch.id)));
        assert!(batch.results[0].converted.ends_with(".webp"));
    }

    #[tokio::test]
    async fn concurrent_batches_get_distinct_ids() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let (a, b) = tokio::join!(service.create_batch_dir(), service.create_batch_dir());
        assert_ne!(a.unwrap().0, b.unwrap().0);
    }

    #[tokio::test]
    async fn download_lookup() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let files = vec![stage(&service, "a.png", 64).await];
        let batch = service
            .run_batch(files, &ConversionOptions::default())
            .await
            .unwrap();

        let (_, len) = service
            .open_download(&batch.id, &batch.results[0].converted)
            .await
            .unwrap();
        assert_eq!(len, 32);

        for (id, name) in [
            (batch.id.as_str(), "missing.jpg"),
            ("nope", "a.jpg"),
            ("..", "output"),
            (batch.id.as_str(), ".."),
        ] {
            let err = service.open_download(id, name).await.unwrap_err();
            assert!(matches!(err, BatchError::FileNotFound { .. }), "{id}/{name}");
        }
    }

    #[tokio::test]
    async fn archives_in_progress_are_not_downloadable() {
        let (_root, service, _) = service_with(FakeConverter::shrinking());
        let files = vec![stage(&service, "a.png", 64).await];
        let batch = service
            .run_batch(files, &ConversionOptions::default())
            .await
            .unwrap();

        let partial = format!(".convert-jpg-{}.zip.partial", batch.id);
        std::fs::write(batch.dir.join(&partial), b"PK").unwrap();
        let err = service.open_download(&batch.id, &partial).await.unwrap_err();
        assert!(matches!(err, BatchError::FileNotFound { .. }));
    }

    fn stage_as(service: &BatchService, staged_name: &str, len: usize) -> UploadedFile {
        let staged_path = service.upload_dir.join(staged_name);
        std::fs::write(&staged_path, vec![1u8; len]).unwrap();
        UploadedFile {
            original_name: staged_name.split_once('-').unwrap().1.to_string(),
            staged_path,
            size: len as u64,
        }
    }

    #[tokio::test]
    async fn inputs_sharing_a_stem_get_their_own_outputs() {
        let (_root, service, _) = service_with(FakeConverter::with_ratio(1.0));
        let files = vec![
            stage_as(&service, "1700000000000-a.png", 100),
            stage_as(&service, "1700000000000-a.jpg", 300),
            stage_as(&service, "1700000000000-A.heic", 500),
        ];
        let batch = service
            .run_batch(files, &ConversionOptions::default())
            .await
            .unwrap();

        let converted: Vec<&str> = batch.results.iter().map(|r| r.converted.as_str()).collect();
        assert_eq!(
            converted,
            ["1700000000000-a.jpg", "1700000000000-a-1.jpg", "1700000000000-A-2.jpg"]
        );
        for (result, len) in batch.results.iter().zip([100u64, 300, 500]) {
            assert_eq!(result.converted_size, len);
            let on_disk = std::fs::metadata(batch.dir.join(&result.converted)).unwrap();
            assert_eq!(on_disk.len(), len);
        }
        assert_eq!(std::fs::read_dir(&batch.dir).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn archive_failure_fails_the_batch_without_leftovers() {
        let (_root, service, _) = service_with(FakeConverter::blocking_archive());
        let files = vec![
            stage(&service, "a.heic", 100).await,
            stage(&service, "b.heic", 100).await,
        ];
        let opts = ConversionOptions {
            archive: true,
            ..ConversionOptions::default()
        };

        let err = service.run_batch(files, &opts).await.unwrap_err();
        assert!(matches!(err, BatchError::Archive { .. }), "{err:?}");
        assert!(!err.is_input_error());

        let batch_dir = std::fs::read_dir(&service.output_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        for entry in std::fs::read_dir(batch_dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".partial"), "{name}");
            if name.ends_with(".zip") {
                // only the squatting directory, never an archive file
                assert!(entry.file_type().unwrap().is_dir(), "{name}");
            }
        }
    }
}
