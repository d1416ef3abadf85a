//! Archive packager: bundles a batch's converted files into one ZIP.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::FileOptions};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("archive task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Archive name for a batch. WebP compression batches and format
/// conversions use different prefixes.
pub fn archive_name(batch_id: &str, target: Option<&str>) -> String {
    match target {
        Some(target) => format!("convert-{}-{}.zip", target, batch_id),
        None => format!("webp-{}.zip", batch_id),
    }
}

/// Zip every regular file in `dir` (skipping archives and hidden files) into
/// `dir/archive_name` at maximum deflate level.
///
/// The archive is written under a hidden temporary name and renamed into
/// place once finished, so a failed run never leaves a readable archive.
pub async fn create_zip(dir: &Path, archive_name: &str) -> Result<PathBuf, ArchiveError> {
    let dir = dir.to_path_buf();
    let archive_name = archive_name.to_string();
    tokio::task::spawn_blocking(move || write_zip(&dir, &archive_name)).await?
}

fn write_zip(dir: &Path, archive_name: &str) -> Result<PathBuf, ArchiveError> {
    let final_path = dir.join(archive_name);
    let tmp_path = dir.join(format!(".{}.partial", archive_name));

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name.ends_with(".zip") || !entry.file_type()?.is_file() {
            continue;
        }
        entries.push(name);
    }
    entries.sort();

    let result = (|| -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(File::create(&tmp_path)?);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
            .unix_permissions(0o644);

        for name in &entries {
            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(dir.join(name))?;
            io::copy(&mut source, &mut zip)?;
        }

        let file = zip.finish()?;
        file.sync_all()?;
        Ok(())
    })();

    let result =
        result.and_then(|()| fs::rename(&tmp_path, &final_path).map_err(ArchiveError::from));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    tracing::debug!(
        "packed {} files into {}",
        entries.len(),
        final_path.display()
    );
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    #[test]
    fn archive_names() {
        assert_eq!(archive_name("lq3x", None), "webp-lq3x.zip");
        assert_eq!(archive_name("lq3x", Some("png")), "convert-png-lq3x.zip");
    }

    #[tokio::test]
    async fn zips_outputs_but_not_other_archives() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1-b.jpg"), b"bbbb").unwrap();
        fs::write(dir.path().join("1-a.jpg"), b"aaaaaaaa").unwrap();
        fs::write(dir.path().join("old.zip"), b"PK").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let path = create_zip(dir.path(), "convert-jpg-x.zip").await.unwrap();
        assert_eq!(path, dir.path().join("convert-jpg-x.zip"));
        assert!(!dir.path().join(".convert-jpg-x.zip.partial").exists());

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "1-a.jpg");
        let mut body = String::new();
        archive
            .by_name("1-b.jpg")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "bbbb");
    }

    #[tokio::test]
    async fn missing_directory_fails_without_leftovers() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(create_zip(&gone, "webp-x.zip").await.is_err());
        assert!(!gone.exists());
    }

    #[tokio::test]
    async fn occupied_archive_name_removes_partial() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1-a.jpg"), b"aaaa").unwrap();
        fs::create_dir_all(dir.path().join("webp-x.zip").join("occupied")).unwrap();

        assert!(create_zip(dir.path(), "webp-x.zip").await.is_err());
        assert!(!dir.path().join(".webp-x.zip.partial").exists());
        assert!(dir.path().join("webp-x.zip").is_dir());
    }
}
