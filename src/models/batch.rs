//! A batch is one accepted conversion request and its output directory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// One conversion request, materialised as a directory under the output root.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Base-36 rendering of the creation instant in milliseconds.
    pub id: String,

    /// Directory holding the converted files (and the archive, if any).
    pub dir: PathBuf,

    pub created_at: DateTime<Utc>,

    /// One entry per uploaded file, in upload order.
    pub results: Vec<ConversionResult>,

    /// Archive file name inside `dir` when packaging was requested.
    pub archive: Option<String>,
}

impl Batch {
    pub fn total_original_size(&self) -> u64 {
        self.results.iter().map(|r| r.original_size).sum()
    }

    pub fn total_converted_size(&self) -> u64 {
        self.results.iter().map(|r| r.converted_size).sum()
    }

    pub fn total_saved(&self) -> u64 {
        self.results.iter().map(|r| r.saved).sum()
    }

    /// Build the JSON body returned to the client: either an archive link
    /// plus bare results, or per-file download URLs.
    pub fn into_response(self) -> BatchResponse {
        let total_original_size = self.total_original_size();
        let total_converted_size = self.total_converted_size();
        let total_saved = self.total_saved();

        match self.archive {
            Some(archive) => BatchResponse {
                zip: Some(download_url(&self.id, &archive)),
                results: Some(self.results),
                files: None,
                batch_id: self.id,
                total_original_size,
                total_converted_size,
                total_saved,
            },
            None => {
                let files = self
                    .results
                    .into_iter()
                    .map(|mut r| {
                        r.url = Some(download_url(&self.id, &r.converted));
                        r
                    })
                    .collect();
                BatchResponse {
                    zip: None,
                    results: None,
                    files: Some(files),
                    batch_id: self.id,
                    total_original_size,
                    total_converted_size,
                    total_saved,
                }
            }
        }
    }
}

/// A staged input file waiting for conversion.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied name, base name only. Never used in a path.
    pub original_name: String,
    pub staged_path: PathBuf,
    pub size: u64,
}

/// Outcome of converting one uploaded file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub original: String,
    pub converted: String,
    pub original_size: u64,
    pub converted_size: u64,
    /// Never negative: a file that grew reports zero.
    pub saved: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ConversionResult {
    pub fn new(original: String, converted: String, original_size: u64, converted_size: u64) -> Self {
        Self {
            original,
            converted,
            original_size,
            converted_size,
            saved: original_size.saturating_sub(converted_size),
            url: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ConversionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ConversionResult>>,
    pub total_original_size: u64,
    pub total_converted_size: u64,
    pub total_saved: u64,
}

pub fn download_url(batch_id: &str, file_name: &str) -> String {
    format!("/download/{}/{}", batch_id, file_name)
}

/// Render a millisecond timestamp in lowercase base 36.
pub fn batch_id_from_millis(millis: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if millis == 0 {
        return "0".into();
    }
    let mut n = millis;
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Strip any client-side directory components from an uploaded name.
pub fn client_base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

fn stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    }
}

/// Swap the last extension of `file_name` for `ext`.
pub fn with_extension(file_name: &str, ext: &str) -> String {
    format!("{}.{}", stem(file_name), ext)
}

/// Like `with_extension`, with `-{n}` appended to the stem when `n > 0`.
pub fn with_numbered_extension(file_name: &str, ext: &str, n: u64) -> String {
    if n == 0 {
        return with_extension(file_name, ext);
    }
    format!("{}-{}.{}", stem(file_name), n, ext)
}

/// True when `segment` names an entry directly inside a directory.
pub fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
