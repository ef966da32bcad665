//! Archive extraction for data ingestion
//!
//! Members are streamed from the archive straight to disk, so extracting a
//! multi-hundred-megabyte member never holds it in memory. The functions here
//! are blocking; call them from `tokio::task::spawn_blocking`.
//!
//! ```rust,ignore
//! use netlog_server::ingest::common::decompression::extract_zip_members;
//!
//! let files = extract_zip_members(&archive, &["AM.dat", "EN.dat"], &scratch)?;
//! let am_path = &files["AM.dat"];
//! ```

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extract the named members of a zip archive into `dest_dir`
///
/// # Arguments
/// * `archive_path` - Zip archive on disk
/// * `members` - Member file names, matched on the last path component
/// * `dest_dir` - Directory receiving the extracted files
///
/// # Returns
/// HashMap of member name -> extracted file path
pub fn extract_zip_members(
    archive_path: &Path,
    members: &[&str],
    dest_dir: &Path,
) -> Result<HashMap<String, PathBuf>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).context("Failed to read zip archive")?;

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let mut result = HashMap::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry at index {}", i))?;

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let filename = name.rsplit('/').next().unwrap_or(&name).to_string();

        let Some(member) = members.iter().find(|m| **m == filename) else {
            continue;
        };

        let target = dest_dir.join(member);
        let mut out = BufWriter::new(
            File::create(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?,
        );
        let size = std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract zip entry: {}", filename))?;
        out.flush()?;

        debug!("Extracted {} ({} bytes)", filename, size);
        result.insert(member.to_string(), target);
    }

    if result.len() < members.len() {
        let missing: Vec<_> = members
            .iter()
            .filter(|m| !result.contains_key(**m))
            .collect();
        anyhow::bail!("Missing files in zip archive: {:?}", missing);
    }

    Ok(result)
}
