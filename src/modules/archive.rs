//! Gzipped tarball extraction.
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::FetchError;

fn extract_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Extract(e.to_string())
}

/// Unpack a `.tar.gz` stream into `dest`, dropping the first path component.
///
/// Source tarballs wrap their content in a single top-level directory
/// (`repo-<sha>/`); stripping it makes `dest` the repository root.  Entries
/// that would land outside `dest` are rejected.  Returns the number of
/// entries written.
///
/// # Errors
///
/// Returns [`FetchError::Extract`] on malformed archives, unsafe paths, or
/// write failures.
pub fn unpack_tar_gz(reader: impl Read, dest: &Path) -> Result<usize, FetchError> {
    std::fs::create_dir_all(dest).map_err(extract_err)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.set_preserve_permissions(true);

    let mut count = 0;
    for entry in archive.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        if matches!(
            entry.header().entry_type(),
            EntryType::XGlobalHeader | EntryType::XHeader
        ) {
            continue;
        }
        let path = entry.path().map_err(extract_err)?.into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        if !stripped
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(FetchError::Extract(format!(
                "entry '{}' escapes the extraction directory",
                path.display()
            )));
        }

        let dest_path = dest.join(&stripped);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(extract_err)?;
        }
        entry.unpack(&dest_path).map_err(|e| {
            FetchError::Extract(format!("{}: {e}", stripped.display()))
        })?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, body.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn strips_top_level_directory() {
        let bytes = tarball(&[("repo-abc/init.lua", "x"), ("repo-abc/lua/a.lua", "y")]);
        let dest = tempfile::tempdir().unwrap();
        let n = unpack_tar_gz(bytes.as_slice(), dest.path()).unwrap();
        assert_eq!(n, 2);
        assert_eq!(std::fs::read_to_string(dest.path().join("init.lua")).unwrap(), "x");
        assert_eq!(std::fs::read_to_string(dest.path().join("lua/a.lua")).unwrap(), "y");
    }

    #[test]
    fn garbage_is_extract_error() {
        let dest = tempfile::tempdir().unwrap();
        let err = unpack_tar_gz(&b"not a tarball"[..], dest.path()).unwrap_err();
        assert!(matches!(err, FetchError::Extract(_)));
    }
}
