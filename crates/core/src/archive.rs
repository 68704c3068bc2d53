use crate::error::IndexError;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub fn export_index(index_dir: &Path, archive_path: &Path) -> Result<usize, IndexError> {
    if !index_dir.is_dir() {
        return Err(IndexError::NotFound(index_dir.to_path_buf()));
    }

    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written = 0;

    for entry in WalkDir::new(index_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == archive_path {
            continue;
        }

        let relative = path
            .strip_prefix(index_dir)
            .map_err(|_| io::Error::other(format!("{} is outside the index", path.display())))?;
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
            written += 1;
        } else if entry.file_type().is_dir() && !name.is_empty() {
            zip.add_directory(format!("{name}/"), options)?;
        }
    }

    zip.finish()?;
    info!(
        index = %index_dir.display(),
        archive = %archive_path.display(),
        files = written,
        "index exported"
    );
    Ok(written)
}

pub fn import_index(archive_path: &Path, dest_dir: &Path) -> Result<usize, IndexError> {
    if !archive_path.is_file() {
        return Err(IndexError::NotFound(archive_path.to_path_buf()));
    }

    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    fs::create_dir_all(dest_dir)?;
    let mut extracted = 0;

    for position in 0..archive.len() {
        let mut entry = archive.by_index(position)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| IndexError::UnsafeArchiveEntry(entry.name().to_string()))?;
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut entry, &mut File::create(&target)?)?;
        extracted += 1;
    }

    info!(
        archive = %archive_path.display(),
        index = %dest_dir.display(),
        files = extracted,
        "index imported"
    );
    Ok(extracted)
}
