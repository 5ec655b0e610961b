use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use zip::read::ZipArchive;

/// Unpack every entry of the zip at `archive_path` under `dest`, returning the number of files.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, String> {
    info!(
        "install: extracting {} into {}",
        archive_path.display(),
        dest.display()
    );
    let file = fs::File::open(archive_path).map_err(|e| format!("zip open error: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))?;
    fs::create_dir_all(dest).map_err(|e| format!("staging dir create error: {e}"))?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| format!("zip entry escapes the archive root: {}", entry.name()))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        let mut out_file =
            fs::File::create(&out_path).map_err(|e| format!("zip create file error: {e}"))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| format!("zip write error: {e}"))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| format!("zip permission error: {e}"))?;
        }
        files += 1;
    }

    debug!("install: extracted {files} files");
    Ok(files)
}

/// Write a zip for tests. Names ending in `/` become directories.
#[cfg(test)]
pub(crate) fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    let file = fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap();
        } else {
            let options = if name.ends_with(".py") || name.ends_with(".sh") {
                SimpleFileOptions::default().unix_permissions(0o755)
            } else {
                SimpleFileOptions::default().unix_permissions(0o644)
            };
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
    }
    writer.finish().unwrap();
}
