use crate::error::{ModError, ModResult};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use tracing::debug;

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Private working directory, removed with everything in it on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path, label: &str) -> ModResult<Self> {
        let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let name = format!("install-{nanos}-{counter}-{}", sanitize_label(label));
        let path = root.join(name);
        fs::create_dir_all(&path).map_err(|err| ModError::io(&path, err))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Unpacks every entry of the zip at `path` below `dest`.
///
/// Entries whose names would land outside `dest` are skipped.
pub fn extract_zip(path: &Path, dest: &Path) -> ModResult<()> {
    let failed = |detail: String| ModError::Extraction {
        path: path.to_path_buf(),
        detail,
    };

    fs::create_dir_all(dest).map_err(|err| ModError::io(dest, err))?;
    let file = fs::File::open(path).map_err(|err| failed(format!("open archive: {err}")))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| failed(format!("read archive: {err}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| failed(format!("entry {i}: {err}")))?;
        let Some(relative) = entry.enclosed_name() else {
            debug!(entry = entry.name(), "skipping unsafe archive entry");
            continue;
        };

        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|err| failed(format!("create dir: {err}")))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|err| failed(format!("create dir: {err}")))?;
        }

        let mut out_file = fs::File::create(&out_path)
            .map_err(|err| failed(format!("create {out_path:?}: {err}")))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|err| failed(format!("extract {out_path:?}: {err}")))?;
        if let Some(mtime) = entry.last_modified().and_then(zip_time_to_unix) {
            let _ = set_file_mtime(&out_path, FileTime::from_unix_time(mtime, 0));
        }
    }

    Ok(())
}

/// Copies the modification time of `source` onto `dest`, best effort.
pub fn preserve_mtime(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let _ = set_file_mtime(dest, FileTime::from_last_modification_time(&meta));
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

fn sanitize_label(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
