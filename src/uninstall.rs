use crate::{
    error::{ModError, ModResult},
    ident::ModKey,
    install::require_game_directory,
    state::{InstalledMod, StateStore},
};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: usize,
    pub missing: usize,
    pub skipped: usize,
}

/// Drops the record for `namespace.name` and deletes the files it lists.
///
/// Returns `Ok(None)` without touching the filesystem when the mod was not
/// installed. A configured game directory that is missing on disk is an
/// error and keeps the record. Files already gone are counted, not reported
/// as errors.
pub fn uninstall(
    store: &mut StateStore,
    namespace: &str,
    name: &str,
) -> ModResult<Option<(InstalledMod, UninstallReport)>> {
    let key = ModKey::new(namespace, name)?;
    if !store.is_installed(&key) {
        debug!(mod_key = %key, "uninstall of a mod that is not installed");
        return Ok(None);
    }
    let game_dir = match store.game_directory() {
        Some(_) => Some(require_game_directory(store)?),
        None => None,
    };
    let Some(removed) = store.remove_installed_mod(&key)? else {
        return Ok(None);
    };

    let mut report = UninstallReport::default();
    let Some(game_dir) = game_dir else {
        warn!(mod_key = %key, "no game directory configured, leaving files in place");
        return Ok(Some((removed, report)));
    };

    for file in &removed.installed_files {
        let Some(target) = resolve_inside(&game_dir, &file.relative_path) else {
            warn!(
                path = file.relative_path.as_str(),
                "refusing to remove path outside the game directory"
            );
            report.skipped += 1;
            continue;
        };
        if !target.is_file() {
            report.missing += 1;
            continue;
        }
        match fs::remove_file(&target) {
            Ok(()) => report.removed += 1,
            Err(err) => return Err(ModError::io(&target, err)),
        }
    }

    info!(
        mod_key = %key,
        removed = report.removed,
        missing = report.missing,
        "uninstalled"
    );
    Ok(Some((removed, report)))
}

/// Joins a recorded relative path onto `root`, rejecting anything that
/// could point outside it.
fn resolve_inside(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut target = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if target == root {
        return None;
    }
    Some(target)
}
