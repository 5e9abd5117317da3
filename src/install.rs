use crate::{
    archive::{self, ScratchDir},
    catalog::{self, Catalog},
    error::{ModError, ModResult},
    ident::{DependencyId, ModKey},
    registry::{Package, Version},
    state::{InstalledFile, InstalledMod, StateStore},
};
use std::{
    collections::HashSet,
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Dependencies starting with this are the mod loader itself, which is
/// managed outside this tool.
pub const MOD_LOADER_PREFIX: &str = "LavaGang-MelonLoader";
pub const MODS_DIR: &str = "Mods";
pub const PLUGINS_DIR: &str = "Plugins";

const ARCHIVE_NAME: &str = "package.zip";
const EXTRACT_DIR: &str = "extracted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlacementRoot {
    Mods,
    Plugins,
}

impl PlacementRoot {
    fn from_dir_name(name: &OsStr) -> Option<Self> {
        let name = name.to_str()?;
        if name.eq_ignore_ascii_case(MODS_DIR) {
            Some(PlacementRoot::Mods)
        } else if name.eq_ignore_ascii_case(PLUGINS_DIR) {
            Some(PlacementRoot::Plugins)
        } else {
            None
        }
    }

    fn dir_name(self) -> &'static str {
        match self {
            PlacementRoot::Mods => MODS_DIR,
            PlacementRoot::Plugins => PLUGINS_DIR,
        }
    }
}

struct Resolved {
    package: Package,
    version: Version,
    dependencies: Vec<String>,
}

struct Pending {
    key: ModKey,
    version: Option<String>,
    resolved: Option<Resolved>,
}

/// Installs packages and their missing dependencies into the game directory.
pub struct Installer<'a> {
    catalog: &'a Catalog,
    store: &'a mut StateStore,
    scratch_root: PathBuf,
    loader_prefix: String,
}

impl<'a> Installer<'a> {
    pub fn new(catalog: &'a Catalog, store: &'a mut StateStore, scratch_root: &Path) -> Self {
        Self {
            catalog,
            store,
            scratch_root: scratch_root.to_path_buf(),
            loader_prefix: MOD_LOADER_PREFIX.to_string(),
        }
    }

    pub fn with_loader_prefix(mut self, prefix: &str) -> Self {
        self.loader_prefix = prefix.to_string();
        self
    }

    /// Installs `namespace.name` at `version` (or the newest version).
    ///
    /// Missing dependencies are installed first at their newest versions.
    /// If a later step fails, dependencies that already finished stay
    /// installed.
    pub fn install(
        &mut self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> ModResult<InstalledMod> {
        let root = ModKey::new(namespace, name)?;
        if self.store.is_blacklisted(&root) {
            return Err(ModError::Blacklisted(root));
        }
        let game_dir = require_game_directory(self.store)?;

        let mut expanded: HashSet<ModKey> = HashSet::new();
        let mut stack = vec![Pending {
            key: root.clone(),
            version: version.map(str::to_string),
            resolved: None,
        }];

        while let Some(mut pending) = stack.pop() {
            let is_root = stack.is_empty();
            let Some(resolved) = pending.resolved.take() else {
                if !is_root
                    && (expanded.contains(&pending.key) || self.store.is_installed(&pending.key))
                {
                    continue;
                }
                if self.store.is_blacklisted(&pending.key) {
                    return Err(ModError::Blacklisted(pending.key));
                }
                let resolved = self.resolve(&pending.key, pending.version.as_deref())?;
                expanded.insert(pending.key.clone());
                let missing = self.missing_dependencies(&resolved, &expanded)?;
                stack.push(Pending {
                    resolved: Some(resolved),
                    ..pending
                });
                for key in missing.into_iter().rev() {
                    debug!(dependency = %key, "queueing dependency");
                    stack.push(Pending {
                        key,
                        version: None,
                        resolved: None,
                    });
                }
                continue;
            };

            let installed = self.install_resolved(&game_dir, &pending.key, resolved)?;
            if is_root {
                return Ok(installed);
            }
        }

        Err(ModError::NotFound(root.to_string()))
    }

    fn resolve(&self, key: &ModKey, version: Option<&str>) -> ModResult<Resolved> {
        let package = self
            .catalog
            .fetch_package(key.namespace(), key.name())
            .map_err(|err| match err {
                ModError::Registry { .. } => ModError::NotFound(format!("{key}: {err}")),
                other => other,
            })?;
        let version = select_version(&package, key, version)?.clone();
        let dependencies = version
            .dependencies
            .iter()
            .filter(|dep| !dep.starts_with(&self.loader_prefix))
            .cloned()
            .collect();
        Ok(Resolved {
            package,
            version,
            dependencies,
        })
    }

    fn missing_dependencies(
        &self,
        resolved: &Resolved,
        expanded: &HashSet<ModKey>,
    ) -> ModResult<Vec<ModKey>> {
        let mut missing = Vec::new();
        for raw in &resolved.dependencies {
            let dependency = DependencyId::parse(raw)?;
            let key = dependency.key().clone();
            if self.store.is_installed(&key) {
                debug!(
                    dependency = %key,
                    declared = dependency.version(),
                    "dependency already installed"
                );
                continue;
            }
            if expanded.contains(&key) || missing.contains(&key) {
                continue;
            }
            missing.push(key);
        }
        Ok(missing)
    }

    fn install_resolved(
        &mut self,
        game_dir: &Path,
        key: &ModKey,
        resolved: Resolved,
    ) -> ModResult<InstalledMod> {
        let Resolved {
            package,
            version,
            dependencies,
        } = resolved;
        let url = version.download_url.as_str();
        if url.is_empty() {
            return Err(ModError::Download {
                url: String::new(),
                detail: format!("{key} {} has no download url", version.version_number),
            });
        }

        let scratch = ScratchDir::create(&self.scratch_root, &key.to_string())?;
        let archive_path = scratch.path().join(ARCHIVE_NAME);
        info!(mod_key = %key, version = version.version_number.as_str(), "downloading");
        self.catalog.download(url, &archive_path)?;

        let extracted = scratch.path().join(EXTRACT_DIR);
        archive::extract_zip(&archive_path, &extracted)?;
        let installed_files = place_files(&extracted, game_dir)?;

        let author = if package.owner.is_empty() {
            "Unknown".to_string()
        } else {
            package.owner.clone()
        };
        let installed = InstalledMod {
            namespace: key.namespace().to_string(),
            name: key.name().to_string(),
            version: version.version_number.clone(),
            display_name: package.display_name(),
            author,
            summary: package.description(),
            download_url: version.download_url.clone(),
            icon: package.icon(),
            dependencies,
            installed_files,
        };
        self.store.record_installed_mod(installed.clone())?;
        info!(
            mod_key = %key,
            version = installed.version.as_str(),
            files = installed.installed_files.len(),
            "installed"
        );
        Ok(installed)
    }
}

/// Exact match when `requested` is given, otherwise the newest version.
pub fn select_version<'p>(
    package: &'p Package,
    key: &ModKey,
    requested: Option<&str>,
) -> ModResult<&'p Version> {
    match requested {
        Some(wanted) => package
            .versions
            .iter()
            .find(|candidate| candidate.version_number == wanted)
            .ok_or_else(|| ModError::VersionNotFound {
                key: key.clone(),
                version: wanted.to_string(),
            }),
        None => catalog::latest_version(package),
    }
}

/// Configured game directory, which must already exist.
pub fn require_game_directory(store: &StateStore) -> ModResult<PathBuf> {
    let game_dir = store
        .game_directory()
        .ok_or_else(|| ModError::Configuration("game directory not configured".to_string()))?;
    if !game_dir.is_dir() {
        return Err(ModError::Configuration(format!(
            "configured game directory {game_dir:?} does not exist"
        )));
    }
    Ok(game_dir.to_path_buf())
}

/// Copies an extracted package into `Mods/` and `Plugins/` under `game_dir`.
///
/// Any directory named `Mods` or `Plugins` (case-insensitive, any depth) has
/// its contents copied into the matching game subtree. When that copies
/// nothing, the whole tree goes into `Mods/`.
pub fn place_files(extracted: &Path, game_dir: &Path) -> ModResult<Vec<InstalledFile>> {
    for root in [MODS_DIR, PLUGINS_DIR] {
        let dir = game_dir.join(root);
        fs::create_dir_all(&dir).map_err(|err| ModError::io(&dir, err))?;
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(extracted).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(root) = PlacementRoot::from_dir_name(entry.file_name()) {
            candidates.push((entry.into_path(), root));
        }
    }

    let mut placed = PlacedFiles::new(game_dir);
    for (source, root) in &candidates {
        debug!(source = ?source, target = root.dir_name(), "placing candidate root");
        copy_tree(source, &game_dir.join(root.dir_name()), &mut placed)?;
    }
    if placed.is_empty() {
        debug!("no Mods/Plugins directories, placing whole archive under Mods");
        copy_tree(extracted, &game_dir.join(MODS_DIR), &mut placed)?;
    }
    Ok(placed.into_files())
}

struct PlacedFiles<'a> {
    game_dir: &'a Path,
    seen: HashSet<String>,
    files: Vec<InstalledFile>,
}

impl<'a> PlacedFiles<'a> {
    fn new(game_dir: &'a Path) -> Self {
        Self {
            game_dir,
            seen: HashSet::new(),
            files: Vec::new(),
        }
    }

    fn record(&mut self, target: &Path) {
        let Ok(relative) = target.strip_prefix(self.game_dir) else {
            return;
        };
        let relative = to_slash_path(relative);
        if self.seen.insert(relative.clone()) {
            self.files.push(InstalledFile {
                relative_path: relative,
            });
        }
    }

    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn into_files(self) -> Vec<InstalledFile> {
        self.files
    }
}

fn copy_tree(source: &Path, dest: &Path, placed: &mut PlacedFiles<'_>) -> ModResult<()> {
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| ModError::io(&target, err))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| ModError::io(parent, err))?;
            }
            fs::copy(entry.path(), &target).map_err(|err| ModError::io(&target, err))?;
            archive::preserve_mtime(entry.path(), &target);
            placed.record(&target);
        }
    }
    Ok(())
}

pub(crate) fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(err: walkdir::Error) -> ModError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    ModError::io(path, err.into())
}
