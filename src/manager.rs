use crate::{
    catalog::Catalog,
    config::AppConfig,
    error::{ModError, ModResult},
    ident::{DependencyId, ModKey},
    install::Installer,
    notify::{self, UpdateNotice},
    registry::{HttpRegistry, Package, Registry, Version},
    state::{InstalledMod, StateStore, STATE_FILE_NAME},
    uninstall::{self, UninstallReport},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

pub const DEFAULT_PAGE_SIZE: usize = 50;
const SCRATCH_DIR_NAME: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModSummary {
    pub namespace: String,
    pub name: String,
    pub display_name: String,
    pub summary: String,
    pub owner: String,
    pub icon: Option<String>,
    pub downloads: u64,
    pub latest_version: String,
}

impl ModSummary {
    fn from_package(package: &Package) -> Self {
        let newest = package.newest();
        Self {
            namespace: package.namespace.clone(),
            name: package.name.clone(),
            display_name: package.display_name(),
            summary: package.description(),
            owner: package.owner.clone(),
            icon: package.icon(),
            downloads: newest.map(|version| version.downloads).unwrap_or_default(),
            latest_version: newest
                .map(|version| version.version_number.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModDetail {
    #[serde(flatten)]
    pub summary: ModSummary,
    pub description: String,
    /// `namespace.name` keys of the newest version's dependencies, without
    /// the mod loader.
    pub dependencies: Vec<String>,
    pub versions: Vec<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub game_directory: Option<PathBuf>,
}

/// Request surface over one state file and one registry.
pub struct ModManager {
    config: AppConfig,
    data_dir: PathBuf,
    catalog: Catalog,
    store: StateStore,
}

impl ModManager {
    pub fn open(data_dir: &Path, config: AppConfig) -> Self {
        let registry = Arc::new(HttpRegistry::new(config.registry_options()));
        Self::with_registry(data_dir, config, registry)
    }

    pub fn with_registry(data_dir: &Path, config: AppConfig, registry: Arc<dyn Registry>) -> Self {
        let store = StateStore::load(data_dir.join(STATE_FILE_NAME));
        Self {
            config,
            data_dir: data_dir.to_path_buf(),
            catalog: Catalog::new(registry),
            store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn state_path(&self) -> &Path {
        self.store.path()
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join(SCRATCH_DIR_NAME)
    }

    pub fn list_mods(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> ModResult<Vec<ModSummary>> {
        let packages = self.catalog.search(search)?;
        Ok(packages
            .iter()
            .skip(offset)
            .take(limit)
            .map(ModSummary::from_package)
            .collect())
    }

    pub fn mod_detail(&self, namespace: &str, name: &str) -> ModResult<ModDetail> {
        let key = ModKey::new(namespace, name)?;
        let package = self
            .catalog
            .fetch_package(namespace, name)
            .map_err(|err| match err {
                ModError::Registry { .. } => ModError::NotFound(format!("{key}: {err}")),
                other => other,
            })?;
        let newest = package.newest();
        let dependencies = newest
            .map(|version| {
                version
                    .dependencies
                    .iter()
                    .filter(|dep| !dep.starts_with(&self.config.mod_loader_prefix))
                    .map(|dep| match DependencyId::parse(dep) {
                        Ok(parsed) => parsed.key().to_string(),
                        Err(_) => dep.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ModDetail {
            summary: ModSummary::from_package(&package),
            description: newest
                .map(|version| version.description.clone())
                .unwrap_or_default(),
            dependencies,
            versions: package.versions.clone(),
        })
    }

    pub fn install(
        &mut self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> ModResult<InstalledMod> {
        let scratch = self.scratch_dir();
        Installer::new(&self.catalog, &mut self.store, &scratch)
            .with_loader_prefix(&self.config.mod_loader_prefix)
            .install(namespace, name, version)
    }

    pub fn uninstall(
        &mut self,
        namespace: &str,
        name: &str,
    ) -> ModResult<Option<(InstalledMod, UninstallReport)>> {
        uninstall::uninstall(&mut self.store, namespace, name)
    }

    /// Blocks future installs of the mod. An installed copy stays installed.
    pub fn blacklist(&mut self, namespace: &str, name: &str) -> ModResult<()> {
        let key = ModKey::new(namespace, name)?;
        self.store.add_to_blacklist(&key)?;
        info!(mod_key = %key, "blacklisted");
        Ok(())
    }

    pub fn whitelist(&mut self, namespace: &str, name: &str) -> ModResult<()> {
        let key = ModKey::new(namespace, name)?;
        self.store.remove_from_blacklist(&key)?;
        info!(mod_key = %key, "whitelisted");
        Ok(())
    }

    pub fn blacklisted(&self) -> Vec<ModKey> {
        self.store.blacklisted()
    }

    pub fn installed_mods(&self) -> Vec<InstalledMod> {
        self.store.installed_mods()
    }

    pub fn installed_mod(&self, namespace: &str, name: &str) -> ModResult<Option<InstalledMod>> {
        let key = ModKey::new(namespace, name)?;
        Ok(self.store.installed_mod(&key).cloned())
    }

    /// Points installs at an existing directory, stored as an absolute
    /// canonical path. Never creates it.
    pub fn set_game_directory(&mut self, path: &Path) -> ModResult<()> {
        if !path.is_dir() {
            return Err(ModError::Configuration(format!(
                "game directory {path:?} does not exist"
            )));
        }
        let path = fs::canonicalize(path).map_err(|err| ModError::io(path, err))?;
        self.store.set_game_directory(Some(path.clone()))?;
        info!(path = ?path, "game directory set");
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            game_directory: self.store.game_directory().map(Path::to_path_buf),
        }
    }

    pub fn notifications(&self) -> Vec<UpdateNotice> {
        notify::update_notices(&self.catalog, &self.store.installed_mods())
    }
}
