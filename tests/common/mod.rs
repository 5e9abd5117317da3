#![allow(dead_code)]

use marrow::{
    config::AppConfig,
    registry::{Package, Registry, Version},
    ModError, ModManager, ModResult,
};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// In-memory registry serving archives from local files.
#[derive(Default)]
pub struct FakeRegistry {
    packages: Mutex<Vec<Package>>,
    archives: Mutex<HashMap<String, PathBuf>>,
    fetched: Mutex<Vec<String>>,
    catalog_calls: Mutex<usize>,
}

impl FakeRegistry {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn catalog_calls(&self) -> usize {
        *self.catalog_calls.lock().unwrap()
    }

    pub fn add_version(&self, namespace: &str, name: &str, version: Version) {
        let mut packages = self.packages.lock().unwrap();
        match packages
            .iter_mut()
            .find(|package| package.namespace == namespace && package.name == name)
        {
            Some(package) => package.versions.insert(0, version),
            None => packages.push(Package {
                namespace: namespace.to_string(),
                name: name.to_string(),
                full_name: format!("{namespace}-{name}"),
                owner: namespace.to_string(),
                description: Some(format!("{name} for BONELAB")),
                icon: Some(format!("https://registry.test/{namespace}/{name}/icon.png")),
                versions: vec![version],
                ..Package::default()
            }),
        }
    }

    pub fn add_archive(&self, url: &str, path: &Path) {
        self.archives
            .lock()
            .unwrap()
            .insert(url.to_string(), path.to_path_buf());
    }
}

impl Registry for FakeRegistry {
    fn fetch_catalog(&self) -> ModResult<Vec<Package>> {
        *self.catalog_calls.lock().unwrap() += 1;
        Ok(self.packages.lock().unwrap().clone())
    }

    fn fetch_package(&self, namespace: &str, name: &str) -> ModResult<Package> {
        self.fetched
            .lock()
            .unwrap()
            .push(format!("{namespace}.{name}"));
        self.packages
            .lock()
            .unwrap()
            .iter()
            .find(|package| package.namespace == namespace && package.name == name)
            .cloned()
            .ok_or_else(|| ModError::Registry {
                status: Some(404),
                detail: "Not found.".to_string(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> ModResult<()> {
        let source = self.archives.lock().unwrap().get(url).cloned();
        let Some(source) = source else {
            return Err(ModError::Download {
                url: url.to_string(),
                detail: "HTTP 404".to_string(),
            });
        };
        fs::copy(&source, dest).map_err(|err| ModError::Download {
            url: url.to_string(),
            detail: err.to_string(),
        })?;
        Ok(())
    }
}

/// Temp game directory, data directory and registry wired together.
pub struct Fixture {
    _root: TempDir,
    pub game_dir: PathBuf,
    pub data_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub registry: Arc<FakeRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let game_dir = root.path().join("BONELAB");
        let data_dir = root.path().join("data");
        let archive_dir = root.path().join("archives");
        fs::create_dir_all(&game_dir).unwrap();
        fs::create_dir_all(&archive_dir).unwrap();
        Self {
            _root: root,
            game_dir,
            data_dir,
            archive_dir,
            registry: Arc::new(FakeRegistry::default()),
        }
    }

    /// Manager over this fixture with the game directory already set.
    pub fn manager(&self) -> ModManager {
        let mut manager = self.bare_manager();
        manager.set_game_directory(&self.game_dir).unwrap();
        manager
    }

    pub fn bare_manager(&self) -> ModManager {
        ModManager::with_registry(&self.data_dir, AppConfig::default(), self.registry.clone())
    }

    pub fn download_url(namespace: &str, name: &str, version: &str) -> String {
        format!("https://registry.test/{namespace}/{name}/{version}.zip")
    }

    /// Publishes a new newest version whose archive holds `files`.
    pub fn publish(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
        dependencies: &[&str],
        files: &[(&str, &str)],
    ) {
        let url = Self::download_url(namespace, name, version);
        let archive = self
            .archive_dir
            .join(format!("{namespace}-{name}-{version}.zip"));
        write_zip(&archive, files);
        self.registry.add_archive(&url, &archive);
        self.publish_without_archive(namespace, name, version, dependencies);
    }

    /// Publishes a version whose download will fail.
    pub fn publish_without_archive(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
        dependencies: &[&str],
    ) {
        self.registry.add_version(
            namespace,
            name,
            Version {
                name: Some(name.to_string()),
                version_number: version.to_string(),
                download_url: Self::download_url(namespace, name, version),
                dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
                downloads: 10,
                description: format!("{name} {version}"),
                icon: None,
            },
        );
    }

    /// Publishes a version whose archive is not a zip.
    pub fn publish_corrupt(&self, namespace: &str, name: &str, version: &str) {
        let url = Self::download_url(namespace, name, version);
        let archive = self.archive_dir.join(format!("{namespace}-{name}-{version}.zip"));
        fs::write(&archive, b"definitely not a zip").unwrap();
        self.registry.add_archive(&url, &archive);
        self.publish_without_archive(namespace, name, version, &[]);
    }

    pub fn game_file(&self, relative: &str) -> PathBuf {
        self.game_dir.join(relative)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, contents) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn relative_paths(installed: &marrow::state::InstalledMod) -> Vec<String> {
    installed
        .installed_files
        .iter()
        .map(|file| file.relative_path.clone())
        .collect()
}
