use crate::{
    error::{ModError, ModResult},
    registry::{Package, Registry, Version},
};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

/// Registry front with a process-lifetime cache of the package listing.
pub struct Catalog {
    registry: Arc<dyn Registry>,
    cache: Mutex<Option<Arc<Vec<Package>>>>,
}

impl Catalog {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(None),
        }
    }

    /// Full listing. Only successful fetches are cached.
    pub fn fetch_catalog(&self) -> ModResult<Arc<Vec<Package>>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(packages) = cache.as_ref() {
            return Ok(Arc::clone(packages));
        }
        let packages = Arc::new(self.registry.fetch_catalog()?);
        info!(count = packages.len(), "catalog fetched");
        *cache = Some(Arc::clone(&packages));
        Ok(packages)
    }

    pub fn search(&self, query: Option<&str>) -> ModResult<Vec<Package>> {
        let packages = self.fetch_catalog()?;
        let needle = match query.map(str::trim) {
            Some(value) if !value.is_empty() => value.to_lowercase(),
            _ => return Ok(packages.as_ref().clone()),
        };
        let matches: Vec<Package> = packages
            .iter()
            .filter(|package| matches_query(package, &needle))
            .cloned()
            .collect();
        debug!(query = needle.as_str(), hits = matches.len(), "catalog search");
        Ok(matches)
    }

    /// Always goes to the registry; the listing cache is not consulted.
    pub fn fetch_package(&self, namespace: &str, name: &str) -> ModResult<Package> {
        self.registry.fetch_package(namespace, name)
    }

    pub fn download(&self, url: &str, dest: &Path) -> ModResult<()> {
        self.registry.download(url, dest)
    }
}

pub fn latest_version(package: &Package) -> ModResult<&Version> {
    package
        .newest()
        .ok_or_else(|| ModError::EmptyCatalog(package.full_name.clone()))
}

fn matches_query(package: &Package, needle: &str) -> bool {
    let latest_description = package
        .newest()
        .map(|version| version.description.as_str())
        .unwrap_or_default();
    [
        package.name.as_str(),
        package.full_name.as_str(),
        package.owner.as_str(),
        latest_description,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ListingRegistry {
        packages: Vec<Package>,
        calls: AtomicUsize,
    }

    impl Registry for ListingRegistry {
        fn fetch_catalog(&self) -> ModResult<Vec<Package>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.packages.clone())
        }

        fn fetch_package(&self, namespace: &str, name: &str) -> ModResult<Package> {
            self.packages
                .iter()
                .find(|package| package.namespace == namespace && package.name == name)
                .cloned()
                .ok_or_else(|| ModError::Registry {
                    status: Some(404),
                    detail: "Not found.".to_string(),
                })
        }

        fn download(&self, url: &str, _dest: &Path) -> ModResult<()> {
            Err(ModError::Download {
                url: url.to_string(),
                detail: "offline".to_string(),
            })
        }
    }

    fn package(owner: &str, name: &str, description: &str) -> Package {
        Package {
            namespace: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{owner}-{name}"),
            owner: owner.to_string(),
            versions: vec![Version {
                version_number: "1.0.0".to_string(),
                description: description.to_string(),
                ..Version::default()
            }],
            ..Package::default()
        }
    }

    fn catalog() -> (Arc<ListingRegistry>, Catalog) {
        let registry = Arc::new(ListingRegistry {
            packages: vec![
                package("Lakatrazz", "Fusion", "Multiplayer for BONELAB"),
                package("notnotnotswipez", "Spiderman", "Web swinging"),
                package("Maranara", "Marrow_Cauldron", "Custom maps and MULTIPLAYER fixes"),
            ],
            calls: AtomicUsize::new(0),
        });
        let catalog = Catalog::new(registry.clone());
        (registry, catalog)
    }

    #[test]
    fn search_without_query_returns_everything_in_order() {
        let (_, catalog) = catalog();
        let names: Vec<String> = catalog
            .search(None)
            .unwrap()
            .into_iter()
            .map(|package| package.name)
            .collect();
        assert_eq!(names, vec!["Fusion", "Spiderman", "Marrow_Cauldron"]);
        assert_eq!(catalog.search(Some("   ")).unwrap().len(), 3);
    }

    #[test]
    fn search_matches_description_case_insensitively() {
        let (_, catalog) = catalog();
        let names: Vec<String> = catalog
            .search(Some("multiplayer"))
            .unwrap()
            .into_iter()
            .map(|package| package.name)
            .collect();
        assert_eq!(names, vec!["Fusion", "Marrow_Cauldron"]);
    }

    #[test]
    fn search_matches_owner_and_full_name() {
        let (_, catalog) = catalog();
        assert_eq!(catalog.search(Some("NOTNOT")).unwrap().len(), 1);
        assert_eq!(catalog.search(Some("lakatrazz-fus")).unwrap().len(), 1);
        assert!(catalog.search(Some("nothing-here")).unwrap().is_empty());
    }

    #[test]
    fn listing_is_fetched_once() {
        let (registry, catalog) = catalog();
        catalog.search(Some("fusion")).unwrap();
        catalog.search(None).unwrap();
        catalog.fetch_catalog().unwrap();
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latest_version_of_empty_package_fails() {
        let empty = Package {
            name: "Empty".to_string(),
            full_name: "Nobody-Empty".to_string(),
            ..Package::default()
        };
        assert!(matches!(latest_version(&empty), Err(ModError::EmptyCatalog(_))));
        let full = package("Lakatrazz", "Fusion", "");
        assert_eq!(latest_version(&full).unwrap().version_number, "1.0.0");
    }
}
