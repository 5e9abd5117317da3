use crate::{
    catalog::{self, Catalog},
    state::InstalledMod,
};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotice {
    pub namespace: String,
    pub name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub current_version: String,
    pub latest_version: String,
}

/// One notice per installed mod whose registry version moved on.
///
/// Mods the registry cannot answer for are left out rather than failing
/// the whole batch.
pub fn update_notices(catalog: &Catalog, installed: &[InstalledMod]) -> Vec<UpdateNotice> {
    installed
        .iter()
        .filter_map(|installed| notice_for(catalog, installed))
        .collect()
}

fn notice_for(catalog: &Catalog, installed: &InstalledMod) -> Option<UpdateNotice> {
    let package = match catalog.fetch_package(&installed.namespace, &installed.name) {
        Ok(package) => package,
        Err(err) => {
            debug!(
                namespace = installed.namespace.as_str(),
                name = installed.name.as_str(),
                error = %err,
                "skipping update check"
            );
            return None;
        }
    };
    let latest = catalog::latest_version(&package).ok()?;
    if latest.version_number.is_empty() || latest.version_number == installed.version {
        return None;
    }

    let display_name = match package.display_name() {
        name if name.is_empty() => installed.display_name.clone(),
        name => name,
    };
    Some(UpdateNotice {
        namespace: installed.namespace.clone(),
        name: installed.name.clone(),
        display_name,
        icon: package.icon().or_else(|| installed.icon.clone()),
        current_version: installed.version.clone(),
        latest_version: latest.version_number.clone(),
    })
}
