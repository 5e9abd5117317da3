mod common;

use common::Fixture;
use marrow::{state::InstalledMod, ModError};
use pretty_assertions::assert_eq;

fn publish_listing(fixture: &Fixture) {
    fixture.publish("Team", "Alpha", "1.0.0", &[], &[("Mods/alpha.dll", "a")]);
    fixture.publish("Team", "Beta", "1.0.0", &[], &[("Mods/beta.dll", "b")]);
    fixture.publish("Lib", "Core", "1.0.0", &[], &[("Mods/core.dll", "c")]);
    fixture.publish("Lib", "Core", "1.2.0", &[], &[("Mods/core.dll", "c2")]);
}

#[test]
fn listing_pages_over_the_cached_catalog() {
    let fixture = Fixture::new();
    publish_listing(&fixture);
    let manager = fixture.bare_manager();

    let first = manager.list_mods(None, 2, 0).unwrap();
    let rest = manager.list_mods(None, 2, 2).unwrap();

    let names: Vec<_> = first.iter().chain(&rest).map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Core"]);
    assert_eq!(rest[0].latest_version, "1.2.0");
    assert!(manager.list_mods(None, 10, 10).unwrap().is_empty());
    assert_eq!(fixture.registry.catalog_calls(), 1);
}

#[test]
fn search_matches_owner_and_name_case_insensitively() {
    let fixture = Fixture::new();
    publish_listing(&fixture);
    let manager = fixture.bare_manager();

    let by_owner = manager.list_mods(Some("lib"), 50, 0).unwrap();
    assert_eq!(by_owner.len(), 1);
    assert_eq!(by_owner[0].name, "Core");

    let by_name = manager.list_mods(Some("BETA"), 50, 0).unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].namespace, "Team");

    assert!(manager.list_mods(Some("nothing-like-this"), 50, 0).unwrap().is_empty());
}

#[test]
fn detail_lists_dependency_keys_without_the_loader() {
    let fixture = Fixture::new();
    fixture.publish("Lib", "Core", "1.0.0", &[], &[("Mods/core.dll", "c")]);
    fixture.publish(
        "Team",
        "Alpha",
        "1.0.0",
        &["LavaGang-MelonLoader-0.6.1", "Lib-Core-1.0.0"],
        &[("Mods/alpha.dll", "a")],
    );
    let manager = fixture.bare_manager();

    let detail = manager.mod_detail("Team", "Alpha").unwrap();

    assert_eq!(detail.summary.name, "Alpha");
    assert_eq!(detail.dependencies, vec!["Lib.Core"]);
    assert_eq!(detail.versions.len(), 1);
    assert_eq!(detail.description, "Alpha 1.0.0");
}

#[test]
fn detail_of_unknown_package_is_not_found() {
    let fixture = Fixture::new();
    let manager = fixture.bare_manager();

    let err = manager.mod_detail("Nobody", "Ghost").unwrap_err();

    assert!(matches!(err, ModError::NotFound(_)));
}

#[test]
fn no_notice_when_installed_version_is_current() {
    let fixture = Fixture::new();
    fixture.publish("Team", "Alpha", "1.0.0", &[], &[("Mods/alpha.dll", "a")]);
    let mut manager = fixture.manager();
    manager.install("Team", "Alpha", None).unwrap();

    assert!(manager.notifications().is_empty());
}

#[test]
fn newer_registry_version_produces_one_notice() {
    let fixture = Fixture::new();
    fixture.publish("Team", "Alpha", "1.0.0", &[], &[("Mods/alpha.dll", "a")]);
    let mut manager = fixture.manager();
    manager.install("Team", "Alpha", None).unwrap();
    fixture.publish("Team", "Alpha", "1.1.0", &[], &[("Mods/alpha.dll", "a2")]);

    let notices = manager.notifications();

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].namespace, "Team");
    assert_eq!(notices[0].name, "Alpha");
    assert_eq!(notices[0].current_version, "1.0.0");
    assert_eq!(notices[0].latest_version, "1.1.0");
}

#[test]
fn unreachable_packages_are_left_out_of_notices() {
    let fixture = Fixture::new();
    fixture.publish("Team", "Alpha", "1.0.0", &[], &[("Mods/alpha.dll", "a")]);
    let mut manager = fixture.manager();
    manager.install("Team", "Alpha", None).unwrap();
    fixture.publish("Team", "Alpha", "2.0.0", &[], &[("Mods/alpha.dll", "a2")]);

    let catalog = marrow::catalog::Catalog::new(fixture.registry.clone());
    let orphan = InstalledMod {
        namespace: "Gone".to_string(),
        name: "Delisted".to_string(),
        version: "0.1.0".to_string(),
        ..manager.installed_mod("Team", "Alpha").unwrap().unwrap()
    };
    let mut installed = manager.installed_mods();
    installed.push(orphan);

    let notices = marrow::notify::update_notices(&catalog, &installed);

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].name, "Alpha");
}
