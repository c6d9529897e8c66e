use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::test_utils::in_dir;

/// Directory tree matching the canonical scenario:
/// out/test-example, conf/a.conf, docs/a.txt
fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    fs::create_dir_all(base.join("out")).unwrap();
    fs::create_dir_all(base.join("conf")).unwrap();
    fs::create_dir_all(base.join("docs")).unwrap();
    fs::write(base.join("out/test-example"), "#!/bin/sh\nexit 0\n").unwrap();
    fs::write(base.join("conf/a.conf"), "key=value\n").unwrap();
    fs::write(base.join("docs/a.txt"), "documentation\n").unwrap();
    tmp
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

fn build_fixture_manifest(base: &Path) -> Manifest {
    in_dir(base, || {
        let mut manifest = Manifest::new();
        manifest
            .add_files(&strings(&[
                "out/test-example=/usr/bin/test-example",
                "conf/=/etc/",
                "docs/=/usr/share/test/",
            ]))
            .unwrap();
        manifest
    })
}

#[test]
fn add_files_remaps_all_three_forms() {
    let tmp = fixture();
    let manifest = build_fixture_manifest(tmp.path());

    assert_eq!(manifest.len(), 3);
    let destinations: Vec<&str> =
        manifest.entries().iter().map(|e| e.destination.as_str()).collect();
    assert_eq!(
        destinations,
        vec!["/usr/bin/test-example", "/etc/a.conf", "/usr/share/test/a.txt"]
    );
    assert!(manifest.entries().iter().all(|e| e.role == Role::Regular));

    let entry = manifest.get("/etc/a.conf").unwrap();
    assert_eq!(entry.source, "conf/a.conf");
}

#[test]
fn add_files_without_dest_roots_at_slash() {
    let tmp = fixture();
    let manifest = in_dir(tmp.path(), || {
        let mut manifest = Manifest::new();
        manifest.add_files(&strings(&["conf/"])).unwrap();
        manifest
    });
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.entries()[0].destination, "/conf/a.conf");
    assert_eq!(manifest.entries()[0].source, "conf/a.conf");
}

#[test]
fn remap_round_trip_for_directory_root() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("out")).unwrap();
    fs::write(tmp.path().join("out/test-example"), "").unwrap();

    let manifest = in_dir(tmp.path(), || {
        let mut manifest = Manifest::new();
        manifest.add_files(&strings(&["out/=/usr/bin/"])).unwrap();
        manifest
    });
    assert_eq!(manifest.entries()[0].destination, "/usr/bin/test-example");
}

#[test]
fn more_than_one_equals_is_invalid() {
    let mut manifest = Manifest::new();
    let err = manifest.add_files(&strings(&["a=b=c"])).unwrap_err();
    assert!(matches!(err, PakrError::InvalidMapping { .. }));
}

#[test]
fn duplicate_destination_fails_regardless_of_order() {
    let tmp = fixture();
    in_dir(tmp.path(), || {
        // Same source expanded twice to the same destination.
        let mut manifest = Manifest::new();
        let err = manifest
            .add_files(&strings(&["conf/=/etc/", "conf/a.conf=/etc/a.conf"]))
            .unwrap_err();
        assert!(matches!(
            err,
            PakrError::DuplicateDestination { ref destination } if destination == "/etc/a.conf"
        ));

        // Other insertion order, same failure.
        let mut manifest = Manifest::new();
        let err = manifest
            .add_files(&strings(&["conf/a.conf=/etc/a.conf", "conf/=/etc/"]))
            .unwrap_err();
        assert!(matches!(err, PakrError::DuplicateDestination { .. }));
    });
}

#[test]
fn symlinks_insert_with_role_and_reject_collisions() {
    let tmp = fixture();
    let mut manifest = build_fixture_manifest(tmp.path());

    manifest
        .add_symlinks(&strings(&["/usr/bin/test-example=/usr/bin/test-link"]))
        .unwrap();
    let link = manifest.get("/usr/bin/test-link").unwrap();
    assert_eq!(link.role, Role::Symlink);
    assert_eq!(link.source, "/usr/bin/test-example");

    // A second symlink onto the same link path must fail, even with a
    // different target.
    let err = manifest
        .add_symlinks(&strings(&["/usr/bin/test-noexist=/usr/bin/test-link"]))
        .unwrap_err();
    assert!(matches!(err, PakrError::SymlinkDestinationExists { .. }));

    // A symlink may not shadow a regular file either.
    let err = manifest
        .add_symlinks(&strings(&["/anything=/usr/bin/test-example"]))
        .unwrap_err();
    assert!(matches!(err, PakrError::SymlinkDestinationExists { .. }));
}

#[test]
fn symlink_without_equals_is_invalid() {
    let mut manifest = Manifest::new();
    let err = manifest.add_symlinks(&strings(&["/usr/bin/test-link"])).unwrap_err();
    assert!(matches!(err, PakrError::InvalidMapping { .. }));
}

#[test]
fn mark_role_matches_exact_and_prefix_with_separator_boundary() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    fs::create_dir_all(base.join("etc/sub")).unwrap();
    fs::create_dir_all(base.join("other")).unwrap();
    fs::write(base.join("etc/foo.conf"), "").unwrap();
    fs::write(base.join("etc/sub/bar.conf"), "").unwrap();
    fs::write(base.join("other/etcfoo"), "").unwrap();

    let mut manifest = in_dir(base, || {
        let mut manifest = Manifest::new();
        manifest
            .add_files(&strings(&["etc/=/etc/", "other/etcfoo=/etcfoo"]))
            .unwrap();
        manifest
    });

    manifest.mark_role(&strings(&["/etc"]), Role::Config);
    assert_eq!(manifest.get("/etc/foo.conf").unwrap().role, Role::Config);
    assert_eq!(manifest.get("/etc/sub/bar.conf").unwrap().role, Role::Config);
    // No separator boundary crossing.
    assert_eq!(manifest.get("/etcfoo").unwrap().role, Role::Regular);

    // Exact destination match works too.
    manifest.mark_role(&strings(&["/etcfoo"]), Role::Doc);
    assert_eq!(manifest.get("/etcfoo").unwrap().role, Role::Doc);
}

#[test]
fn classification_is_first_write_wins() {
    let tmp = fixture();
    let mut manifest = build_fixture_manifest(tmp.path());
    manifest
        .add_symlinks(&strings(&["/usr/bin/test-example=/etc/alias"]))
        .unwrap();

    // Covers /etc/alias, but the symlink role was assigned first.
    manifest.mark_role(&strings(&["/etc"]), Role::Config);
    assert_eq!(manifest.get("/etc/alias").unwrap().role, Role::Symlink);
    assert_eq!(manifest.get("/etc/a.conf").unwrap().role, Role::Config);

    // A later doc pass over the same paths is a no-op for classified entries.
    manifest.mark_role(&strings(&["/etc"]), Role::Doc);
    assert_eq!(manifest.get("/etc/a.conf").unwrap().role, Role::Config);

    // Idempotent for repeated calls with the same role.
    manifest.mark_role(&strings(&["/etc"]), Role::Config);
    assert_eq!(manifest.get("/etc/a.conf").unwrap().role, Role::Config);
}

#[test]
fn config_then_doc_marking_scenario() {
    let tmp = fixture();
    let mut manifest = build_fixture_manifest(tmp.path());

    manifest.mark_role(&strings(&["/etc"]), Role::Config);
    manifest.mark_role(&strings(&["/usr/share/test/a.txt"]), Role::Doc);

    assert_eq!(manifest.get("/etc/a.conf").unwrap().role, Role::Config);
    assert_eq!(manifest.get("/usr/share/test/a.txt").unwrap().role, Role::Doc);
    assert_eq!(manifest.get("/usr/bin/test-example").unwrap().role, Role::Regular);
}

#[test]
fn infer_role_paths_is_explicit_policy() {
    let tmp = fixture();
    let manifest = build_fixture_manifest(tmp.path());

    assert_eq!(manifest.infer_role_paths("/etc"), Some(vec!["/etc".to_string()]));
    assert_eq!(
        manifest.infer_role_paths("/usr/share"),
        Some(vec!["/usr/share".to_string()])
    );
    assert_eq!(manifest.infer_role_paths("/opt"), None);
}

#[test]
fn rebase_sources_leaves_absolute_and_symlink_sources() {
    let tmp = fixture();
    let mut manifest = build_fixture_manifest(tmp.path());
    manifest
        .add_symlinks(&strings(&["relative/target=/usr/bin/test-link"]))
        .unwrap();

    manifest.rebase_sources("build");
    assert_eq!(manifest.get("/etc/a.conf").unwrap().source, "build/conf/a.conf");
    assert_eq!(
        manifest.get("/usr/bin/test-example").unwrap().source,
        "build/out/test-example"
    );
    // Symlink targets are package paths, not search-directory paths.
    assert_eq!(manifest.get("/usr/bin/test-link").unwrap().source, "relative/target");
}

#[test]
fn empty_manifest_is_rejected() {
    let manifest = Manifest::new();
    assert!(matches!(manifest.validate(), Err(PakrError::EmptyManifest)));

    let tmp = fixture();
    let manifest = build_fixture_manifest(tmp.path());
    assert!(manifest.validate().is_ok());
}

#[test]
fn manifest_size_is_sum_of_expansions() {
    let tmp = fixture();
    let manifest = in_dir(tmp.path(), || {
        let mut manifest = Manifest::new();
        manifest
            .add_files(&strings(&["out/=/usr/bin/", "conf/=/etc/", "docs/=/usr/share/test/"]))
            .unwrap();
        manifest
    });
    // One file per directory in the fixture.
    assert_eq!(manifest.len(), 3);
}

#[test]
fn role_display_names() {
    assert_eq!(Role::Regular.to_string(), "regular");
    assert_eq!(Role::Config.to_string(), "config");
    assert_eq!(Role::Doc.to_string(), "doc");
    assert_eq!(Role::Symlink.to_string(), "symlink");
}
