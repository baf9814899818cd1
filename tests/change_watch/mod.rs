use std::fs;

use devgate::ChangeCategory;
use devgate::ChangeKind;
use devgate::ChangeWatcher;
use devgate::ClassifierConfig;
use devgate::ImpactLevel;
use devgate::RecommendedAction;
use devgate::WatcherConfig;

use crate::common::channel_handler;
use crate::common::enable_logger;
use crate::common::project_dir;
use crate::common::wait_for;
use crate::common::wait_until;

fn os_watcher() -> ChangeWatcher {
    ChangeWatcher::new(WatcherConfig::default(), &ClassifierConfig::default()).unwrap()
}

#[test]
fn test_modifying_source_file_reports_medium_impact() {
    enable_logger();
    let (_dir, root) = project_dir();
    let source = root.join("Model.swift");
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();
    watcher.start(&root, false, handler).unwrap();

    fs::write(&source, "struct Model { let id: Int }\n").unwrap();

    let change = wait_for(&rx, |c| c.event.path == source).expect("no event for the source file");
    assert_eq!(change.category, ChangeCategory::SourceCode);
    assert_eq!(change.impact, ImpactLevel::Medium);
    assert_eq!(change.event.kind, ChangeKind::Modified);
    assert!(!change.recommendations.is_empty());
}

#[test]
fn test_deleting_manifest_recommends_full_rebuild() {
    enable_logger();
    let (_dir, root) = project_dir();
    let manifest = root.join("Podfile");
    fs::write(&manifest, "platform :ios, '17.0'\n").unwrap();
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();
    watcher.start(&root, false, handler).unwrap();

    fs::remove_file(&manifest).unwrap();

    let change = wait_for(&rx, |c| c.event.path == manifest && c.event.kind == ChangeKind::Deleted)
        .expect("no deletion event for the manifest");
    assert_eq!(change.category, ChangeCategory::Dependencies);
    assert_eq!(change.impact, ImpactLevel::High);
    assert!(change.recommendations.contains(&RecommendedAction::PerformFullRebuild));
}

#[test]
fn test_recursive_watch_sees_nested_changes() {
    enable_logger();
    let (_dir, root) = project_dir();
    fs::create_dir_all(root.join("Sources/App")).unwrap();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    let nested = root.join("Sources/App/View.swift");
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();

    let report = watcher.start(&root, true, handler).unwrap();

    assert!(report.is_complete());
    assert!(watcher.is_watching(root.join("Sources/App")));
    assert!(!watcher.is_watching(root.join(".git")));

    fs::write(&nested, "import SwiftUI\n").unwrap();
    let change = wait_for(&rx, |c| c.event.path == nested).expect("no event for the nested file");
    assert_eq!(change.category, ChangeCategory::SourceCode);
}

#[test]
fn test_stopped_watch_is_silent() {
    enable_logger();
    let (_dir, root) = project_dir();
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();
    watcher.start(&root, false, handler).unwrap();

    assert!(watcher.stop(&root));
    fs::write(root.join("Late.swift"), "").unwrap();

    assert!(rx.recv_timeout(std::time::Duration::from_millis(300)).is_err());
    assert!(watcher.active_paths().is_empty());
}

/// More directories than the default per-user inotify instance limit (128).
#[test]
fn test_recursive_watch_of_a_large_tree() {
    enable_logger();
    let (_dir, root) = project_dir();
    for i in 0..200 {
        fs::create_dir_all(root.join(format!("Sources/M{i}"))).unwrap();
    }
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();

    let report = watcher.start(&root, true, handler).unwrap();

    assert!(report.is_complete(), "{:?}", report.failures.first());
    assert_eq!(report.watched_children.len(), 201);
    assert_eq!(watcher.stats().active_watches, 202);

    let deep = root.join("Sources/M199/Feature.swift");
    fs::write(&deep, "").unwrap();
    assert!(wait_for(&rx, |c| c.event.path == deep).is_some());
}

#[test]
fn test_project_location_does_not_change_the_category() {
    enable_logger();
    let (_dir, base) = project_dir();
    let root = base.join("LatestApp");
    fs::create_dir(&root).unwrap();
    let source = root.join("Model.swift");
    let watcher = os_watcher();
    let (handler, rx) = channel_handler();
    watcher.start(&root, true, handler).unwrap();

    fs::write(&source, "struct Model {}\n").unwrap();

    let change = wait_for(&rx, |c| c.event.path == source).expect("no event for the source file");
    assert_eq!(change.category, ChangeCategory::SourceCode);
    assert_eq!(change.impact, ImpactLevel::Medium);
}

#[test]
fn test_renamed_directory_is_followed() {
    enable_logger();
    let (_dir, root) = project_dir();
    fs::create_dir_all(root.join("Sub/Inner")).unwrap();
    let (sub, moved) = (root.join("Sub"), root.join("Moved"));
    let config = WatcherConfig {
        reestablish_on_rename: true,
        ..Default::default()
    };
    let watcher = ChangeWatcher::new(config, &ClassifierConfig::default()).unwrap();
    let (handler, rx) = channel_handler();
    watcher.start(&root, true, handler).unwrap();

    fs::rename(&sub, &moved).unwrap();

    assert!(wait_until(|| watcher.is_watching(&moved) && watcher.is_watching(moved.join("Inner"))));
    assert!(!watcher.is_watching(&sub));
    assert!(!watcher.is_watching(sub.join("Inner")));

    let source = moved.join("Inner/View.swift");
    fs::write(&source, "").unwrap();
    assert!(wait_for(&rx, |c| c.event.path == source).is_some());
}
