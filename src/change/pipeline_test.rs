use std::path::Path;

use super::*;
use crate::metrics::CHANGE_EVENTS;

#[test]
fn test_source_modification() {
    let pipeline = ChangePipeline::default();

    let analyzed = pipeline.analyze(ChangeEvent::new("Sources/App/Model.swift", ChangeKind::Modified));

    assert_eq!(analyzed.category, ChangeCategory::SourceCode);
    assert_eq!(analyzed.impact, ImpactLevel::Medium);
    assert_eq!(
        analyzed.recommendations,
        vec![RecommendedAction::IncrementalBuild, RecommendedAction::RunAffectedTests]
    );
    assert_eq!(analyzed.event.path.to_str(), Some("Sources/App/Model.swift"));
}

#[test]
fn test_manifest_deletion_requires_full_rebuild() {
    let pipeline = ChangePipeline::default();

    let analyzed = pipeline.analyze(ChangeEvent::new("Podfile", ChangeKind::Deleted));

    assert_eq!(analyzed.category, ChangeCategory::Dependencies);
    assert_eq!(analyzed.impact, ImpactLevel::High);
    assert!(analyzed.recommendations.contains(&RecommendedAction::PerformFullRebuild));
}

#[test]
fn test_build_output_is_ignored() {
    let pipeline = ChangePipeline::default();

    let analyzed = pipeline.analyze(ChangeEvent::new(".build/debug/App", ChangeKind::Modified));

    assert_eq!(analyzed.impact, ImpactLevel::None);
    assert!(analyzed.recommendations.is_empty());
}

#[test]
fn test_analyze_counts_events_by_category_and_impact() {
    let counter = CHANGE_EVENTS.with_label_values(&["project_configuration", "high"]);
    let before = counter.get();

    ChangePipeline::default().analyze(ChangeEvent::new("App.xcodeproj/project.pbxproj", ChangeKind::Modified));

    assert!(counter.get() > before);
}

#[test]
fn test_location_of_the_project_does_not_change_the_category() {
    let pipeline = ChangePipeline::default();

    let nested = pipeline.analyze_within(
        ChangeEvent::new("/home/tester/LatestApp/Sources/Model.swift", ChangeKind::Modified),
        Path::new("/home/tester/LatestApp"),
    );
    let manifest = pipeline.analyze_within(
        ChangeEvent::new("/srv/build/resources/App/Podfile", ChangeKind::Modified),
        Path::new("/srv/build/resources/App"),
    );
    let notes = pipeline.analyze_within(
        ChangeEvent::new("/srv/build/App/NOTES.md", ChangeKind::Modified),
        Path::new("/srv/build/App"),
    );

    assert_eq!(nested.category, ChangeCategory::SourceCode);
    assert_eq!(nested.impact, ImpactLevel::Medium);
    assert_eq!(manifest.category, ChangeCategory::Dependencies);
    assert_eq!(notes.category, ChangeCategory::Other);
    // the event keeps its full path
    assert_eq!(nested.event.path, Path::new("/home/tester/LatestApp/Sources/Model.swift"));
}

#[test]
fn test_project_root_itself_is_classified_by_name() {
    let pipeline = ChangePipeline::default();

    let analyzed = pipeline.analyze_within(
        ChangeEvent::new("/work/App.xcodeproj", ChangeKind::Deleted),
        Path::new("/work/App.xcodeproj"),
    );

    assert_eq!(analyzed.category, ChangeCategory::ProjectConfiguration);
}
