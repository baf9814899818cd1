use std::path::Path;

use serde::Serialize;

use crate::ClassifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    SourceCode,
    Dependencies,
    ProjectConfiguration,
    Tests,
    Resources,
    BuildArtifacts,
    Other,
}

impl ChangeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::SourceCode => "source_code",
            ChangeCategory::Dependencies => "dependencies",
            ChangeCategory::ProjectConfiguration => "project_configuration",
            ChangeCategory::Tests => "tests",
            ChangeCategory::Resources => "resources",
            ChangeCategory::BuildArtifacts => "build_artifacts",
            ChangeCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a path to the part of the project it belongs to.
///
/// Matching is case-insensitive and separator-agnostic. Rules are checked in
/// a fixed order and the first hit wins:
///
/// 1. test marker and source extension: `Tests`. A test marker must begin or
///    end a path component or a word within it (`Tests/`, `AppTests/`,
///    `LaunchTest.swift`, `ui_test_helpers.swift`); `LatestApp/` is no match.
/// 2. source extension: `SourceCode`
/// 3. file name is a dependency manifest: `Dependencies`
/// 4. project-container extension anywhere in the path: `ProjectConfiguration`
/// 5. resource marker or resource extension: `Resources`
/// 6. build-output marker: `BuildArtifacts`
/// 7. anything else: `Other`
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    source_extensions: Vec<String>,
    test_markers: Vec<String>,
    dependency_manifests: Vec<String>,
    project_markers: Vec<String>,
    resource_markers: Vec<String>,
    resource_extensions: Vec<String>,
    build_markers: Vec<String>,
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl ChangeClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            source_extensions: lowered(&config.source_extensions),
            test_markers: lowered(&config.test_markers),
            dependency_manifests: lowered(&config.dependency_manifests),
            project_markers: config
                .project_extensions
                .iter()
                .map(|ext| format!(".{}", ext.to_lowercase()))
                .collect(),
            resource_markers: lowered(&config.resource_markers),
            resource_extensions: lowered(&config.resource_extensions),
            build_markers: lowered(&config.build_markers),
        }
    }

    pub fn classify(
        &self,
        path: &Path,
    ) -> ChangeCategory {
        let mut normalized = path.to_string_lossy().to_lowercase().replace('\\', "/");
        // anchor markers such as "/build/" at relative roots
        if !normalized.starts_with('/') {
            normalized.insert(0, '/');
        }

        let file_name = normalized.rsplit('/').next().unwrap_or_default();
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext);
        let has_ext = |exts: &[String]| extension.is_some_and(|ext| exts.iter().any(|e| e == ext));
        let contains_any = |markers: &[String]| markers.iter().any(|m| normalized.contains(m.as_str()));

        if has_ext(&self.source_extensions) {
            if self.is_test_path(&normalized) {
                return ChangeCategory::Tests;
            }
            return ChangeCategory::SourceCode;
        }
        if self.dependency_manifests.iter().any(|m| m == file_name) {
            return ChangeCategory::Dependencies;
        }
        if contains_any(&self.project_markers) {
            return ChangeCategory::ProjectConfiguration;
        }
        if contains_any(&self.resource_markers) || has_ext(&self.resource_extensions) {
            return ChangeCategory::Resources;
        }
        if contains_any(&self.build_markers) {
            return ChangeCategory::BuildArtifacts;
        }
        ChangeCategory::Other
    }
}

impl ChangeClassifier {
    fn is_test_path(
        &self,
        normalized: &str,
    ) -> bool {
        let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        // the file name counts without its extension
        if let Some(file_name) = segments.pop() {
            segments.push(file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem));
        }

        segments
            .iter()
            .any(|segment| self.test_markers.iter().any(|marker| marks(segment, marker)))
    }
}

/// Whether `marker` begins or ends `segment` or one of its words. A plural
/// `s` after the marker is allowed.
fn marks(
    segment: &str,
    marker: &str,
) -> bool {
    let bounds = |word: &str| {
        word.starts_with(marker)
            || word.ends_with(marker)
            || word.strip_suffix('s').is_some_and(|w| w.ends_with(marker))
    };
    bounds(segment) || segment.split(|c: char| !c.is_alphanumeric()).any(bounds)
}

fn lowered(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
