use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Path rules consumed by the change classifier.
///
/// All matching is case-insensitive. Extensions are given without the leading
/// dot; markers other than test markers are plain substrings of the
/// normalised (`/`-separated) path.
/// The defaults target Swift/Xcode projects.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    /// Markers of test code, matched at the start or end of a path component
    /// or of a word within it (`Tests`, `AppTests`, `FooTest.swift`)
    #[serde(default = "default_test_markers")]
    pub test_markers: Vec<String>,

    /// Exact file names of dependency manifests and lock files
    #[serde(default = "default_dependency_manifests")]
    pub dependency_manifests: Vec<String>,

    /// Project-container extensions, matched anywhere in the path so files
    /// inside a bundle (`App.xcodeproj/project.pbxproj`) count too
    #[serde(default = "default_project_extensions")]
    pub project_extensions: Vec<String>,

    /// Substrings marking resource bundles and localisation folders
    #[serde(default = "default_resource_markers")]
    pub resource_markers: Vec<String>,

    #[serde(default = "default_resource_extensions")]
    pub resource_extensions: Vec<String>,

    /// Substrings marking build output locations
    #[serde(default = "default_build_markers")]
    pub build_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            source_extensions: default_source_extensions(),
            test_markers: default_test_markers(),
            dependency_manifests: default_dependency_manifests(),
            project_extensions: default_project_extensions(),
            resource_markers: default_resource_markers(),
            resource_extensions: default_resource_extensions(),
            build_markers: default_build_markers(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_extensions.is_empty() {
            return Err(Error::InvalidConfig("source_extensions must not be empty".into()));
        }

        let all_rules = self
            .source_extensions
            .iter()
            .chain(&self.test_markers)
            .chain(&self.dependency_manifests)
            .chain(&self.project_extensions)
            .chain(&self.resource_markers)
            .chain(&self.resource_extensions)
            .chain(&self.build_markers);
        for rule in all_rules {
            if rule.trim().is_empty() {
                return Err(Error::InvalidConfig("classifier rules must not be blank".into()));
            }
        }

        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_source_extensions() -> Vec<String> {
    strings(&["swift"])
}
fn default_test_markers() -> Vec<String> {
    strings(&["test"])
}
fn default_dependency_manifests() -> Vec<String> {
    strings(&[
        "package.resolved",
        "podfile",
        "podfile.lock",
        "cartfile",
        "cartfile.resolved",
        "gemfile",
        "gemfile.lock",
    ])
}
fn default_project_extensions() -> Vec<String> {
    strings(&["xcodeproj", "xcworkspace", "xcconfig", "xctestplan"])
}
fn default_resource_markers() -> Vec<String> {
    strings(&["resource", ".xcassets", ".lproj/"])
}
fn default_resource_extensions() -> Vec<String> {
    strings(&[
        "storyboard",
        "xib",
        "strings",
        "stringsdict",
        "xcstrings",
        "png",
        "jpg",
        "jpeg",
        "pdf",
        "ttf",
        "otf",
    ])
}
fn default_build_markers() -> Vec<String> {
    strings(&["/build/", "/.build/", "/deriveddata/"])
}
