use std::path::Path;

use tracing::debug;

use super::assess;
use super::recommend;
use super::ChangeCategory;
use super::ChangeClassifier;
use super::ChangeEvent;
use super::ProjectChangeEvent;
use crate::metrics::CHANGE_EVENTS;
use crate::ClassifierConfig;

/// Classify, assess and recommend, in that order, for one event at a time.
#[derive(Debug, Clone, Default)]
pub struct ChangePipeline {
    classifier: ChangeClassifier,
}

impl ChangePipeline {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            classifier: ChangeClassifier::new(config),
        }
    }

    pub fn classify(
        &self,
        path: &Path,
    ) -> ChangeCategory {
        self.classifier.classify(path)
    }

    /// Analyzes `event`, classifying its path as given.
    pub fn analyze(
        &self,
        event: ChangeEvent,
    ) -> ProjectChangeEvent {
        let category = self.classifier.classify(&event.path);
        self.finish(event, category)
    }

    /// Analyzes an event from the project rooted at `project_root`. Only the
    /// part of the path inside the project is classified, so the directories
    /// above it (a home folder named `tester`, a checkout under `/build/`)
    /// never change the category.
    pub fn analyze_within(
        &self,
        event: ChangeEvent,
        project_root: &Path,
    ) -> ProjectChangeEvent {
        let category = self.classifier.classify(project_relative(&event.path, project_root));
        self.finish(event, category)
    }

    fn finish(
        &self,
        event: ChangeEvent,
        category: ChangeCategory,
    ) -> ProjectChangeEvent {
        let impact = assess(category, event.kind);
        let recommendations = recommend(category, impact);

        CHANGE_EVENTS
            .with_label_values(&[category.as_str(), impact.as_str()])
            .inc();
        debug!(
            path = %event.path.display(),
            kind = ?event.kind,
            %category,
            %impact,
            "change analyzed"
        );

        ProjectChangeEvent {
            event,
            category,
            impact,
            recommendations,
        }
    }
}

/// `path` relative to `root`; just the file name for the root itself or a
/// path outside it.
fn project_relative<'a>(
    path: &'a Path,
    root: &Path,
) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative,
        _ => path.file_name().map(Path::new).unwrap_or(path),
    }
}
