use serde::Serialize;

use super::ChangeCategory;
use super::ImpactLevel;

/// Follow-up suggested for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    IncrementalBuild,
    RunAffectedTests,
    RunFullTestSuite,
    UpdateProjectReferences,
    ResolveDependencies,
    ReloadProject,
    ProcessResources,
    PerformFullRebuild,
    ReviewChange,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::IncrementalBuild => "run an incremental build",
            RecommendedAction::RunAffectedTests => "run affected tests",
            RecommendedAction::RunFullTestSuite => "run the full test suite",
            RecommendedAction::UpdateProjectReferences => "update project references to the moved file",
            RecommendedAction::ResolveDependencies => "resolve package dependencies",
            RecommendedAction::ReloadProject => "reload the project configuration",
            RecommendedAction::ProcessResources => "reprocess resources",
            RecommendedAction::PerformFullRebuild => "perform a full rebuild",
            RecommendedAction::ReviewChange => "review the change",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered follow-ups for a classified change, most urgent first.
///
/// Depends only on its inputs. `ImpactLevel::None` always yields nothing.
pub fn recommend(
    category: ChangeCategory,
    impact: ImpactLevel,
) -> Vec<RecommendedAction> {
    use RecommendedAction::*;

    if impact == ImpactLevel::None {
        return Vec::new();
    }

    match (category, impact) {
        (ChangeCategory::SourceCode, ImpactLevel::Medium) => vec![IncrementalBuild, RunAffectedTests],
        (ChangeCategory::SourceCode, ImpactLevel::High) => {
            vec![UpdateProjectReferences, IncrementalBuild, RunFullTestSuite]
        }
        (ChangeCategory::Dependencies, ImpactLevel::High) => {
            vec![ResolveDependencies, PerformFullRebuild, RunFullTestSuite]
        }
        (ChangeCategory::ProjectConfiguration, ImpactLevel::High) => vec![ReloadProject, PerformFullRebuild],
        (ChangeCategory::Tests, _) => vec![RunAffectedTests],
        (ChangeCategory::Resources, ImpactLevel::High) => vec![ProcessResources, IncrementalBuild],
        (ChangeCategory::Resources, _) => vec![ProcessResources],
        (_, ImpactLevel::Low) => vec![ReviewChange],
        (_, ImpactLevel::Medium) => vec![IncrementalBuild],
        (_, _) => vec![PerformFullRebuild],
    }
}
