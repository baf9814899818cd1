use serde::Serialize;

use super::ChangeCategory;
use super::ChangeKind;

/// How disruptive a change is to the next build, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::None => "none",
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn assess(
    category: ChangeCategory,
    kind: ChangeKind,
) -> ImpactLevel {
    match (category, kind) {
        (ChangeCategory::SourceCode, ChangeKind::Deleted | ChangeKind::Renamed) => ImpactLevel::High,
        (ChangeCategory::SourceCode, ChangeKind::PermissionChanged) => ImpactLevel::Low,
        (ChangeCategory::SourceCode, ChangeKind::Modified | ChangeKind::Unknown) => ImpactLevel::Medium,
        (ChangeCategory::Dependencies | ChangeCategory::ProjectConfiguration, _) => ImpactLevel::High,
        (ChangeCategory::Tests | ChangeCategory::Resources | ChangeCategory::Other, _) => ImpactLevel::Low,
        (ChangeCategory::BuildArtifacts, _) => ImpactLevel::None,
    }
}
