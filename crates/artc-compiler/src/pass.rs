//! Static pass declarations
//!
//! Every pass declares up front what it needs, what it must never see, and
//! what it produces. Context validation reads nothing but this table.

use artc_artifact::ArtifactKind;
use serde::Serialize;
use std::fmt;

/// A kind of project file a pass cannot run without
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRequirement {
    /// At least one prose document (md, txt, rst, adoc)
    Document,
    /// At least one project file of any kind
    AnyProjectFile,
    /// The named target file, with its content
    TargetFile,
}

impl fmt::Display for FileRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "requirement document (md, txt, rst, adoc)",
            Self::AnyProjectFile => "project file",
            Self::TargetFile => "target file",
        })
    }
}

/// Input a pass must never receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenInput {
    /// Any file recognised as source code
    SourceCode,
    /// The implementation target
    TargetFile,
}

/// Declaration of one compiler pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSpec {
    /// Artifact type produced (also the pass identity)
    pub output: ArtifactKind,
    /// File requirements, all must hold
    pub required_files: &'static [FileRequirement],
    /// Artifact types that must be present and approved
    pub required_artifacts: &'static [ArtifactKind],
    /// Inputs that make the context invalid
    pub forbidden_inputs: &'static [ForbiddenInput],
    /// One-paragraph task statement
    pub purpose: &'static str,
    /// Numbered rules appended to the prompt
    pub rules: &'static [&'static str],
}

impl PassSpec {
    /// Declaration for the pass producing `kind`
    #[must_use]
    pub fn for_kind(kind: ArtifactKind) -> &'static PassSpec {
        // PASSES is indexed in ArtifactKind::ALL order
        let index = ArtifactKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &PASSES[index]
    }

    /// Whether the pass requires a target file
    #[inline]
    #[must_use]
    pub fn needs_target_file(&self) -> bool {
        self.required_files.contains(&FileRequirement::TargetFile)
    }

    /// Whether `input` is forbidden for this pass
    #[inline]
    #[must_use]
    pub fn forbids(&self, input: ForbiddenInput) -> bool {
        self.forbidden_inputs.contains(&input)
    }
}

/// Rules shared by every pass
pub const COMMON_RULES: &[&str] = &[
    "Emit exactly one JSON object and nothing else.",
    "Do not wrap the object in prose, commentary or apologies.",
    "Never include source code, code fences or shell commands in any field.",
    "Use only information present in the context; do not invent files or artifacts.",
];

/// All pass declarations, in `ArtifactKind::ALL` order
pub static PASSES: [PassSpec; 7] = [
    PassSpec {
        output: ArtifactKind::ProjectPlan,
        required_files: &[FileRequirement::Document],
        required_artifacts: &[],
        forbidden_inputs: &[ForbiddenInput::SourceCode, ForbiddenInput::TargetFile],
        purpose: "Turn the requirement documents into a project plan: goals, constraints, \
                  explicit non-goals and ordered milestones with deliverables.",
        rules: &[
            "Every goal must trace to a statement in the documents.",
            "Milestones are ordered; each names concrete deliverables.",
            "State non-goals explicitly when the documents exclude something.",
        ],
    },
    PassSpec {
        output: ArtifactKind::ScaffoldPlan,
        required_files: &[],
        required_artifacts: &[ArtifactKind::ProjectPlan],
        forbidden_inputs: &[ForbiddenInput::SourceCode, ForbiddenInput::TargetFile],
        purpose: "Derive the module and directory layout that realises the approved \
                  project plan.",
        rules: &[
            "List each file or directory once, with a one-sentence purpose.",
            "Paths are relative to the project root and use forward slashes.",
            "Record naming and layout conventions separately from modules.",
        ],
    },
    PassSpec {
        output: ArtifactKind::TestPlan,
        required_files: &[],
        required_artifacts: &[ArtifactKind::ProjectPlan, ArtifactKind::ScaffoldPlan],
        forbidden_inputs: &[ForbiddenInput::TargetFile],
        purpose: "Specify the tests that define done for the planned modules: which test \
                  files exist and which cases each contains.",
        rules: &[
            "Every test case names the test file that holds it.",
            "Describe behaviour as given/when/then, never as code.",
            "Test files are listed once each; their paths become locked.",
        ],
    },
    PassSpec {
        output: ArtifactKind::ImplementationPlan,
        required_files: &[FileRequirement::TargetFile],
        required_artifacts: &[ArtifactKind::TestPlan],
        forbidden_inputs: &[],
        purpose: "Plan the ordered steps that make the target file satisfy the locked \
                  test plan.",
        rules: &[
            "Steps are numbered from 1 and each names the tests it covers.",
            "Describe intent, not code; the plan is executed elsewhere.",
            "Do not propose changes to test files.",
        ],
    },
    PassSpec {
        output: ArtifactKind::RefactorPlan,
        required_files: &[FileRequirement::TargetFile],
        required_artifacts: &[ArtifactKind::TestPlan, ArtifactKind::ImplementationPlan],
        forbidden_inputs: &[],
        purpose: "Plan behaviour-preserving refactorings of the target file.",
        rules: &[
            "Each refactoring has a kind, a target symbol and a rationale.",
            "Behaviour must be preserved; the locked tests stay unchanged.",
        ],
    },
    PassSpec {
        output: ArtifactKind::ValidationResult,
        required_files: &[FileRequirement::AnyProjectFile],
        required_artifacts: &[ArtifactKind::TestPlan],
        forbidden_inputs: &[],
        purpose: "Report, per test case of the test plan, whether the provided test \
                  output shows it passing.",
        rules: &[
            "Report every test case of the plan exactly once.",
            "passed is true only if every case has status pass.",
        ],
    },
    PassSpec {
        output: ArtifactKind::FailureReport,
        required_files: &[],
        required_artifacts: &[ArtifactKind::ValidationResult],
        forbidden_inputs: &[],
        purpose: "Explain each failure of the validation result: symptom, suspected cause \
                  and the area where a fix belongs.",
        rules: &[
            "One entry per failing test id.",
            "Name areas of the design, not lines of code.",
        ],
    },
];
