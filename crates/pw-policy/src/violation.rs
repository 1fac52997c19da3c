// violation.rs — Policy violation data model.
//
// Every rejected construct maps to one stable code. Codes are closed and
// fixed at compile time: PW1xx are textual hard blocks that no plan
// allowance can waive; PW2xx are structural findings that a plan may waive
// through an ALLOW entry.

use serde::{Deserialize, Serialize};

/// Closed set of policy construct codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConstructCode {
    /// TODO / FIXME / XXX / HACK markers.
    IncompleteWorkMarker,
    /// mock / fake / dummy identifiers outside test paths.
    TestDoubleIdentifier,
    /// Authorization-named function returning literal truth.
    UnconditionalPolicyPass,
    /// SIMULATE / DRY_RUN style outcome flags.
    SimulatedOutcomeFlag,
    /// `return null` / `return undefined` / `return ""` from value positions.
    AmbiguousEmptyReturn,
    /// The file targets a structural language but does not parse.
    UnparseableSource,
    /// Empty catch / except handler block.
    EmptyHandlerBlock,
    /// Fallibly-named function using Option as its failure channel.
    OptionAsErrorChannel,
    /// Result with an erased boxed error type.
    ErasedBoxedError,
    /// Structural proof that an authorization decision is always true.
    AuthDecisionAlwaysTrue,
}

impl ConstructCode {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructCode::IncompleteWorkMarker => "PW101",
            ConstructCode::TestDoubleIdentifier => "PW102",
            ConstructCode::UnconditionalPolicyPass => "PW103",
            ConstructCode::SimulatedOutcomeFlag => "PW104",
            ConstructCode::AmbiguousEmptyReturn => "PW105",
            ConstructCode::UnparseableSource => "PW201",
            ConstructCode::EmptyHandlerBlock => "PW202",
            ConstructCode::OptionAsErrorChannel => "PW203",
            ConstructCode::ErasedBoxedError => "PW204",
            ConstructCode::AuthDecisionAlwaysTrue => "PW205",
        }
    }

    /// Parse a stable code string back into the enum.
    pub fn parse(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "PW101" => Some(ConstructCode::IncompleteWorkMarker),
            "PW102" => Some(ConstructCode::TestDoubleIdentifier),
            "PW103" => Some(ConstructCode::UnconditionalPolicyPass),
            "PW104" => Some(ConstructCode::SimulatedOutcomeFlag),
            "PW105" => Some(ConstructCode::AmbiguousEmptyReturn),
            "PW201" => Some(ConstructCode::UnparseableSource),
            "PW202" => Some(ConstructCode::EmptyHandlerBlock),
            "PW203" => Some(ConstructCode::OptionAsErrorChannel),
            "PW204" => Some(ConstructCode::ErasedBoxedError),
            "PW205" => Some(ConstructCode::AuthDecisionAlwaysTrue),
            _ => None,
        }
    }

    /// Hard blocks cannot be waived by any plan allowance.
    pub fn is_hard_block(&self) -> bool {
        matches!(
            self,
            ConstructCode::IncompleteWorkMarker
                | ConstructCode::TestDoubleIdentifier
                | ConstructCode::UnconditionalPolicyPass
                | ConstructCode::SimulatedOutcomeFlag
                | ConstructCode::AmbiguousEmptyReturn
        )
    }
}

impl std::fmt::Display for ConstructCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One offending construct: code plus 1-based line number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub code: ConstructCode,
    pub line: usize,
    pub message: String,
}

impl Violation {
    pub fn new(code: ConstructCode, line: usize, message: impl Into<String>) -> Self {
        Self {
            code,
            line,
            message: message.into(),
        }
    }
}

/// Sort violations into the canonical (line, code) order.
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| a.line.cmp(&b.line).then(a.code.cmp(&b.code)));
}
