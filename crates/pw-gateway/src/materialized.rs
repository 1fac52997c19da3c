// materialized.rs — The read-only value the pipeline hands downstream.
//
// Once G4 has materialized the final content (verbatim or patched) the
// later gates — plan authority, role header, policy, commit — work from
// this one immutable value. Policy never calls back into the pipeline;
// it only reads this.

use std::path::PathBuf;

/// A fully materialized write, ready for admission.
#[derive(Debug, Clone)]
pub struct MaterializedWrite {
    /// Workspace-relative path, as matched against plan scopes and policy.
    pub relative_path: String,
    /// Canonical absolute target path.
    pub absolute_path: PathBuf,
    /// The exact bytes that will land on disk if every gate passes.
    pub content: String,
    /// Pre-image of the target file, for revert. None if it did not exist.
    pub pre_image: Option<Vec<u8>>,
}

impl MaterializedWrite {
    /// Did the target exist before this write?
    pub fn existed(&self) -> bool {
        self.pre_image.is_some()
    }
}
