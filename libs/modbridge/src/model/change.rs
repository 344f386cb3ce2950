/// The kind of change the external runtime computed for one resource address.
///
/// Only `NoOp`/`Update`/`Replace`/`ReplaceDestroyBeforeCreate` may legally
/// appear in a child resource's `Diff` response; the remaining variants are
/// invariant violations there (they only ever show up at the module level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NoOp,
    Update,
    Replace,
    ReplaceDestroyBeforeCreate,
    Create,
    Read,
    Delete,
    Forget,
}

impl ChangeKind {
    /// True for the subset of kinds a Child Handler's `Diff` is allowed to observe.
    pub fn is_valid_for_child_diff(self) -> bool {
        matches!(
            self,
            ChangeKind::NoOp
                | ChangeKind::Update
                | ChangeKind::Replace
                | ChangeKind::ReplaceDestroyBeforeCreate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_diff_whitelist_matches_spec() {
        assert!(ChangeKind::NoOp.is_valid_for_child_diff());
        assert!(ChangeKind::Update.is_valid_for_child_diff());
        assert!(ChangeKind::Replace.is_valid_for_child_diff());
        assert!(ChangeKind::ReplaceDestroyBeforeCreate.is_valid_for_child_diff());
    }

    #[test]
    fn module_only_kinds_are_rejected_for_children() {
        assert!(!ChangeKind::Create.is_valid_for_child_diff());
        assert!(!ChangeKind::Read.is_valid_for_child_diff());
        assert!(!ChangeKind::Delete.is_valid_for_child_diff());
        assert!(!ChangeKind::Forget.is_valid_for_child_diff());
    }
}
