//! Priority selection over pending build requests.

use crucible_core::branch::BranchPolicy;
use crucible_core::request::BuildRequest;

use crate::registry::DispatchConfig;

/// Select the request to dispatch next.
///
/// Release-tagged branches go first, package-saving branches second, then
/// strict submission-order FIFO. Booleans sort false-first, so the key
/// negates the matches.
pub fn next_build<'a>(
    _builder: &DispatchConfig,
    policy: &BranchPolicy,
    pending: &'a [BuildRequest],
) -> Option<&'a BuildRequest> {
    pending.iter().min_by_key(|request| {
        (
            !policy.is_release(&request.branch),
            !policy.is_saved_package(&request.branch),
            request.submitted_at,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn policy() -> BranchPolicy {
        BranchPolicy {
            release_branches: vec!["bb-*-release".to_string(), "preview-*".to_string()],
            saved_package_branches: vec!["main".to_string(), "10.*".to_string()],
            staging_branches: vec![],
        }
    }

    fn config() -> DispatchConfig {
        DispatchConfig {
            name: "amd64-debian-12".to_string(),
            job_weight: 7,
            eligible_workers: vec![],
            tags: vec![],
        }
    }

    fn request(branch: &str, at: i64) -> BuildRequest {
        BuildRequest::new(branch)
            .with_submitted_at(Utc.timestamp_opt(at, 0).single().expect("valid ts"))
    }

    #[test]
    fn test_release_branch_beats_earlier_submission() {
        let pending = vec![request("feature-x", 0), request("preview-12.3", 100)];
        let next = next_build(&config(), &policy(), &pending).unwrap();
        assert_eq!(next.branch, "preview-12.3");
    }

    #[test]
    fn test_saved_package_branch_beats_plain() {
        let pending = vec![request("feature-x", 0), request("main", 100)];
        let next = next_build(&config(), &policy(), &pending).unwrap();
        assert_eq!(next.branch, "main");
    }

    #[test]
    fn test_release_beats_saved_package() {
        let pending = vec![request("main", 0), request("bb-12.2-release", 100)];
        let next = next_build(&config(), &policy(), &pending).unwrap();
        assert_eq!(next.branch, "bb-12.2-release");
    }

    #[test]
    fn test_fifo_within_same_class() {
        let pending = vec![request("feature-b", 50), request("feature-a", 10)];
        let next = next_build(&config(), &policy(), &pending).unwrap();
        assert_eq!(next.branch, "feature-a");
    }

    #[test]
    fn test_empty_pending_selects_nothing() {
        assert!(next_build(&config(), &policy(), &[]).is_none());
    }
}
