//! One best-effort injection run: load the mapping, resolve every secret,
//! rewrite the target file. Failures along the way are logged and the run
//! carries on with whatever it has.

use std::path::Path;

use tracing::{error, info};

use crate::mapping;
use crate::resolver::SecretResolver;
use crate::rewriter;
use crate::store::SecretStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries read from the mapping file.
    pub mapped: usize,
    pub resolved: usize,
    pub failed: usize,
    /// Placeholder occurrences replaced in the target file.
    pub substitutions: usize,
    /// Whether the target file was read and written back.
    pub rewritten: bool,
}

pub async fn run<S: SecretStore>(
    mapping_file: &Path,
    target_file: &Path,
    resolver: &SecretResolver<S>,
) -> RunSummary {
    let mapping = mapping::load_mapping(mapping_file);
    let replacements = resolver.resolve_all(&mapping).await;

    let mut summary = RunSummary {
        mapped: mapping.len(),
        resolved: replacements.len(),
        failed: mapping.len() - replacements.len(),
        ..RunSummary::default()
    };

    match rewriter::rewrite(target_file, &replacements) {
        Ok(report) => {
            summary.substitutions = report.substitutions;
            summary.rewritten = true;
        }
        Err(e) => error!("{}", e),
    }

    info!(
        mapped = summary.mapped,
        resolved = summary.resolved,
        failed = summary.failed,
        substitutions = summary.substitutions,
        rewritten = summary.rewritten,
        "Secret injection finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::fake::FakeStore;

    #[tokio::test]
    async fn test_partial_failure_leaves_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("ids.txt");
        let target = dir.path().join("Config.swift");
        std::fs::write(&ids, "EP=arn:secret:1\nAUTH=arn:secret:2\n").unwrap();
        std::fs::write(&target, "var endpoint = \"<EP>\"\nvar authorizer = \"<AUTH>\"\n").unwrap();

        let resolver = SecretResolver::new(FakeStore::with(&[("arn:secret:1", "host.example.com")]));
        let summary = run(&ids, &target, &resolver).await;

        assert_eq!(
            summary,
            RunSummary {
                mapped: 2,
                resolved: 1,
                failed: 1,
                substitutions: 1,
                rewritten: true,
            }
        );
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "var endpoint = \"host.example.com\"\nvar authorizer = \"<AUTH>\"\n"
        );
    }

    #[tokio::test]
    async fn test_missing_mapping_file_still_rewrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Config.swift");
        std::fs::write(&target, "var endpoint = \"<EP>\"\n").unwrap();

        let resolver = SecretResolver::new(FakeStore::default());
        let summary = run(&dir.path().join("missing.txt"), &target, &resolver).await;

        assert_eq!(summary.mapped, 0);
        assert!(summary.rewritten);
        assert!(resolver.store().calls().is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "var endpoint = \"<EP>\"\n");
    }

    #[tokio::test]
    async fn test_missing_target_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("ids.txt");
        std::fs::write(&ids, "EP=arn:secret:1\n").unwrap();

        let resolver = SecretResolver::new(FakeStore::with(&[("arn:secret:1", "h")]));
        let summary = run(&ids, &dir.path().join("missing.swift"), &resolver).await;

        assert_eq!(summary.resolved, 1);
        assert!(!summary.rewritten);
    }

    #[tokio::test]
    async fn test_unwritable_target_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("ids.txt");
        let target = dir.path().join("Config.swift");
        std::fs::write(&ids, "EP=arn:secret:1\n").unwrap();
        std::fs::write(&target, "var endpoint = \"<EP>\"\n").unwrap();
        let mut perms = std::fs::metadata(&target).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&target, perms).unwrap();
        if std::fs::OpenOptions::new().write(true).open(&target).is_ok() {
            // Privileged user: permissions are not enforced.
            return;
        }

        let resolver = SecretResolver::new(FakeStore::with(&[("arn:secret:1", "h")]));
        let summary = run(&ids, &target, &resolver).await;

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.substitutions, 0);
        assert!(!summary.rewritten);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "var endpoint = \"<EP>\"\n");
    }
}
