//! Filesystem-layout path derivation for a Node-style (filesystem) workspace runtime.
//!
//! [`Paths`] generalizes the teacher's `Config` (which held application policy —
//! daily-entry folders, editor preferences, sync URLs) into the narrower thing
//! spec.md §6 actually asks the core for: where a workspace's files live, and
//! where a provider's log and diagnostics snapshot live. It carries no
//! application policy, only path derivation.
//!
//! A browser-style workspace runtime has no filesystem at all — spec.md §4.2's
//! "Browser vs. Node split" — so [`ProviderContext::paths`](crate::provider::ProviderContext::paths)
//! is `Option<Paths>`: present under a filesystem runtime, absent in a browser one.

use std::path::PathBuf;

/// Resolved filesystem locations for one workspace's providers.
///
/// - `project` — the root directory under which all workspaces live.
/// - `epicenter` — `<project>/.epicenter/<workspaceId>`, where provider logs
///   and diagnostics snapshots are written.
/// - `provider` — `<project>/.epicenter/providers/<providerId>`, a private
///   scratch directory for provider-owned state that doesn't belong in the
///   per-workspace log/diagnostics files (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root project directory.
    pub project: PathBuf,
    /// `<project>/.epicenter/<workspaceId>`.
    pub epicenter: PathBuf,
    /// `<project>/.epicenter/providers/<providerId>`.
    pub provider: PathBuf,
}

impl Paths {
    /// Derive the three path roots for one `(workspace, provider)` pairing.
    pub fn new(project: impl Into<PathBuf>, workspace_id: &str, provider_id: &str) -> Self {
        let project = project.into();
        let epicenter = project.join(".epicenter").join(workspace_id);
        let provider = project.join(".epicenter").join("providers").join(provider_id);
        Self {
            project,
            epicenter,
            provider,
        }
    }

    /// A workspace's own directory: the workspace id under the project
    /// directory by default, or `name` (absolute or project-relative) if the
    /// workspace config overrides it.
    pub fn workspace_dir(&self, workspace_id: &str, override_dir: Option<&str>) -> PathBuf {
        match override_dir {
            Some(dir) => {
                let path = PathBuf::from(dir);
                if path.is_absolute() {
                    path
                } else {
                    self.project.join(path)
                }
            }
            None => self.project.join(workspace_id),
        }
    }

    /// A table's own directory within a workspace directory: the table name
    /// by default, or `override_dir` if the table config overrides it.
    pub fn table_dir(workspace_dir: &std::path::Path, table_name: &str, override_dir: Option<&str>) -> PathBuf {
        workspace_dir.join(override_dir.unwrap_or(table_name))
    }

    /// `<epicenter>/<providerId>.log` — the append-only audit trail (spec.md §4.3.8).
    pub fn log_path(&self, provider_id: &str) -> PathBuf {
        self.epicenter.join(format!("{provider_id}.log"))
    }

    /// `<epicenter>/<providerId>.diagnostics.json` — the diagnostics snapshot (spec.md §3).
    pub fn diagnostics_path(&self, provider_id: &str) -> PathBuf {
        self.epicenter.join(format!("{provider_id}.diagnostics.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_the_three_roots() {
        let paths = Paths::new("/proj", "ws1", "markdown");
        assert_eq!(paths.project, PathBuf::from("/proj"));
        assert_eq!(paths.epicenter, PathBuf::from("/proj/.epicenter/ws1"));
        assert_eq!(paths.provider, PathBuf::from("/proj/.epicenter/providers/markdown"));
    }

    #[test]
    fn workspace_dir_defaults_to_workspace_id() {
        let paths = Paths::new("/proj", "ws1", "markdown");
        assert_eq!(paths.workspace_dir("ws1", None), PathBuf::from("/proj/ws1"));
    }

    #[test]
    fn workspace_dir_honors_relative_override() {
        let paths = Paths::new("/proj", "ws1", "markdown");
        assert_eq!(
            paths.workspace_dir("ws1", Some("notes-dir")),
            PathBuf::from("/proj/notes-dir")
        );
    }

    #[test]
    fn workspace_dir_honors_absolute_override() {
        let paths = Paths::new("/proj", "ws1", "markdown");
        assert_eq!(
            paths.workspace_dir("ws1", Some("/elsewhere")),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn table_dir_defaults_to_table_name() {
        let ws_dir = PathBuf::from("/proj/ws1");
        assert_eq!(Paths::table_dir(&ws_dir, "notes", None), PathBuf::from("/proj/ws1/notes"));
    }

    #[test]
    fn log_and_diagnostics_paths() {
        let paths = Paths::new("/proj", "ws1", "markdown");
        assert_eq!(paths.log_path("markdown"), PathBuf::from("/proj/.epicenter/ws1/markdown.log"));
        assert_eq!(
            paths.diagnostics_path("markdown"),
            PathBuf::from("/proj/.epicenter/ws1/markdown.diagnostics.json")
        );
    }
}
