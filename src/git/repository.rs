//! Git repository operations

use std::io::Write;
use std::process::Command;

use anyhow::{Context, Result};
use git2::{DiffFindOptions, DiffFormat, DiffOptions, ErrorCode, Repository, Signature, Tree};
use tracing::debug;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository containing the current directory
    pub fn open() -> Result<Self> {
        let repo = Repository::discover(".").context("Not in a git repository")?;

        Ok(Self { repo })
    }

    /// Open repository at specified path
    pub fn open_at<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;

        Ok(Self { repo })
    }

    /// Get access to the underlying git2::Repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Tree of the current HEAD commit, or `None` on an unborn branch.
    fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(
                head.peel_to_tree()
                    .context("Failed to resolve HEAD to a tree")?,
            )),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e).context("Failed to get HEAD reference"),
        }
    }

    /// Lists the paths staged for the next commit.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        let head_tree = self.head_tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .context("Failed to diff HEAD against the index")?;

        Ok(diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect())
    }

    /// Fails when nothing is staged.
    pub fn ensure_staged_files(&self) -> Result<()> {
        if self.staged_files()?.is_empty() {
            anyhow::bail!(
                "There is no file to commit, please execute the `git add` command to add the commit file"
            );
        }
        Ok(())
    }

    /// Renders the staged changes (HEAD versus index) as a unified diff.
    ///
    /// Equivalent to `git diff --staged -U<context_lines>`, including
    /// rename detection.
    pub fn staged_diff(&self, context_lines: u32) -> Result<String> {
        let head_tree = self.head_tree()?;

        let mut opts = DiffOptions::new();
        opts.context_lines(context_lines);

        let mut diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut opts))
            .context("Failed to diff HEAD against the index")?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))
            .context("Failed to detect renames")?;

        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin());
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .context("Failed to render staged diff")?;

        debug!(bytes = out.len(), context_lines, "Rendered staged diff");
        Ok(out)
    }

    /// Signature of the configured git user, if `user.name` and
    /// `user.email` are both set.
    pub fn signature(&self) -> Option<Signature<'static>> {
        self.repo.signature().ok()
    }

    /// Builds the `Signed-off-by` trailer for the configured user.
    pub fn sign_off_line(&self) -> Option<String> {
        let sig = self.signature()?;
        let name = sig.name()?;
        let email = sig.email()?;
        if name.is_empty() || email.is_empty() {
            return None;
        }
        Some(format!("Signed-off-by: {name} <{email}>"))
    }

    /// Commits the index with `git commit -F`, so hooks and signing
    /// settings apply.
    ///
    /// Returns the new commit's id as a hex string.
    pub fn commit_staged(&self, message: &str) -> Result<String> {
        self.ensure_staged_files()?;

        let workdir = self
            .repo
            .workdir()
            .context("Cannot commit in a bare repository")?;

        let mut message_file =
            tempfile::NamedTempFile::new().context("Failed to create commit message file")?;
        message_file
            .write_all(message.as_bytes())
            .context("Failed to write commit message file")?;

        let output = Command::new("git")
            .arg("commit")
            .arg("-F")
            .arg(message_file.path())
            .current_dir(workdir)
            .output()
            .context("Failed to execute git commit")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git commit failed: {}", stderr.trim());
        }

        let head = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("Failed to resolve the new HEAD commit")?;
        debug!(commit = %head.id(), "git commit succeeded");
        Ok(head.id().to_string())
    }
}
