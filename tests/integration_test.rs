use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use git2::{Repository, Signature};
use gitflow_toolkit::git::commit::{clean_generated_message, finalize_message, is_conventional_header};
use gitflow_toolkit::git::{split_diff, GitRepository};
use gitflow_toolkit::llm::{GenerationClient, Protocol};
use gitflow_toolkit::pipeline::{PipelineController, PipelineOptions, PipelineOutcome, PipelineError};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Temporary repository with one initial commit.
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();
        let repo = Repository::init(&repo_path)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        let test_repo = Self {
            _temp_dir: temp_dir,
            repo_path,
            repo,
        };
        test_repo.write("README.md", "# demo\n")?;
        test_repo.stage(&["README.md"])?;
        test_repo.commit_index("chore(repo): initial commit")?;
        Ok(test_repo)
    }

    fn write(&self, rel: &str, content: &str) -> Result<()> {
        let file_path = self.repo_path.join(rel);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file_path, content)?;
        Ok(())
    }

    fn stage(&self, paths: &[&str]) -> Result<()> {
        let mut index = self.repo.index()?;
        for p in paths {
            index.add_path(Path::new(p))?;
        }
        index.write()?;
        Ok(())
    }

    fn commit_index(&self, message: &str) -> Result<git2::Oid> {
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("Test User", "test@example.com")?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        Ok(self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?)
    }
}

fn local_client(server: &MockServer, retries: u32) -> GenerationClient {
    GenerationClient::new(
        Protocol::Local,
        &server.uri(),
        None,
        Duration::from_secs(5),
        retries,
        0.3,
    )
}

fn ollama_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "response": text, "done": true }))
}

#[tokio::test]
async fn staged_changes_become_one_commit() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("README.md", "# demo\n\nUsage notes.\n")?;
    test_repo.write("src/my lib.rs", "pub fn answer() -> u32 {\n    42\n}\n")?;
    test_repo.stage(&["README.md", "src/my lib.rs"])?;

    let repo = GitRepository::open_at(&test_repo.repo_path)?;
    repo.ensure_staged_files()?;
    let units = split_diff(&repo.staged_diff(3)?);
    let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "src/my lib.rs"]);
    assert!(units[1].patch_text.contains("+pub fn answer() -> u32 {"));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Output:"))
        .respond_with(ollama_reply(
            "```\nfeat(lib): add answer helper\n\n- add answer function\n- document usage\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("File: README.md"))
        .respond_with(ollama_reply("Documented usage."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("File: src/my lib.rs"))
        .respond_with(ollama_reply("Added an answer helper.").set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;

    let controller = PipelineController::new(
        Arc::new(local_client(&server, 0)),
        PipelineOptions::new("qwen2.5-coder:7b"),
    );
    let PipelineOutcome::Completed(raw) = controller.run(units).await else {
        panic!("pipeline did not complete");
    };

    let requests = server.received_requests().await.unwrap_or_default();
    let synthesis = requests
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .find(|body| body.contains("Output:"))
        .expect("synthesis request");
    let synthesis: serde_json::Value = serde_json::from_str(&synthesis)?;
    let prompt = synthesis["prompt"].as_str().unwrap_or_default();
    assert!(prompt.ends_with(
        "- README.md: Documented usage.\n- src/my lib.rs: Added an answer helper.\n\nOutput:"
    ));

    let sign_off = repo.sign_off_line();
    assert_eq!(
        sign_off.as_deref(),
        Some("Signed-off-by: Test User <test@example.com>")
    );
    let message = finalize_message(&clean_generated_message(&raw), sign_off.as_deref());
    assert!(is_conventional_header(&message));

    repo.commit_staged(&message)?;
    let head = test_repo.repo.head()?.peel_to_commit()?;
    assert_eq!(head.message(), Some(message.as_str()));
    assert!(repo.staged_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_file_analysis_aborts_before_synthesis() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("a.txt", "a\n")?;
    test_repo.write("b.txt", "b\n")?;
    test_repo.stage(&["a.txt", "b.txt"])?;

    let repo = GitRepository::open_at(&test_repo.repo_path)?;
    let units = split_diff(&repo.staged_diff(5)?);
    assert_eq!(units.len(), 2);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("Output:"))
        .respond_with(ollama_reply("never"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("File: a.txt"))
        .respond_with(ollama_reply("Added a."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("File: b.txt"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .expect(2)
        .mount(&server)
        .await;

    let controller = PipelineController::new(
        Arc::new(local_client(&server, 1)),
        PipelineOptions::new("qwen2.5-coder:7b"),
    );
    match controller.run(units).await {
        PipelineOutcome::Failed(PipelineError::Unit { path, .. }) => assert_eq!(path, "b.txt"),
        other => panic!("expected unit failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unborn_repository_has_no_staged_files() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    Repository::init(temp_dir.path())?;
    let repo = GitRepository::open_at(temp_dir.path())?;

    assert!(repo.staged_files()?.is_empty());
    let err = repo.ensure_staged_files().unwrap_err();
    assert!(err.to_string().contains("no file to commit"));
    Ok(())
}
