//! Synthesis of per-file summaries into one commit message request.

use crate::llm::prompts::Language;

/// Builds the synthesis prompt: few-shot preamble, one `- path: summary`
/// line per entry in the given order, then the output marker.
///
/// Entries with a blank summary are left out.
pub fn build_commit_prompt<'a, I>(entries: I, language: Language) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut prompt = String::from(language.few_shot_preamble());
    for (path, summary) in entries {
        let summary = summary.trim();
        if summary.is_empty() {
            continue;
        }
        prompt.push_str(&format!("- {path}: {summary}\n"));
    }
    prompt.push_str("\nOutput:");
    prompt
}

/// The caller's override when present, else the default for `language`.
pub fn commit_system_prompt(language: Language, override_prompt: Option<&str>) -> &str {
    override_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| language.commit_system_prompt())
}
