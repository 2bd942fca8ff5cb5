//! Prompt templates for file analysis and commit message synthesis.

use std::fmt;
use std::str::FromStr;

use crate::git::DiffUnit;

/// System prompt for summarizing a single file diff.
pub const DEFAULT_FILE_SYSTEM_PROMPT: &str =
    "You are a git diff analyzer. Output only a brief summary, no formatting.";

/// System prompt for English commit messages.
pub const COMMIT_SYSTEM_PROMPT_EN: &str = r#"You are a git commit message generator. Generate EXACTLY ONE commit message following the Angular commit convention.

FORMAT (strict):
<type>(<scope>): <subject>

<body>

RULES:
1. type: REQUIRED, one of: feat, fix, docs, style, refactor, test, chore, perf, hotfix
2. scope: REQUIRED, a short word describing the affected area (e.g., api, ui, config, auth, db, cli)
3. subject: REQUIRED, imperative mood, lowercase, no period, max 50 chars
4. body: REQUIRED, 3-5 bullet points starting with "- ", each point starts with a verb

OUTPUT ONLY THE COMMIT MESSAGE. No explanation, no markdown, no code blocks."#;

/// System prompt for Chinese commit messages.
pub const COMMIT_SYSTEM_PROMPT_ZH: &str = r#"你是一个 git commit 消息生成器.请严格按照 Angular commit 规范生成一条 commit 消息.

格式要求（严格遵守）:
<type>(<scope>): <中文描述>

<正文>

规则:
1. type: 必填, 只能是: feat, fix, docs, style, refactor, test, chore, perf, hotfix
2. scope: 必填, 描述影响范围的英文单词（如 api, ui, config, auth, db, cli）
3. subject: 必填, 使用中文描述, 不加句号, 最多50字
4. body: 必填, 3-5个要点, 每行以"- "开头, 使用中文描述

只输出 commit 消息本身, 不要任何解释, markdown 或代码块."#;

/// System prompt for commit messages with an English/Chinese subject.
pub const COMMIT_SYSTEM_PROMPT_BILINGUAL: &str = r#"You are a git commit message generator. Generate EXACTLY ONE commit message following the Angular commit convention with bilingual subject.

FORMAT (strict):
<type>(<scope>): <english subject> (<中文描述>)

<body in Chinese>

RULES:
1. type: REQUIRED, one of: feat, fix, docs, style, refactor, test, chore, perf, hotfix
2. scope: REQUIRED, a short word describing the affected area (e.g., api, ui, config, auth, db, cli)
3. subject: REQUIRED, format "english description (中文描述)", lowercase English, no period
4. body: REQUIRED, 3-5 bullet points starting with "- ", written in Chinese

OUTPUT ONLY THE COMMIT MESSAGE. No explanation, no markdown, no code blocks."#;

const FEW_SHOT_EN: &str = "Example:
Input:
- auth.go: Added JWT validation
- user.go: Added profile endpoint
- docs.md: Updated API docs

Output:
feat(api): add authentication and user profile

- implement JWT token validation
- add user profile endpoint
- update API documentation

Input:
";

const FEW_SHOT_ZH: &str = "示例:
输入:
- auth.go: 添加了 JWT 验证
- user.go: 添加了用户资料接口
- docs.md: 更新了 API 文档

输出:
feat(api): 添加用户认证和资料功能

- 实现 JWT token 验证
- 添加用户资料接口
- 更新 API 文档

输入:
";

const FEW_SHOT_BILINGUAL: &str = "Example:
Input:
- auth.go: Added JWT validation
- user.go: Added profile endpoint
- docs.md: Updated API docs

Output:
feat(api): add authentication and user profile (添加用户认证和资料功能)

- 实现 JWT token 验证
- 添加用户资料接口
- 更新 API 文档

Input:
";

/// Output language of the generated commit message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Chinese.
    Zh,
    /// English subject with Chinese translation and body.
    Bilingual,
}

impl Language {
    /// Default commit system prompt for this language.
    pub fn commit_system_prompt(self) -> &'static str {
        match self {
            Self::En => COMMIT_SYSTEM_PROMPT_EN,
            Self::Zh => COMMIT_SYSTEM_PROMPT_ZH,
            Self::Bilingual => COMMIT_SYSTEM_PROMPT_BILINGUAL,
        }
    }

    /// Few-shot preamble that opens the synthesis prompt.
    pub fn few_shot_preamble(self) -> &'static str {
        match self {
            Self::En => FEW_SHOT_EN,
            Self::Zh => FEW_SHOT_ZH,
            Self::Bilingual => FEW_SHOT_BILINGUAL,
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "zh" => Ok(Self::Zh),
            "bilingual" => Ok(Self::Bilingual),
            other => Err(format!(
                "unknown language '{other}', expected en, zh or bilingual"
            )),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::Zh => "zh",
            Self::Bilingual => "bilingual",
        })
    }
}

/// User prompt asking for a one or two sentence summary of `unit`.
pub fn file_analysis_prompt(unit: &DiffUnit) -> String {
    format!(
        "Summarize the changes in this git diff in 1-2 sentences.\n\
         Focus on WHAT changed and WHY (if apparent). Be concise.\n\
         \n\
         File: {}\n\
         Diff:\n\
         {}\n\
         \n\
         Summary:",
        unit.path, unit.patch_text
    )
}
