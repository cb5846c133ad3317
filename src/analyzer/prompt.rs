//! Prompt assembly for the proposal engine.

use crate::config::Language;

/// A system + user message pair.
#[derive(Debug, Clone)]
pub struct Prompt {
  pub system: String,
  pub user: String,
}

const OUTPUT_FORMAT_JA: &str = r#"## 出力形式
JSON 形式で次の配列を返してください。提案がない場合は [] を返してください。JSON 以外のテキストは含めないでください。

[
  {
    "title": "Issue のタイトル",
    "description": "Issue の詳細 (Markdown)",
    "relatedSlackMessages": ["関連するメッセージのタイムスタンプや引用"],
    "reasoning": "この Issue が必要な理由"
  }
]"#;

const OUTPUT_FORMAT_EN: &str = r#"## Output format
Return a JSON array like the one below. Return [] when there is nothing to propose. Return JSON only, no other text.

[
  {
    "title": "Issue title",
    "description": "Issue details (Markdown)",
    "relatedSlackMessages": ["Timestamps or quotes of related messages"],
    "reasoning": "Why this issue should exist"
  }
]"#;

/// Compare conversations against existing issues and ask for what is missing.
pub fn conversation_prompt(language: Language, messages: &str, issues: &str) -> Prompt {
  match language {
    Language::Ja => Prompt {
      system: "あなたはプロジェクト管理を支援するアシスタントです。Slack の会話を分析し、GitHub Issue を提案します。必ず JSON で、日本語で回答してください。".to_string(),
      user: format!(
        "以下の Slack の会話ログと既存の GitHub Issue を比較し、まだチケット化されていない話題 (バグ報告、機能提案、改善案、技術的課題、TODO) を抽出してください。\n\n## Slack 会話ログ\n{}\n\n## 既存の GitHub Issues\n{}\n\n{}",
        messages, issues, OUTPUT_FORMAT_JA
      ),
    },
    Language::En => Prompt {
      system: "You assist with project management. You analyze Slack conversations and propose GitHub issues. Always answer in JSON, in English.".to_string(),
      user: format!(
        "Compare the Slack conversation log below with the existing GitHub issues and extract topics that have not been ticketed yet (bug reports, feature proposals, improvements, technical challenges, TODOs).\n\n## Slack conversation log\n{}\n\n## Existing GitHub issues\n{}\n\n{}",
        messages, issues, OUTPUT_FORMAT_EN
      ),
    },
  }
}

/// Anonymize a free-form document and break it into story-sized tasks.
pub fn markdown_prompt(language: Language, markdown: &str) -> Prompt {
  match language {
    Language::Ja => Prompt {
      system: "あなたはプロジェクト管理を支援するアシスタントです。文書を匿名化した上で GitHub Issue を提案します。必ず JSON で、日本語で回答してください。".to_string(),
      user: format!(
        "次の文書の個人名を Person A, Person B... に、組織名を Organization A, Organization B... に置き換えてください (技術用語や製品名はそのまま)。その上で、機能単位のタスクを抽出してください。\n\n## 入力テキスト\n{}\n\n{}",
        markdown, OUTPUT_FORMAT_JA
      ),
    },
    Language::En => Prompt {
      system: "You assist with project management. You anonymize documents and propose GitHub issues. Always answer in JSON, in English.".to_string(),
      user: format!(
        "Replace personal names in the document below with Person A, Person B... and organization names with Organization A, Organization B... (keep technical terms and product names). Then extract story-level tasks.\n\n## Input text\n{}\n\n{}",
        markdown, OUTPUT_FORMAT_EN
      ),
    },
  }
}
