// Context builder: retrieved concepts -> bounded prompt blocks
use serde::{Deserialize, Serialize};

use crate::rag::retrieval::SearchResult;

/// System prompt constraining the model to the supplied references
pub const GROUNDING_SYSTEM_PROMPT: &str = "\
당신은 음악 이론 교육용 질의응답 어시스턴트입니다.

원칙:
1. 사용자 메시지에 포함된 [참고자료]에 적힌 내용만 사용하세요.
2. 참고자료에 없는 일반 지식, 추측, 유추를 덧붙이지 마세요.
3. 문장마다 근거가 된 참고자료 번호를 [참고자료 N] 형식으로 표시하세요.
4. 참고자료로 답할 수 없는 부분은 답할 수 없다고 분명히 밝히세요.

답변 구성:
- 핵심 내용 요약
- 참고자료 번호를 붙인 세부 설명
- 참고자료에 없어 답하지 못한 부분

용어는 참고자료의 표기를 그대로 쓰고, 영어 용어는 원문을 유지하세요.";

/// Shown in place of reference blocks when nothing was retrieved
pub const NO_SOURCES_MARKER: &str = "(참고자료가 없습니다.)";

const TRUNCATION_SUFFIX: &str = "...";
const SEPARATOR_WIDTH: usize = 28;

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum number of sources formatted into the prompt
    pub max_passages: usize,
    /// Per-field character budget before truncation
    pub field_char_budget: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_passages: 2,
            field_char_budget: 300,
        }
    }
}

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted reference blocks
    pub text: String,
    /// Number of sources included
    pub document_count: usize,
    /// Node ids of included sources, in block order
    pub node_ids: Vec<Option<i64>>,
}

/// Cut `text` to `budget` characters, appending `...` when anything was cut.
///
/// Counts chars rather than bytes so Hangul is never split mid-codepoint.
pub fn truncate_field(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(budget).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Context builder for assembling RAG context
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    /// Create new context builder with default config
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Format up to `max_passages` sources as numbered reference blocks
    pub fn build(&self, sources: &[SearchResult]) -> AssembledContext {
        let included = &sources[..sources.len().min(self.config.max_passages)];

        let text = included
            .iter()
            .enumerate()
            .map(|(i, source)| self.format_source(i + 1, source))
            .collect::<String>();

        AssembledContext {
            text,
            document_count: included.len(),
            node_ids: included.iter().map(|s| s.record.node_id).collect(),
        }
    }

    /// Format a single source block
    pub fn format_source(&self, index: usize, source: &SearchResult) -> String {
        let budget = self.config.field_char_budget;
        let record = &source.record;
        let field = |text: &str| truncate_field(text, budget);

        let mut block = format!(
            "\n[참고자료 {}]\n용어(한글): {}\n용어(영문): {}\n동의어·유사 표기: {}\n[정의]: {}\n[원리]: {}\n",
            index,
            field(&record.concept_ko),
            field(&record.concept_en),
            field(&record.aliases_joined()),
            field(&record.definition),
            field(&record.logic),
        );

        if !record.example_name.is_empty() {
            block.push_str(&format!("예시: {}\n", field(&record.example_name)));
            if !record.example_description.is_empty() {
                block.push_str(&format!(
                    "예시 설명: {}\n",
                    field(&record.example_description)
                ));
            }
        }
        if !record.tips.is_empty() {
            block.push_str(&format!("[팁]: {}\n", field(&record.tips)));
        }
        block.push_str(&"-".repeat(SEPARATOR_WIDTH));
        block
    }

    /// User turn: the question followed by reference blocks
    pub fn user_message(&self, query: &str, sources: &[SearchResult]) -> String {
        let context = self.build(sources);
        if context.text.trim().is_empty() {
            format!("질문: {}\n\n{}", query, NO_SOURCES_MARKER)
        } else {
            format!("질문: {}\n\n{}", query, context.text)
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Update configuration
    pub fn set_config(&mut self, config: ContextConfig) {
        self.config = config;
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::ConceptRecord;
    use quickcheck_macros::quickcheck;

    fn source(name: &str, definition: &str) -> SearchResult {
        let mut record = ConceptRecord::named(name);
        record.definition = definition.to_string();
        SearchResult::new(record, 0.9, 1)
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_field("도미넌트", 10), "도미넌트");
        assert_eq!(truncate_field("", 0), "");
    }

    #[test]
    fn test_truncate_counts_chars() {
        let text = "가나다라마바사";
        assert_eq!(truncate_field(text, 3), "가나다...");
    }

    #[quickcheck]
    fn prop_truncated_field_within_budget(text: String, budget: u8) -> bool {
        let budget = budget as usize;
        let out = truncate_field(&text, budget);
        out.chars().count() <= budget + TRUNCATION_SUFFIX.chars().count()
    }

    #[test]
    fn test_block_fields_are_truncated() {
        let builder = ContextBuilder::with_config(ContextConfig {
            max_passages: 2,
            field_char_budget: 5,
        });
        let long = "가".repeat(50);
        let block = builder.format_source(1, &source("세컨더리 도미넌트", &long));

        let definition_line = block
            .lines()
            .find(|l| l.starts_with("[정의]: "))
            .unwrap();
        let value = definition_line.trim_start_matches("[정의]: ");
        assert_eq!(value, "가가가가가...");
        assert!(value.chars().count() <= 5 + 3);
    }

    #[test]
    fn test_optional_lines_only_when_present() {
        let builder = ContextBuilder::new();
        let plain = builder.format_source(1, &source("토닉", "으뜸화음"));
        assert!(!plain.contains("예시:"));
        assert!(!plain.contains("[팁]"));
        assert!(plain.ends_with(&"-".repeat(28)));

        let mut rich = source("토닉", "으뜸화음");
        rich.record.example_name = "C - F - G - C".to_string();
        rich.record.example_description = "C장조 종지".to_string();
        rich.record.tips = "귀로 먼저".to_string();
        let block = builder.format_source(2, &rich);
        assert!(block.contains("[참고자료 2]"));
        assert!(block.contains("예시: C - F - G - C"));
        assert!(block.contains("예시 설명: C장조 종지"));
        assert!(block.contains("[팁]: 귀로 먼저"));
    }

    #[test]
    fn test_build_respects_max_passages() {
        let builder = ContextBuilder::new();
        let sources = vec![source("a", "1"), source("b", "2"), source("c", "3")];
        let context = builder.build(&sources);
        assert_eq!(context.document_count, 2);
        assert!(context.text.contains("[참고자료 2]"));
        assert!(!context.text.contains("[참고자료 3]"));
    }

    #[test]
    fn test_user_message_without_sources() {
        let builder = ContextBuilder::new();
        let message = builder.user_message("화성이란?", &[]);
        assert!(message.starts_with("질문: 화성이란?"));
        assert!(message.ends_with(NO_SOURCES_MARKER));
    }

    #[test]
    fn test_user_message_with_sources() {
        let builder = ContextBuilder::new();
        let message = builder.user_message("토닉이란?", &[source("토닉", "으뜸화음")]);
        assert!(message.contains("[참고자료 1]"));
        assert!(message.contains("[정의]: 으뜸화음"));
    }
}
