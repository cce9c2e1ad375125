//! Prompt assembly for counseling replies.

use counsel_core::{ChatRecord, ChatTurn, RetrievedDocument};

/// Context used when no counseling case was retrieved.
pub const NO_CONTEXT: &str = "No prior counseling records were found.";

const DEFAULT_PERSONA: &str = "당신은 청소년 고민 상담을 도와주는 AI 챗봇입니다.
사용자가 편안하게 대화를 나눌 수 있도록, 친구처럼 자연스럽게 말해 주세요.

상담 원칙:
- 먼저 사용자의 감정을 알아주고 공감해 주세요.
- 판단하거나 훈계하지 말고, 사용자의 입장에서 생각해 주세요.
- 참고할 상담 사례가 있으면 그 내용을 바탕으로 구체적인 도움을 주세요.
- 자해나 위험한 상황이 의심되면 믿을 수 있는 어른이나 전문 기관(청소년상담 1388)에 도움을 요청하도록 부드럽게 안내해 주세요.";

const CONDENSE_SYSTEM: &str = "대화 기록과 후속 질문이 주어집니다. \
후속 질문을 대화 기록 없이도 이해할 수 있는 하나의 독립적인 질문으로 바꿔 쓰세요. \
바꿔 쓴 질문만 출력하세요.";

const SUMMARY_SYSTEM: &str = "당신은 상담 대화를 일기로 정리해 주는 도우미입니다. \
사용자의 입장에서 1인칭으로, 오늘 이야기한 고민과 느낀 감정, 얻은 생각을 3~5문장의 짧은 일기로 요약하세요.";

/// Builds the system, condense, answer and summary prompts.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn with_persona(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Persona and principles, followed by tone examples when available.
    pub fn system_prompt(&self, style: Option<&str>) -> String {
        match style {
            Some(examples) if !examples.trim().is_empty() => format!(
                "{}\n\n응답을 생성할 때, 아래 스타일 예제를 참고해서 대화 스타일을 유지하세요.\n\n\
                 **말투 스타일 예제**:\n{}",
                self.persona, examples
            ),
            _ => self.persona.clone(),
        }
    }

    pub fn condense_system(&self) -> &'static str {
        CONDENSE_SYSTEM
    }

    /// Ask for a standalone rewrite of `question` given the prior turns.
    pub fn condense_prompt(&self, history: &[ChatTurn], question: &str) -> String {
        let transcript = history
            .iter()
            .map(|turn| format!("사용자: {}\n챗봇: {}", turn.user_message, turn.bot_response))
            .collect::<Vec<_>>()
            .join("\n");
        format!("대화 기록:\n{transcript}\n\n후속 질문: {question}\n독립적인 질문:")
    }

    /// The user's message with the retrieved counseling cases attached.
    pub fn answer_prompt(&self, question: &str, context: &str) -> String {
        format!("{question}\n\n참고할 상담 사례:\n{context}")
    }

    pub fn summary_system(&self) -> &'static str {
        SUMMARY_SYSTEM
    }

    /// Transcript of a session for diary summarization.
    pub fn summary_prompt(&self, transcript: &[ChatRecord]) -> String {
        transcript
            .iter()
            .map(|record| format!("사용자: {}\n상담사: {}", record.user_message, record.bot_response))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Newline-joined case text, preferring each document's counselor `output`.
pub fn render_context(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return NO_CONTEXT.to_string();
    }
    docs.iter()
        .map(|doc| match doc.output.as_deref().map(str::trim) {
            Some(output) if !output.is_empty() => output.to_string(),
            _ => doc.content.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(content: &str, output: Option<&str>) -> RetrievedDocument {
        RetrievedDocument {
            id: Uuid::new_v4(),
            content: content.to_string(),
            output: output.map(str::to_string),
            source: "corpus".to_string(),
            row: 0,
            chunk_index: 0,
            score: 0.9,
            metadata: json!({}),
        }
    }

    #[test]
    fn test_render_context_prefers_trimmed_output() {
        let docs = vec![
            doc("input: 시험이 걱정돼요\noutput: 많이 긴장되지?", Some("  많이 긴장되지?  ")),
            doc("input: 친구랑 싸웠어요", None),
            doc("input: 잠이 안 와요", Some("   ")),
        ];
        assert_eq!(
            render_context(&docs),
            "많이 긴장되지?\ninput: 친구랑 싸웠어요\ninput: 잠이 안 와요"
        );
    }

    #[test]
    fn test_render_context_empty() {
        assert_eq!(render_context(&[]), NO_CONTEXT);
    }

    #[test]
    fn test_system_prompt_with_and_without_style() {
        let builder = PromptBuilder::default();
        let plain = builder.system_prompt(None);
        assert!(plain.starts_with("당신은 청소년 고민 상담"));
        assert!(!plain.contains("스타일 예제"));

        let styled = builder.system_prompt(Some("- 원본: a\n  - 변환: b"));
        assert!(styled.contains("스타일 예제"));
        assert!(styled.ends_with("- 원본: a\n  - 변환: b"));

        assert_eq!(builder.system_prompt(Some("  ")), plain);
    }

    #[test]
    fn test_condense_prompt_includes_history() {
        let builder = PromptBuilder::with_persona("persona");
        let prompt = builder.condense_prompt(
            &[ChatTurn::new("시험이 걱정돼", "어떤 시험이야?")],
            "수학이야",
        );
        assert!(prompt.contains("사용자: 시험이 걱정돼\n챗봇: 어떤 시험이야?"));
        assert!(prompt.contains("후속 질문: 수학이야"));
    }

    #[test]
    fn test_answer_prompt() {
        let prompt = PromptBuilder::default().answer_prompt("힘들어", NO_CONTEXT);
        assert_eq!(prompt, format!("힘들어\n\n참고할 상담 사례:\n{NO_CONTEXT}"));
    }
}
