//! RagEngine turns against the mock backend and in-memory stores.

mod common;

use std::sync::Arc;

use common::{InMemoryChats, InMemoryIndex};
use counsel_core::{Error, RetrievalStatus, Role};
use counsel_inference::mock::MockInferenceBackend;
use counsel_rag::{RagConfig, RagEngine, RagRequest, StyleExamples, StylePair, NO_CONTEXT};
use uuid::Uuid;

const DIM: usize = 32;

struct Harness {
    backend: MockInferenceBackend,
    index: Arc<InMemoryIndex>,
    chats: Arc<InMemoryChats>,
    engine: RagEngine,
}

fn harness_with(backend: MockInferenceBackend, config: RagConfig) -> Harness {
    let backend = backend.with_dimension(DIM);
    let index = Arc::new(InMemoryIndex::new());
    let chats = Arc::new(InMemoryChats::new());
    let engine = RagEngine::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        index.clone(),
        chats.clone(),
        config,
    );
    Harness {
        backend,
        index,
        chats,
        engine,
    }
}

fn harness(backend: MockInferenceBackend) -> Harness {
    harness_with(backend, RagConfig::default())
}

fn embedded_inputs(backend: &MockInferenceBackend) -> Vec<String> {
    backend
        .get_calls()
        .into_iter()
        .filter(|c| c.operation == "embed")
        .map(|c| c.input)
        .collect()
}

#[tokio::test]
async fn test_test_mode_without_cases() {
    let h = harness(MockInferenceBackend::new().with_fixed_response("  괜찮아, 천천히 얘기해 줘.  "));

    let response = h
        .engine
        .respond(RagRequest::test_mode("요즘 너무 우울해요"))
        .await
        .unwrap();

    assert_eq!(response.user_message, "요즘 너무 우울해요");
    assert_eq!(response.retrieved_documents, RetrievalStatus::NotReflected);
    assert_eq!(response.bot_response, "괜찮아, 천천히 얘기해 줘.");
    assert!(response.chat_id.is_none());
    assert!(response.sources.is_empty());
    assert!(h.chats.records().is_empty());

    // First turn: no condense call, one generation.
    assert_eq!(h.backend.generate_call_count(), 1);
    let messages = h.backend.last_messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[1].content.ends_with(NO_CONTEXT));
}

#[tokio::test]
async fn test_retrieved_cases_reach_the_prompt() {
    let h = harness(MockInferenceBackend::new());
    h.index.seed(
        "input: 시험이 너무 걱정돼요",
        Some("시험 전에 긴장하는 건 자연스러운 일이야."),
        0,
        DIM,
    );
    h.index.seed("input: 친구와 다퉜어요", None, 1, DIM);

    let response = h
        .engine
        .respond(RagRequest::test_mode("시험이 걱정돼요"))
        .await
        .unwrap();

    assert_eq!(response.retrieved_documents, RetrievalStatus::Reflected);
    assert_eq!(response.sources.len(), 2);
    assert!(response.sources[0].score >= response.sources[1].score);

    let prompt = h.backend.last_messages().unwrap().pop().unwrap().content;
    assert!(prompt.starts_with("시험이 걱정돼요"));
    assert!(prompt.contains("시험 전에 긴장하는 건 자연스러운 일이야."));
    assert!(prompt.contains("input: 친구와 다퉜어요"));
}

#[tokio::test]
async fn test_min_score_filters_hits() {
    let h = harness_with(
        MockInferenceBackend::new(),
        RagConfig {
            min_score: 1.1,
            ..RagConfig::default()
        },
    );
    h.index.seed("input: 아무 사례", Some("답변"), 0, DIM);

    let response = h
        .engine
        .respond(RagRequest::test_mode("질문"))
        .await
        .unwrap();
    assert_eq!(response.retrieved_documents, RetrievalStatus::NotReflected);
}

#[tokio::test]
async fn test_empty_message_rejected_without_calls() {
    let h = harness(MockInferenceBackend::new());
    let err = h
        .engine
        .respond(RagRequest::test_mode("   \n"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(h.backend.get_calls().is_empty());
}

#[tokio::test]
async fn test_follow_up_is_condensed_before_retrieval() {
    let h = harness(MockInferenceBackend::new().with_script([
        "어떤 시험이 걱정돼?",
        "수학 시험 때문에 불안한 학생을 어떻게 도울 수 있을까?",
        "수학은 연습하면 늘어. 같이 계획을 세워 보자.",
    ]));

    h.engine
        .respond(RagRequest::test_mode("시험이 걱정돼요"))
        .await
        .unwrap();
    let second = h
        .engine
        .respond(RagRequest::test_mode("수학이요"))
        .await
        .unwrap();

    assert_eq!(second.bot_response, "수학은 연습하면 늘어. 같이 계획을 세워 보자.");
    assert_eq!(second.user_message, "수학이요");

    let embedded = embedded_inputs(&h.backend);
    assert_eq!(
        embedded.last().unwrap(),
        "수학 시험 때문에 불안한 학생을 어떻게 도울 수 있을까?"
    );

    let messages = h.backend.last_messages().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "시험이 걱정돼요");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "어떤 시험이 걱정돼?");
    assert!(messages[3].content.starts_with("수학이요"));
}

#[tokio::test]
async fn test_blank_condensed_question_falls_back_to_message() {
    let h = harness(MockInferenceBackend::new().with_script(["첫 답변", "  \n ", "두 번째 답변"]));

    h.engine
        .respond(RagRequest::test_mode("잠이 안 와요"))
        .await
        .unwrap();
    h.engine
        .respond(RagRequest::test_mode("밤마다 그래요"))
        .await
        .unwrap();

    assert_eq!(embedded_inputs(&h.backend).last().unwrap(), "밤마다 그래요");
}

#[tokio::test]
async fn test_short_condensed_question_is_used_for_retrieval() {
    let h = harness(MockInferenceBackend::new().with_script(["첫 답변", "수학 걱정", "두 번째 답변"]));

    h.engine
        .respond(RagRequest::test_mode("시험이 걱정돼요"))
        .await
        .unwrap();
    let second = h
        .engine
        .respond(RagRequest::test_mode("그거요"))
        .await
        .unwrap();

    assert_eq!(embedded_inputs(&h.backend).last().unwrap(), "수학 걱정");
    assert_eq!(second.bot_response, "두 번째 답변");
}

#[tokio::test]
async fn test_persisted_turn_for_user() {
    let h = harness(MockInferenceBackend::new().with_fixed_response("많이 힘들었겠다."));
    let user_id = Uuid::new_v4();
    let emotion_id = Uuid::new_v4();

    let response = h
        .engine
        .respond(
            RagRequest::for_user(user_id, "s-1", "오늘 혼났어요")
                .with_emotion(Some(emotion_id), Some(0.82)),
        )
        .await
        .unwrap();

    let records = h.chats.records();
    assert_eq!(records.len(), 1);
    assert_eq!(Some(records[0].id), response.chat_id);
    assert_eq!(records[0].user_id, user_id);
    assert_eq!(records[0].session_id, "s-1");
    assert_eq!(records[0].bot_response, "많이 힘들었겠다.");
    assert_eq!(records[0].emotion_id, Some(emotion_id));
    assert_eq!(records[0].confidence, Some(0.82));
    assert!(!records[0].conversation_end);
}

#[tokio::test]
async fn test_persist_without_user_is_test_mode() {
    let h = harness(MockInferenceBackend::new());
    let mut request = RagRequest::test_mode("안녕");
    request.persist = true;

    let response = h.engine.respond(request).await.unwrap();
    assert!(response.chat_id.is_none());
    assert!(h.chats.records().is_empty());
}

#[tokio::test]
async fn test_session_memory_rehydrated_from_storage() {
    let h = harness(MockInferenceBackend::new().with_script([
        "엄마와의 갈등으로 힘든 학생에게 어떤 조언을 할 수 있을까?",
        "엄마랑 솔직하게 이야기해 보는 건 어때?",
    ]));
    let user_id = Uuid::new_v4();
    h.chats
        .push_turn(user_id, "s-9", "엄마랑 싸웠어요", "무슨 일이 있었어?");
    h.chats
        .push_turn(user_id, "s-9", "폰을 뺏겼어요", "속상했겠다.");

    let response = h
        .engine
        .respond(RagRequest::for_user(user_id, "s-9", "어떻게 해야 할까요"))
        .await
        .unwrap();

    assert_eq!(response.bot_response, "엄마랑 솔직하게 이야기해 보는 건 어때?");
    let messages = h.backend.last_messages().unwrap();
    // system + 2 stored turns + current prompt
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[1].content, "엄마랑 싸웠어요");
    assert_eq!(messages[4].content, "속상했겠다.");
    assert_eq!(h.engine.memory().history("s-9").len(), 3);
}

#[tokio::test]
async fn test_memory_is_bounded_per_session() {
    let h = harness_with(
        MockInferenceBackend::new().with_fixed_response("응, 듣고 있어. 계속 말해 줘."),
        RagConfig {
            memory_turns: 2,
            ..RagConfig::default()
        },
    );
    for message in ["하나", "둘", "셋"] {
        h.engine
            .respond(RagRequest::test_mode(message))
            .await
            .unwrap();
    }
    let history = h.engine.memory().history("test_session");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].user_message, "둘");
}

#[tokio::test]
async fn test_end_session_clears_memory() {
    let h = harness(MockInferenceBackend::new());
    h.engine
        .respond(RagRequest::test_mode("첫 메시지"))
        .await
        .unwrap();
    assert!(h.engine.end_session("test_session"));
    assert!(!h.engine.end_session("test_session"));

    h.backend.clear_calls();
    h.engine
        .respond(RagRequest::test_mode("새 대화"))
        .await
        .unwrap();
    // No condense call once memory is gone.
    assert_eq!(h.backend.generate_call_count(), 1);
}

#[tokio::test]
async fn test_generation_failure_leaves_memory_untouched() {
    let h = harness(MockInferenceBackend::new().with_generation_failure());
    let err = h
        .engine
        .respond(RagRequest::test_mode("도와주세요"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(h.engine.memory().history("test_session").is_empty());
}

#[tokio::test]
async fn test_style_examples_in_system_prompt() {
    let h = harness(MockInferenceBackend::new());
    let engine = h.engine.with_style(StyleExamples::from_pairs(vec![StylePair {
        original: "걱정하지 마십시오.".to_string(),
        converted: "걱정하지 마!".to_string(),
    }]));

    engine
        .respond(RagRequest::test_mode("불안해요"))
        .await
        .unwrap();
    let system = &h.backend.last_messages().unwrap()[0].content;
    assert!(system.contains("- 원본: 걱정하지 마십시오.\n  - 변환: 걱정하지 마!"));
}

#[tokio::test]
async fn test_preview_returns_documents_only() {
    let h = harness(MockInferenceBackend::new());
    h.index.seed("input: 진로 고민", Some("하고 싶은 걸 같이 찾아보자."), 0, DIM);

    let docs = h.engine.preview("진로가 고민이에요").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(h.backend.generate_call_count(), 0);

    assert!(matches!(
        h.engine.preview("").await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_summarize_session() {
    let h = harness(MockInferenceBackend::new().with_fixed_response(" 오늘은 시험 걱정을 털어놓았다. "));
    let user_id = Uuid::new_v4();

    assert!(matches!(
        h.engine.summarize_session("empty").await,
        Err(Error::NotFound(_))
    ));

    h.chats
        .push_turn(user_id, "s-2", "시험이 걱정돼요", "어떤 점이 걱정돼?");
    let summary = h.engine.summarize_session("s-2").await.unwrap();
    assert_eq!(summary, "오늘은 시험 걱정을 털어놓았다.");

    let messages = h.backend.last_messages().unwrap();
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "사용자: 시험이 걱정돼요\n상담사: 어떤 점이 걱정돼?");
}
