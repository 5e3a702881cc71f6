// tests/pipeline_properties.rs
//
// Evaluator behaviour with and without the AI capability. The model is a
// scripted in-process stub, so "zero calls" is directly observable.

mod common;

use std::sync::Arc;

use campus_connect::analyze::composite::CompositeAnalyzer;
use campus_connect::analyze::moderation::{AI_REASON, KEYWORD_REASON};
use campus_connect::analyze::{
    AiCapability, AnalysisRequest, AutoCategorizer, Category, CompositeAnalysis, ContentPipeline,
    ModerationEvaluator, Summarizer,
};
use campus_connect::config::{AnalysisMode, ContentRules};
use campus_connect::GenerationError;

use common::{enabled, StubGenerator, LONG_BODY};

fn rules() -> Arc<ContentRules> {
    Arc::new(ContentRules::default())
}

// ---------- moderation ----------

#[tokio::test]
async fn blocklisted_text_is_flagged_without_credential() {
    let ev = ModerationEvaluator::new(rules(), AiCapability::Disabled);
    for (title, body) in [
        ("Free SCAM alert", "details inside"),
        ("hello", "this is Spam"),
        ("Totally real", "100% FAKE reviews"),
    ] {
        let r = ev.evaluate(&AnalysisRequest::new(title, body)).await;
        assert!(r.flagged, "expected flag for {title:?}/{body:?}");
        assert_eq!(r.reason.as_deref(), Some(KEYWORD_REASON));
    }
}

#[tokio::test]
async fn ai_verdict_overrides_blocklist_both_ways() {
    let safe = StubGenerator::always("SAFE");
    let ev = ModerationEvaluator::new(rules(), enabled(&safe));
    let r = ev.evaluate(&AnalysisRequest::new("spam", "ham")).await;
    assert!(!r.flagged);
    assert_eq!(r.reason, None);

    let flagged = StubGenerator::always("FLAGGED");
    let ev = ModerationEvaluator::new(rules(), enabled(&flagged));
    let r = ev.evaluate(&AnalysisRequest::new("Lab hours", "room 204")).await;
    assert!(r.flagged);
    assert_eq!(r.reason.as_deref(), Some(AI_REASON));
    assert!(flagged.prompts()[0].contains("Lab hours room 204"));
}

#[tokio::test]
async fn ai_failure_falls_back_to_blocklist() {
    let stub = StubGenerator::failing(GenerationError::RateLimited { attempts: 3 });
    let ev = ModerationEvaluator::new(rules(), enabled(&stub));
    let r = ev.evaluate(&AnalysisRequest::new("scam", "x")).await;
    assert!(r.flagged);
    assert_eq!(r.reason.as_deref(), Some(KEYWORD_REASON));
    assert_eq!(stub.calls(), 1);
}

// ---------- summarizer ----------

#[tokio::test]
async fn short_text_is_never_summarized() {
    let stub = StubGenerator::always("A summary.");
    let s = Summarizer::new(enabled(&stub));
    assert_eq!(s.summarize(&"x".repeat(199)).await, None);
    assert_eq!(stub.calls(), 0);

    let s = Summarizer::new(AiCapability::Disabled);
    assert_eq!(s.summarize("short").await, None);
}

#[tokio::test]
async fn long_text_is_summarized_when_enabled() {
    let stub = StubGenerator::always("  Midterm outline covering core data structures.  ");
    let s = Summarizer::new(enabled(&stub));
    assert_eq!(
        s.summarize(LONG_BODY).await.as_deref(),
        Some("Midterm outline covering core data structures.")
    );
}

#[tokio::test]
async fn summary_failure_is_absent_not_fabricated() {
    let stub = StubGenerator::failing(GenerationError::Service { status: 503 });
    let s = Summarizer::new(enabled(&stub));
    assert_eq!(s.summarize(LONG_BODY).await, None);
}

// ---------- categorizer ----------

#[tokio::test]
async fn keyword_rule_short_circuits_the_model() {
    let stub = StubGenerator::always("Events");
    let c = AutoCategorizer::new(rules(), enabled(&stub));
    let got = c
        .categorize(&AnalysisRequest::new("Quick one", "what is on the exam?"))
        .await;
    assert_eq!(got, Category::Notes);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn model_label_is_validated_against_closed_set() {
    for (reply, expected) in [
        ("Opportunities", Category::Opportunities),
        ("events\n", Category::Events),
        ("Projects", Category::General),
        ("I think this is about sports", Category::General),
        ("", Category::General),
    ] {
        let stub = StubGenerator::always(reply);
        let c = AutoCategorizer::new(rules(), enabled(&stub));
        let got = c
            .categorize(&AnalysisRequest::new("Campus radio", "tune in tonight"))
            .await;
        assert_eq!(got, expected, "reply {reply:?}");
        assert_eq!(stub.calls(), 1);
    }
}

#[tokio::test]
async fn categorizer_is_deterministic_without_credential() {
    let c = AutoCategorizer::new(rules(), AiCapability::Disabled);
    let req = AnalysisRequest::new("Campus radio", "tune in tonight");
    let a = c.categorize(&req).await;
    let b = c.categorize(&req).await;
    assert_eq!(a, Category::General);
    assert_eq!(a, b);
}

// ---------- composite ----------

#[tokio::test]
async fn composite_missing_key_yields_full_default() {
    let stub = StubGenerator::always(r#"{"flagged": true, "summary": "Party on Friday"}"#);
    let c = CompositeAnalyzer::new(enabled(&stub));
    let got = c.analyze(&AnalysisRequest::new("t", "b")).await;
    assert_eq!(got, CompositeAnalysis::safe_default());
    assert!(!got.flagged);
}

#[tokio::test]
async fn composite_accepts_fenced_payload() {
    let stub = StubGenerator::always(
        "```json\n{\"flagged\": false, \"summary\": \"Robotics club meets Tuesday\", \"category\": \"Events\"}\n```",
    );
    let c = CompositeAnalyzer::new(enabled(&stub));
    let got = c.analyze(&AnalysisRequest::new("Robotics", "club")).await;
    assert_eq!(
        got,
        CompositeAnalysis {
            flagged: false,
            summary: Some("Robotics club meets Tuesday".into()),
            category: Category::Events,
        }
    );
}

#[tokio::test]
async fn composite_without_credential_or_on_error_is_default() {
    let c = CompositeAnalyzer::new(AiCapability::Disabled);
    assert_eq!(
        c.analyze(&AnalysisRequest::new("spam", "spam")).await,
        CompositeAnalysis::safe_default()
    );

    let stub = StubGenerator::failing(GenerationError::Network("reset".into()));
    let c = CompositeAnalyzer::new(enabled(&stub));
    assert_eq!(
        c.analyze(&AnalysisRequest::new("t", "b")).await,
        CompositeAnalysis::safe_default()
    );
}

// ---------- end to end ----------

#[tokio::test]
async fn e2e_midterm_notes_without_credential() {
    let p = ContentPipeline::new(rules(), AiCapability::Disabled, AnalysisMode::Separate);
    assert!(LONG_BODY.chars().count() >= 200);
    let got = p.analyze(&AnalysisRequest::new("Midterm notes", LONG_BODY)).await;
    assert!(!got.flagged);
    assert_eq!(got.reason, None);
    assert_eq!(got.summary, None);
    assert_eq!(got.category, Category::Notes);
}

#[tokio::test]
async fn e2e_spam_deal_without_credential() {
    let p = ContentPipeline::new(rules(), AiCapability::Disabled, AnalysisMode::Separate);
    let got = p.analyze(&AnalysisRequest::new("spam deal", "buy now")).await;
    assert!(got.flagged);
    assert_eq!(got.reason.as_deref(), Some(KEYWORD_REASON));
    assert_eq!(got.category, Category::General);
    assert_eq!(got.summary, None);
}

#[tokio::test]
async fn separate_mode_keeps_partial_results() {
    // Moderation and summary answers are served in call order; category
    // resolves via keyword rules and never asks the model.
    let stub = StubGenerator::scripted(
        vec![Ok("SAFE".into())],
        Err(GenerationError::Service { status: 500 }),
    );
    let p = ContentPipeline::new(rules(), enabled(&stub), AnalysisMode::Separate);
    let got = p.analyze(&AnalysisRequest::new("Midterm notes", LONG_BODY)).await;
    assert!(!got.flagged);
    assert_eq!(got.summary, None);
    assert_eq!(got.category, Category::Notes);
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn composite_mode_makes_one_call() {
    let stub = StubGenerator::always(
        r#"{"flagged": true, "summary": "Suspicious giveaway", "category": "General"}"#,
    );
    let p = ContentPipeline::new(rules(), enabled(&stub), AnalysisMode::Composite);
    let got = p.analyze(&AnalysisRequest::new("Giveaway", LONG_BODY)).await;
    assert_eq!(stub.calls(), 1);
    assert!(got.flagged);
    assert_eq!(got.reason.as_deref(), Some(AI_REASON));
    assert_eq!(got.summary.as_deref(), Some("Suspicious giveaway"));
}
