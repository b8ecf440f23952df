//! Integration tests for the request pipeline.
//!
//! Providers and search backends are in-process mocks; clock-driven cases
//! run with paused tokio time so timeouts and budgets resolve instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use medgate::cache::{CacheBackend, CacheEntry, Fingerprint};
use medgate::gateway::fallback::{DISCLAIMER, GENERIC_GUIDANCE, fallback_answer};
use medgate::prompt::Prompt;
use medgate::providers::{ProviderClient, ProviderDescriptor};
use medgate::search::SearchBackend;
use medgate::{
    AuditRecord, AuditSink, CacheConfig, ChatOutcome, ChatRequest, ChatResponse, Medgate,
    MedgateBuilder, MedgateError, Mode, PatientContext, RateLimitConfig, Result, ResultKind,
    SearchResult,
};

// ============================================================================
// Mocks
// ============================================================================

enum Behaviour {
    Answer(&'static str),
    Auth,
    Malformed,
    /// Never completes; only a timeout ends the call.
    Hang,
}

struct MockProvider {
    name: &'static str,
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<Prompt>>,
}

impl MockProvider {
    fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, prompt: &Prompt, _max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        match self.behaviour {
            Behaviour::Answer(text) => Ok(text.to_string()),
            Behaviour::Auth => Err(MedgateError::ProviderAuth {
                provider: self.name.to_string(),
            }),
            Behaviour::Malformed => Err(MedgateError::ProviderMalformedResponse {
                provider: self.name.to_string(),
                detail: "no choices".into(),
            }),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

struct FailingSearch;

#[async_trait]
impl SearchBackend for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Err(MedgateError::SearchUnavailable("HTTP 503".into()))
    }
}

struct StaticSearch(Vec<SearchResult>);

#[async_trait]
impl SearchBackend for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Ok(self.0.clone())
    }
}

struct BrokenCache;

#[async_trait]
impl CacheBackend for BrokenCache {
    fn name(&self) -> &str {
        "broken"
    }

    async fn get(&self, _key: &Fingerprint) -> Result<Option<CacheEntry>> {
        Err(MedgateError::CacheBackendUnavailable("connection refused".into()))
    }

    async fn put(&self, _key: &Fingerprint, _entry: CacheEntry) -> Result<()> {
        Err(MedgateError::CacheBackendUnavailable("connection refused".into()))
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<AuditRecord>>);

impl AuditSink for RecordingSink {
    fn record(&self, record: &AuditRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn builder_with(providers: &[(u32, &Arc<MockProvider>)]) -> MedgateBuilder {
    providers
        .iter()
        .fold(Medgate::builder(), |b, (priority, provider)| {
            b.provider(
                ProviderDescriptor::new(provider.name, *priority).timeout(Duration::from_secs(5)),
                Arc::clone(provider) as Arc<dyn ProviderClient>,
            )
        })
}

fn answer(outcome: ChatOutcome) -> ChatResponse {
    match outcome {
        ChatOutcome::Answered(response) => response,
        ChatOutcome::RateLimited { .. } => panic!("unexpectedly rate limited"),
    }
}

// ============================================================================
// Fallback guidance
// ============================================================================

#[tokio::test]
async fn fever_with_all_providers_failing_returns_fever_guidance() {
    let primary = MockProvider::new("primary", Behaviour::Auth);
    let orchestrator = builder_with(&[(0, &primary)]).build().unwrap();

    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "I have a fever")).await);

    assert!(response.is_fallback);
    assert_eq!(response.model_used, "fallback");
    assert_eq!(response.content, fallback_answer("fever").content);
    assert!(response.citations.is_empty());
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn unmatched_message_returns_generic_guidance() {
    let primary = MockProvider::new("primary", Behaviour::Malformed);
    let orchestrator = builder_with(&[(0, &primary)]).build().unwrap();

    let response = answer(
        orchestrator
            .handle(&ChatRequest::new("u1", "Where is my appointment letter?"))
            .await,
    );

    assert!(response.is_fallback);
    assert!(response.content.starts_with(GENERIC_GUIDANCE));
    assert!(response.content.ends_with(DISCLAIMER));
}

#[tokio::test(start_paused = true)]
async fn headache_with_providers_unavailable_answers_within_budget() {
    let primary = MockProvider::new("primary", Behaviour::Answer("should not be called"));
    let secondary = MockProvider::new("secondary", Behaviour::Answer("should not be called"));
    let budget = Duration::from_secs(10);
    let orchestrator = builder_with(&[(0, &primary), (1, &secondary)])
        .request_timeout(budget)
        .build()
        .unwrap();
    orchestrator.tracker().mark_failure("primary");
    orchestrator.tracker().mark_failure("secondary");

    let start = Instant::now();
    let request = ChatRequest::new("u1", "What helps a headache?").mode(Mode::Public);
    let response = answer(orchestrator.handle(&request).await);

    assert!(start.elapsed() <= budget);
    assert!(response.is_fallback);
    assert_eq!(response.model_used, "fallback");
    assert!(response.content.contains("headache"));
    assert!(response.content.contains("consult a doctor"));
    assert!(response.content.contains("not generated by a live model"));
    assert_eq!(primary.calls(), 0);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn never_errors_when_providers_and_search_all_fail() {
    let hanging = MockProvider::new("hanging", Behaviour::Hang);
    let auth = MockProvider::new("auth", Behaviour::Auth);
    let malformed = MockProvider::new("malformed", Behaviour::Malformed);
    let orchestrator = builder_with(&[(0, &hanging), (1, &auth), (2, &malformed)])
        .search(Arc::new(FailingSearch))
        .disable_cache()
        .build()
        .unwrap();

    for _ in 0..3 {
        let response = answer(orchestrator.handle(&ChatRequest::new("u1", "cough")).await);
        assert!(response.is_fallback);
        assert!(response.content.contains("cough"));
    }
    // Every provider cooled down after its first failure
    assert_eq!(hanging.calls(), 1);
    assert_eq!(auth.calls(), 1);
    assert_eq!(malformed.calls(), 1);
}

// ============================================================================
// Provider walk
// ============================================================================

#[tokio::test]
async fn walks_providers_in_priority_order_and_skips_cooling_down() {
    let flaky = MockProvider::new("flaky", Behaviour::Auth);
    let steady = MockProvider::new("steady", Behaviour::Answer("Rest and fluids."));
    // Registered out of order; priority decides
    let orchestrator = builder_with(&[(1, &steady), (0, &flaky)])
        .disable_cache()
        .build()
        .unwrap();

    let first = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);
    assert_eq!(first.model_used, "steady");
    assert_eq!(first.content, "Rest and fluids.");
    assert!(!first.is_fallback);
    assert!(!orchestrator.tracker().is_available("flaky"));

    let second = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);
    assert_eq!(second.model_used, "steady");
    assert_eq!(flaky.calls(), 1);
    assert_eq!(steady.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn provider_timeout_marks_failure() {
    let slow = MockProvider::new("slow", Behaviour::Hang);
    let fast = MockProvider::new("fast", Behaviour::Answer("ok"));
    let orchestrator = Medgate::builder()
        .provider(
            ProviderDescriptor::new("slow", 0).timeout(Duration::from_secs(1)),
            slow.clone(),
        )
        .provider(ProviderDescriptor::new("fast", 1), fast.clone())
        .build()
        .unwrap();

    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "rash")).await);

    assert_eq!(response.model_used, "fast");
    assert!(!orchestrator.tracker().is_available("slow"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_skips_remaining_providers_without_blame() {
    let slow = MockProvider::new("slow", Behaviour::Hang);
    let never = MockProvider::new("never", Behaviour::Answer("too late"));
    let orchestrator = Medgate::builder()
        .provider(
            ProviderDescriptor::new("slow", 0).timeout(Duration::from_secs(20)),
            slow.clone(),
        )
        .provider(ProviderDescriptor::new("never", 1), never.clone())
        .request_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let start = Instant::now();
    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);

    assert!(response.is_fallback);
    assert!(start.elapsed() <= Duration::from_secs(2) + Duration::from_millis(10));
    assert_eq!(never.calls(), 0);
    // Cut short by the request budget, not by its own timeout
    assert!(orchestrator.tracker().is_available("slow"));
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn repeated_question_is_served_from_cache() {
    let provider = MockProvider::new("primary", Behaviour::Answer("Drink water."));
    let orchestrator = builder_with(&[(0, &provider)]).build().unwrap();

    let first = answer(orchestrator.handle(&ChatRequest::new("u1", "What helps a headache?")).await);
    let second = answer(
        orchestrator
            .handle(&ChatRequest::new("u2", "  what HELPS a   headache? "))
            .await,
    );

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.content, first.content);
    assert_eq!(second.model_used, "primary");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn different_patients_never_share_cache_entries() {
    let provider = MockProvider::new("primary", Behaviour::Answer("Personal advice."));
    let orchestrator = builder_with(&[(0, &provider)]).build().unwrap();

    let for_patient = |id: &str| {
        ChatRequest::new("u1", "Can I take ibuprofen?")
            .mode(Mode::Private)
            .patient(PatientContext::new(id).medication("warfarin"))
    };

    let a = answer(orchestrator.handle(&for_patient("patient-a")).await);
    let b = answer(orchestrator.handle(&for_patient("patient-b")).await);
    let a_again = answer(orchestrator.handle(&for_patient("patient-a")).await);

    assert!(!a.cached);
    assert!(!b.cached);
    assert!(a_again.cached);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn fallback_answers_are_cached_with_fallback_ttl() {
    let provider = MockProvider::new("primary", Behaviour::Auth);
    let orchestrator = builder_with(&[(0, &provider)])
        .cache(CacheConfig::new().fallback_ttl(Duration::from_secs(60)))
        .build()
        .unwrap();

    let first = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);
    let second = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);

    assert!(first.is_fallback && !first.cached);
    assert!(second.is_fallback && second.cached);
}

#[tokio::test]
async fn zero_fallback_ttl_does_not_cache_fallbacks() {
    let provider = MockProvider::new("primary", Behaviour::Auth);
    let orchestrator = builder_with(&[(0, &provider)])
        .cache(CacheConfig::new().fallback_ttl(Duration::ZERO))
        .build()
        .unwrap();

    orchestrator.handle(&ChatRequest::new("u1", "fever")).await;
    let second = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);

    assert!(!second.cached);
}

#[tokio::test]
async fn broken_cache_backend_is_bypassed() {
    let provider = MockProvider::new("primary", Behaviour::Answer("Still answered."));
    let orchestrator = builder_with(&[(0, &provider)])
        .cache_backend(Arc::new(BrokenCache))
        .build()
        .unwrap();

    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "fever")).await);

    assert_eq!(response.content, "Still answered.");
    assert!(!response.cached);
}

// ============================================================================
// Search and prompt
// ============================================================================

#[tokio::test]
async fn ranked_citations_are_attached_and_sent_to_provider() {
    let provider = MockProvider::new("primary", Behaviour::Answer("See [1]."));
    let results = vec![
        SearchResult::new(
            "https://blog.example.com/headaches",
            "My headache story",
            "Unrelated ramblings.",
            ResultKind::Organic,
        ),
        SearchResult::new(
            "https://www.mayoclinic.org/headache",
            "Headache relief",
            "Rest helps a headache.",
            ResultKind::KnowledgeGraph,
        ),
    ];
    let orchestrator = builder_with(&[(0, &provider)])
        .search(Arc::new(StaticSearch(results)))
        .build()
        .unwrap();

    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "What helps a headache?")).await);

    assert_eq!(response.citations[0].url, "https://www.mayoclinic.org/headache");
    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.user.contains("[1] Headache relief (https://www.mayoclinic.org/headache)"));
    assert!(prompt.user.ends_with("Question: What helps a headache?"));
}

#[tokio::test]
async fn failing_search_yields_no_citations() {
    let provider = MockProvider::new("primary", Behaviour::Answer("Plain answer."));
    let orchestrator = builder_with(&[(0, &provider)])
        .search(Arc::new(FailingSearch))
        .build()
        .unwrap();

    let response = answer(orchestrator.handle(&ChatRequest::new("u1", "sore throat")).await);

    assert_eq!(response.content, "Plain answer.");
    assert!(response.citations.is_empty());
    assert!(!provider.last_prompt().unwrap().user.contains("Sources:"));
}

#[tokio::test]
async fn patient_profile_only_rendered_in_private_mode() {
    let provider = MockProvider::new("primary", Behaviour::Answer("ok"));
    let orchestrator = builder_with(&[(0, &provider)]).disable_cache().build().unwrap();
    let patient = PatientContext::new("p1").age(71).allergy("penicillin");

    let private = ChatRequest::new("u1", "Which antibiotic?")
        .mode(Mode::Private)
        .patient(patient.clone());
    orchestrator.handle(&private).await;
    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.user.contains("Patient profile:"));
    assert!(prompt.user.contains("- Allergies: penicillin"));

    let public = ChatRequest::new("u1", "Which antibiotic?").patient(patient);
    orchestrator.handle(&public).await;
    assert!(!provider.last_prompt().unwrap().user.contains("penicillin"));
}

// ============================================================================
// Rate limiting and audit
// ============================================================================

#[tokio::test(start_paused = true)]
async fn over_limit_caller_is_rate_limited() {
    let provider = MockProvider::new("primary", Behaviour::Answer("ok"));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = builder_with(&[(0, &provider)])
        .rate_limit(RateLimitConfig::new().capacity(2).window(Duration::from_secs(60)))
        .audit_sink(sink.clone())
        .build()
        .unwrap();

    assert!(!orchestrator.handle(&ChatRequest::new("u1", "a")).await.is_rate_limited());
    assert!(!orchestrator.handle(&ChatRequest::new("u1", "b")).await.is_rate_limited());
    match orchestrator.handle(&ChatRequest::new("u1", "c")).await {
        ChatOutcome::RateLimited { retry_after } => assert!(retry_after > Duration::ZERO),
        ChatOutcome::Answered(_) => panic!("third request should be rate limited"),
    }
    // Other callers are unaffected
    assert!(!orchestrator.handle(&ChatRequest::new("u2", "c")).await.is_rate_limited());

    let records = sink.0.lock().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[2].outcome, "rate_limited");
    assert!(records[2].model_used.is_none());
}

#[tokio::test]
async fn audit_records_carry_no_message_text() {
    let provider = MockProvider::new("primary", Behaviour::Answer("ok"));
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = builder_with(&[(0, &provider)])
        .audit_sink(sink.clone())
        .build()
        .unwrap();

    let request = ChatRequest::new("u1", "secret symptom details")
        .mode(Mode::Private)
        .patient(PatientContext::new("p9"));
    orchestrator.handle(&request).await;
    orchestrator.handle(&request).await;

    let records = sink.0.lock().unwrap();
    assert_eq!(records[0].outcome, "generated");
    assert_eq!(records[0].patient_id.as_deref(), Some("p9"));
    assert_eq!(records[0].model_used.as_deref(), Some("primary"));
    assert_eq!(records[1].outcome, "cached");
    let json = serde_json::to_string(&records[0]).unwrap();
    assert!(!json.contains("secret symptom"));
}

#[test]
fn builder_requires_a_provider() {
    assert!(matches!(
        Medgate::builder().build(),
        Err(MedgateError::NoProvider)
    ));
}
