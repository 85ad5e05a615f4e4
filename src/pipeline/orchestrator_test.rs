use std::collections::VecDeque;

use super::*;
use crate::pipeline::state::{PRIMARY_READY_MESSAGE, Role, SECONDARY_READY_MESSAGE, Stage};
use crate::pipeline::upstream::UpstreamFailure;
use crate::sandbox::boundary::SlotState;

const COUNTER: &str = "const Component = () => {\n  const [n, setN] = useState(0);\n  return <button onClick={() => setN(n + 1)}>{n}</button>;\n};";
const VISUAL: &str = "const Component = () => <div style={{ color: 'cyan' }}>state: n</div>;";

#[derive(Debug, Clone)]
struct Recorded {
    system: String,
    user: String,
    max_tokens: u32,
}

/// Replays canned replies in order. A user content of `"hang"` never answers.
#[derive(Default)]
struct ScriptedUpstream {
    replies: Mutex<VecDeque<Result<String, UpstreamFailure>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedUpstream {
    fn new(replies: impl IntoIterator<Item = Result<String, UpstreamFailure>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into_iter().collect()), requests: Mutex::default() })
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl Upstream for ScriptedUpstream {
    async fn complete(&self, request: UpstreamRequest<'_>) -> Result<String, UpstreamFailure> {
        self.requests.lock().push(Recorded {
            system: request.system_prompt.to_owned(),
            user: request.user_content.to_owned(),
            max_tokens: request.max_output_tokens,
        });
        if request.user_content == "hang" {
            std::future::pending::<()>().await;
        }
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| Err(UpstreamFailure::Status { status: 500, message: "script exhausted".into() }))
    }
}

fn ok(code: &str) -> Result<String, UpstreamFailure> {
    Ok(format!("```jsx\n{code}\n```"))
}

fn chatty(code: &str) -> Result<String, UpstreamFailure> {
    Ok(format!("Here you go:\n\n```jsx\n{code}\n```\n\nHope this helps!"))
}

fn reset() -> Result<String, UpstreamFailure> {
    Err(UpstreamFailure::Transport("read ECONNRESET".into()))
}

fn pipeline(upstream: Arc<ScriptedUpstream>) -> Pipeline {
    Pipeline::new(
        upstream,
        Arc::new(SandboxCompiler::default()),
        PipelineConfig::default(),
        Arc::new(SystemPrompts::default()),
    )
}

fn contents(view: &PipelineView) -> Vec<String> {
    view.turns.iter().map(|t| t.content.clone()).collect()
}

#[tokio::test]
async fn happy_path_fills_both_slots() {
    let upstream = ScriptedUpstream::new([chatty(COUNTER), ok(VISUAL)]);
    let pipeline = pipeline(upstream.clone());

    pipeline.run("Build a counter").await.unwrap();

    let view = pipeline.view();
    assert_eq!(view.stage, Stage::SecondaryReady);
    assert_eq!(contents(&view), vec!["Build a counter", PRIMARY_READY_MESSAGE, SECONDARY_READY_MESSAGE]);
    assert_eq!(view.turns[0].role, Role::User);
    assert_eq!(view.primary_code.as_deref(), Some(COUNTER));
    assert_eq!(view.secondary_code.as_deref(), Some(VISUAL));
    assert_eq!(view.primary.html.as_deref(), Some(r#"<button data-on-click="h0">0</button>"#));
    assert_eq!(view.secondary.state, SlotState::Displaying);
    assert!(view.secondary.generation > view.primary.generation);
}

#[tokio::test]
async fn requests_use_stage_prompts_and_budgets() {
    let upstream = ScriptedUpstream::new([ok(COUNTER), ok(VISUAL)]);
    let pipeline = pipeline(upstream.clone());
    pipeline.run("Build a counter").await.unwrap();

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    let prompts = SystemPrompts::default();
    assert_eq!(requests[0].system, prompts.component);
    assert_eq!(requests[0].user, "Build a counter");
    assert_eq!(requests[0].max_tokens, 8192);
    assert_eq!(requests[1].system, prompts.visualization);
    assert_eq!(
        requests[1].user,
        format!("Create a visual, interactive explanation of this component:\n\n{COUNTER}")
    );
    assert_eq!(requests[1].max_tokens, 4096);
}

#[tokio::test(start_paused = true)]
async fn transient_reset_succeeds_on_second_attempt() {
    let upstream = ScriptedUpstream::new([reset(), ok(COUNTER), ok(VISUAL)]);
    let pipeline = pipeline(upstream.clone());

    pipeline.run("Build a counter").await.unwrap();

    assert_eq!(upstream.requests().len(), 3);
    let view = pipeline.view();
    assert_eq!(view.stage, Stage::SecondaryReady);
    assert_eq!(view.turns.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_produce_one_error_turn() {
    let upstream = ScriptedUpstream::new([reset(), reset(), reset(), reset()]);
    let pipeline = pipeline(upstream.clone());

    let err = pipeline.run("Build a counter").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Upstream);

    assert_eq!(upstream.requests().len(), 4);
    let view = pipeline.view();
    assert_eq!(view.stage, Stage::Failed);
    assert_eq!(view.failed_stage, Some(Stage::GeneratingPrimary));
    assert!(!view.is_generating && !view.is_visualizing);
    assert_eq!(contents(&view), vec!["Build a counter", "Sorry, there was an error: read ECONNRESET"]);
}

#[tokio::test]
async fn stage_two_failure_keeps_primary() {
    let overloaded = Err(UpstreamFailure::Status { status: 529, message: "Overloaded".into() });
    let upstream = ScriptedUpstream::new([ok(COUNTER), overloaded]);
    let pipeline = pipeline(upstream);

    pipeline.run("Build a counter").await.unwrap_err();

    let view = pipeline.view();
    assert_eq!(view.stage, Stage::Failed);
    assert_eq!(view.failed_stage, Some(Stage::GeneratingSecondary));
    assert_eq!(view.primary_code.as_deref(), Some(COUNTER));
    assert_eq!(view.primary.state, SlotState::Displaying);
    assert!(view.secondary_code.is_none());
    assert_eq!(view.turns.last().unwrap().content, "Sorry, there was an error: Overloaded");
    assert_eq!(view.turns.iter().filter(|t| t.role == Role::Assistant).count(), 2);
}

#[tokio::test]
async fn transform_failure_is_inline_and_stops_the_run() {
    let upstream = ScriptedUpstream::new([ok("const Component = () => {\n  return <div>;\n")]);
    let pipeline = pipeline(upstream.clone());

    let err = pipeline.run("Build a counter").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transform);

    let view = pipeline.view();
    assert_eq!(upstream.requests().len(), 1);
    assert_eq!(view.stage, Stage::Failed);
    assert_eq!(view.turns.len(), 1);
    assert!(view.primary_code.is_none());
    assert_eq!(view.primary.state, SlotState::TransformFailed);
    let surface = view.primary.error.unwrap();
    assert_eq!(surface.title, "Compilation Error");
    assert!(surface.message.starts_with("Transform error: "));
}

#[tokio::test]
async fn missing_component_in_stage_two_is_inline_on_secondary() {
    let upstream = ScriptedUpstream::new([ok(COUNTER), ok("const Visual = () => null;")]);
    let pipeline = pipeline(upstream);

    pipeline.run("Build a counter").await.unwrap_err();

    let view = pipeline.view();
    assert_eq!(view.primary.state, SlotState::Displaying);
    assert_eq!(view.secondary.state, SlotState::ExecutionFailed);
    assert!(view.secondary.error.unwrap().message.starts_with("Execution error: Component not found"));
    assert_eq!(view.turns.len(), 2);
}

#[tokio::test]
async fn newer_run_supersedes_older_without_mutation() {
    let upstream = ScriptedUpstream::new([ok(COUNTER), ok(VISUAL)]);
    let pipeline = Arc::new(pipeline(upstream.clone()));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run("hang").await }
    });
    while upstream.requests().is_empty() {
        tokio::task::yield_now().await;
    }

    pipeline.run("Build a counter").await.unwrap();
    let superseded = first.await.unwrap().unwrap_err();
    assert!(superseded.is_cancelled());

    let view = pipeline.view();
    assert_eq!(view.stage, Stage::SecondaryReady);
    assert_eq!(
        contents(&view),
        vec!["hang", "Build a counter", PRIMARY_READY_MESSAGE, SECONDARY_READY_MESSAGE]
    );
    let ids: Vec<u64> = view.turns.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn superseded_run_in_backoff_does_not_retry() {
    let upstream = ScriptedUpstream::new([reset(), ok(COUNTER), ok(VISUAL)]);
    let pipeline = Arc::new(pipeline(upstream.clone()));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run("first").await }
    });
    while upstream.requests().is_empty() {
        tokio::task::yield_now().await;
    }

    pipeline.run("second").await.unwrap();
    assert!(first.await.unwrap().unwrap_err().is_cancelled());

    let users: Vec<String> = upstream.requests().into_iter().map(|r| r.user).collect();
    assert_eq!(users[0], "first");
    assert_eq!(users[1], "second");
    assert_eq!(users.len(), 3);
    assert_eq!(pipeline.view().stage, Stage::SecondaryReady);
}

#[tokio::test]
async fn events_reach_the_displayed_component() {
    let upstream = ScriptedUpstream::new([ok(COUNTER), ok(VISUAL)]);
    let pipeline = pipeline(upstream);
    pipeline.run("Build a counter").await.unwrap();

    let slot = pipeline.dispatch(SlotId::Primary, "h0", &serde_json::json!({})).unwrap();
    assert_eq!(slot.html.as_deref(), Some(r#"<button data-on-click="h0">1</button>"#));
    assert_eq!(pipeline.view().primary, slot);

    let err = pipeline.dispatch(SlotId::Secondary, "h0", &serde_json::json!({})).unwrap_err();
    assert!(matches!(err, SlotEventError::UnknownHandler(_)));
}

#[tokio::test]
async fn throwing_handler_returns_error_view() {
    let broken = "const Component = () => <button onClick={() => { throw new Error('nope'); }}>x</button>;";
    let upstream = ScriptedUpstream::new([ok(broken), ok(VISUAL)]);
    let pipeline = pipeline(upstream);
    pipeline.run("p").await.unwrap();

    let slot = pipeline.dispatch(SlotId::Primary, "h0", &serde_json::json!({})).unwrap();
    assert_eq!(slot.state, SlotState::RuntimeFailed);
    assert_eq!(slot.error.unwrap().message, "nope");
    assert_eq!(pipeline.view().secondary.state, SlotState::Displaying);
}

#[tokio::test]
async fn custom_classifier_controls_retries() {
    struct Never;
    impl RetryClassifier for Never {
        fn is_retryable(&self, _: &UpstreamFailure) -> bool {
            false
        }
    }
    let upstream = ScriptedUpstream::new([reset(), ok(COUNTER)]);
    let pipeline = pipeline(upstream.clone()).with_classifier(Arc::new(Never));

    pipeline.run("p").await.unwrap_err();
    assert_eq!(upstream.requests().len(), 1);
}

const CODE_A: &str = "const Component = () => <p>alpha</p>;";
const CODE_B: &str = "const Component = () => <p>beta</p>;";
const VISUAL_A: &str = "const Component = () => <p>alpha visual</p>;";
const VISUAL_B: &str = "const Component = () => <p>beta visual</p>;";

/// Answers by request content. Stage two for component A blocks on `gate`.
#[derive(Default)]
struct GatedUpstream {
    gate: tokio::sync::Notify,
    seen: Mutex<Vec<String>>,
}

impl GatedUpstream {
    fn saw(&self, needle: &str) -> bool {
        self.seen.lock().iter().any(|user| user.contains(needle))
    }
}

#[async_trait::async_trait]
impl Upstream for GatedUpstream {
    async fn complete(&self, request: UpstreamRequest<'_>) -> Result<String, UpstreamFailure> {
        let user = request.user_content.to_owned();
        self.seen.lock().push(user.clone());
        match user.as_str() {
            "A" => ok(CODE_A),
            "B" => ok(CODE_B),
            other if other.contains("alpha") => {
                self.gate.notified().await;
                ok(VISUAL_A)
            }
            _ => ok(VISUAL_B),
        }
    }
}

#[tokio::test]
async fn prompt_during_stage_two_cancels_the_older_run() {
    let upstream = Arc::new(GatedUpstream::default());
    let pipeline = Arc::new(Pipeline::new(
        upstream.clone(),
        Arc::new(SandboxCompiler::default()),
        PipelineConfig::default(),
        Arc::new(SystemPrompts::default()),
    ));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run("A").await }
    });
    while !upstream.saw("alpha") {
        tokio::task::yield_now().await;
    }
    assert_eq!(pipeline.view().primary_code.as_deref(), Some(CODE_A));
    assert!(pipeline.view().is_visualizing);

    pipeline.run("B").await.unwrap();
    upstream.gate.notify_waiters();
    let superseded = first.await.unwrap().unwrap_err();
    assert!(superseded.is_cancelled());

    let view = pipeline.view();
    assert_eq!(
        contents(&view),
        vec!["A", PRIMARY_READY_MESSAGE, "B", PRIMARY_READY_MESSAGE, SECONDARY_READY_MESSAGE]
    );
    assert_eq!(view.primary_code.as_deref(), Some(CODE_B));
    assert_eq!(view.secondary_code.as_deref(), Some(VISUAL_B));
    assert_eq!(view.secondary.html.as_deref(), Some("<p>beta visual</p>"));
    assert_eq!(view.stage, Stage::SecondaryReady);
    assert_eq!(upstream.seen.lock().len(), 4);
}

#[tokio::test]
async fn advance_runs_timers_in_one_slot() {
    let clock = "const Component = () => {\n  const [s, setS] = useState(0);\n  useEffect(() => { setTimeout(() => setS(1), 250); }, []);\n  return <p>{s}</p>;\n};";
    let upstream = ScriptedUpstream::new([ok(clock), ok(VISUAL)]);
    let pipeline = pipeline(upstream);
    pipeline.run("p").await.unwrap();

    let slot = pipeline.advance(SlotId::Primary, 250.0).unwrap();
    assert_eq!(slot.html.as_deref(), Some("<p>1</p>"));
    assert_eq!(pipeline.view().primary, slot);
}

#[tokio::test]
async fn close_cancels_the_run_and_empties_both_slots() {
    let upstream = ScriptedUpstream::new([ok(COUNTER), ok(VISUAL)]);
    let pipeline = Arc::new(pipeline(upstream.clone()));
    pipeline.run("p").await.unwrap();
    assert_eq!(pipeline.view().primary.state, SlotState::Displaying);

    let hanging = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run("hang").await }
    });
    while upstream.requests().len() < 3 {
        tokio::task::yield_now().await;
    }
    pipeline.close();
    assert!(hanging.await.unwrap().unwrap_err().is_cancelled());

    let view = pipeline.view();
    assert_eq!(view.primary.state, SlotState::Empty);
    assert_eq!(view.secondary.state, SlotState::Empty);
}
