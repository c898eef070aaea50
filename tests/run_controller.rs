use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use action_flow::{SiteProfile, WorkflowTemplate};
use async_trait::async_trait;
use cdp_adapter::scripted::{Reaction, ScriptedLauncher, ScriptedPage};
use cdp_adapter::{AdapterError, BrowserSession, LaunchOptions, PageDriver, SessionLauncher};
use remixpilot::run::{ControllerSettings, RunController, RunRejected, RunRequest, ValidationError};
use remixpilot_core_types::{EventPayload, LogLevel, RunEvent, RunPhase};
use remixpilot_event_bus::{EventBus, InMemoryBus};
use tokio::sync::broadcast;

const PROJECT: &str = "https://example.test/p/abc";
const REMIXED: &str = "https://example.test/projects/0f3a-9bc1";

fn site() -> SiteProfile {
    SiteProfile {
        login_url: "https://example.test/login".into(),
        home_url: "https://example.test/".into(),
        expected_domain: "example.test".into(),
        ..SiteProfile::default()
    }
}

/// A page where every element exists and clicking Remix lands on a new
/// project.
fn remixing_page() -> Arc<ScriptedPage> {
    let page = ScriptedPage::new();
    page.on_click(
        |q, _| q.rule.mentions("remix"),
        Reaction::Navigate(REMIXED.into()),
    );
    page
}

struct Harness {
    controller: RunController,
    launcher: Arc<ScriptedLauncher>,
    rx: broadcast::Receiver<RunEvent>,
}

fn controller_for(
    launcher: Arc<dyn SessionLauncher>,
) -> (RunController, broadcast::Receiver<RunEvent>) {
    let bus = InMemoryBus::<RunEvent>::new(1 << 16);
    let rx = bus.subscribe();
    let settings = ControllerSettings {
        site: site(),
        ..ControllerSettings::default()
    };
    let workflow = Arc::new(WorkflowTemplate::standard(&settings.site).unwrap());
    (RunController::new(launcher, bus, workflow, settings), rx)
}

fn harness_with(launcher: Arc<ScriptedLauncher>) -> Harness {
    let (controller, rx) = controller_for(launcher.clone());
    Harness {
        controller,
        launcher,
        rx,
    }
}

fn harness(page: Arc<ScriptedPage>) -> Harness {
    harness_with(ScriptedLauncher::new(page))
}

fn request(iterations: i64) -> RunRequest {
    RunRequest {
        project_url: Some(PROJECT.into()),
        base_name: Some("STORE".into()),
        remix_repeat_count: Some(iterations),
        headless: Some(true),
        email: Some("user@example.test".into()),
        password: Some("secret".into()),
    }
}

fn drain(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[RunEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

fn statuses(events: &[RunEvent]) -> Vec<RunPhase> {
    events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Status { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

fn completed_iterations(events: &[RunEvent]) -> Vec<(u32, String)> {
    events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::IterationComplete {
                iteration, name, ..
            } => Some((*iteration, name.clone())),
            _ => None,
        })
        .collect()
}

fn last_credits(events: &[RunEvent]) -> Option<u64> {
    events.iter().rev().find_map(|e| match &e.payload {
        EventPayload::CreditsUpdate { credits } => Some(*credits),
        _ => None,
    })
}

#[tokio::test(start_paused = true)]
async fn three_clean_iterations_complete_with_thirty_credits() {
    let mut h = harness(remixing_page());

    h.controller.start(request(3)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(count(&events, "login-success"), 1);
    assert_eq!(
        completed_iterations(&events),
        vec![
            (1, "STORE2".to_string()),
            (2, "STORE3".to_string()),
            (3, "STORE4".to_string()),
        ]
    );
    assert_eq!(last_credits(&events), Some(30));
    assert_eq!(statuses(&events).last(), Some(&RunPhase::Completed));
    assert_eq!(count(&events, "step-success"), 6);
    assert_eq!(count(&events, "name-changed"), 3);

    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Completed);
    assert_eq!(state.credits, 30);
    assert_eq!(state.completed_iterations, 3);
    assert_eq!(state.current_iteration, 3);
    assert!(state.last_error.is_none());
    assert!(!h.controller.is_running());

    assert_eq!(h.launcher.launches(), 1);
    assert_eq!(h.launcher.closes(), 1);
    assert!(h.launcher.last_options().unwrap().headless);
}

#[tokio::test(start_paused = true)]
async fn skipped_iteration_earns_nothing_and_the_run_continues() {
    let page = remixing_page();
    // Publish is missing only during the second iteration.
    page.hide(|q, ctx| q.rule.mentions("publish") && ctx.visits("/projects/") == 2);
    let mut h = harness(page.clone());

    h.controller.start(request(3)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(
        completed_iterations(&events),
        vec![(1, "STORE2".to_string()), (3, "STORE4".to_string())]
    );
    assert_eq!(last_credits(&events), Some(20));
    assert_eq!(statuses(&events).last(), Some(&RunPhase::Completed));
    assert!(!events.iter().any(|e| matches!(
        &e.payload,
        EventPayload::NameChanged { iteration: 2, .. }
    )));

    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Completed);
    assert_eq!(state.completed_iterations, 2);
    assert_eq!(state.credits, 20);
    let typed: Vec<_> = page.fills().into_iter().map(|(_, text)| text).collect();
    assert!(typed.contains(&"STORE2".to_string()));
    assert!(!typed.contains(&"STORE3".to_string()));
}

#[tokio::test(start_paused = true)]
async fn login_failure_ends_in_error_without_iterations() {
    let page = remixing_page();
    page.hide_mentioning("E-mail");
    let mut h = harness(page.clone());

    h.controller.start(request(3)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(count(&events, "login-success"), 0);
    assert_eq!(count(&events, "iteration-complete"), 0);
    assert_eq!(statuses(&events).last(), Some(&RunPhase::Error));
    assert!(page.clicks().iter().all(|q| !q.rule.mentions("remix")));

    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Error);
    assert_eq!(state.current_iteration, 0);
    assert!(state.last_error.unwrap().contains("Login failed"));
    assert_eq!(h.launcher.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_request_never_opens_a_session() {
    let mut h = harness(remixing_page());
    let req = RunRequest {
        password: None,
        ..request(3)
    };

    let err = h.controller.start(req).unwrap_err();
    assert_eq!(err, RunRejected::Invalid(ValidationError::MissingCredentials));
    assert!(!h.controller.is_running());
    assert_eq!(h.launcher.launches(), 0);

    let events = drain(&mut h.rx);
    assert!(matches!(
        &events[0].payload,
        EventPayload::Log {
            level: LogLevel::Error,
            ..
        }
    ));
    assert_eq!(statuses(&events), vec![RunPhase::Error]);
    assert_eq!(h.controller.snapshot().phase, RunPhase::Error);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected_while_a_run_is_active() {
    let h = harness(remixing_page());

    let first = h.controller.start(request(2)).unwrap();
    let before = h.controller.snapshot();
    assert_eq!(
        h.controller.start(request(5)),
        Err(RunRejected::AlreadyRunning)
    );
    let after = h.controller.snapshot();
    assert_eq!(before, after);
    assert_eq!(after.run_id, Some(first));
    assert_eq!(after.total_iterations, 2);

    h.controller.join().await;
    assert_eq!(h.controller.snapshot().phase, RunPhase::Completed);
    assert_eq!(h.launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_takes_effect_before_the_next_step() {
    let page = remixing_page();
    let slot: Arc<OnceLock<RunController>> = Arc::new(OnceLock::new());
    let stopper = slot.clone();
    // Request a stop (repeatedly) while iteration 2 is publishing.
    page.hide(move |q, ctx| {
        if q.rule.mentions("publish") && ctx.visits("/projects/") == 2 {
            if let Some(controller) = stopper.get() {
                controller.stop();
            }
        }
        false
    });
    let mut h = harness(page.clone());
    let _ = slot.set(h.controller.clone());

    h.controller.stop();
    assert!(drain(&mut h.rx).is_empty());

    h.controller.start(request(5)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    // The publish in flight finishes; the rename never starts.
    assert_eq!(count(&events, "step-success"), 4);
    assert_eq!(count(&events, "name-changed"), 1);
    assert_eq!(completed_iterations(&events), vec![(1, "STORE2".to_string())]);
    assert_eq!(
        statuses(&events)
            .iter()
            .filter(|s| **s == RunPhase::Stopped)
            .count(),
        1
    );
    let stop_notices = events
        .iter()
        .filter(|e| {
            matches!(&e.payload, EventPayload::Log { message, .. } if message.contains("stop requested"))
        })
        .count();
    assert_eq!(stop_notices, 1);

    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Stopped);
    assert_eq!(state.credits, 10);
    assert_eq!(state.current_iteration, 2);
    assert_eq!(h.launcher.closes(), 1);

    h.controller.stop();
    h.controller.stop();
    assert!(drain(&mut h.rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn browser_crash_aborts_the_run() {
    let page = remixing_page();
    page.on_click(|q, _| q.rule.mentions("publish"), Reaction::Crash);
    let mut h = harness(page);

    h.controller.start(request(3)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(count(&events, "iteration-complete"), 0);
    assert_eq!(statuses(&events).last(), Some(&RunPhase::Error));
    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Error);
    assert_eq!(state.credits, 0);
    assert!(state.last_error.is_some());
    assert_eq!(h.launcher.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn panic_inside_the_run_is_reported_as_error() {
    let page = ScriptedPage::new();
    page.on_click(
        |q, _| q.rule.mentions("remix"),
        Reaction::Panic("remix button exploded".into()),
    );
    let mut h = harness(page);

    h.controller.start(request(2)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(statuses(&events).last(), Some(&RunPhase::Error));
    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Error);
    assert!(state.last_error.unwrap().contains("remix button exploded"));
    assert!(!h.controller.is_running());
    assert_eq!(h.launcher.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn launch_failure_is_an_error_without_teardown() {
    let mut h = harness_with(ScriptedLauncher::failing(remixing_page()));

    h.controller.start(request(1)).unwrap();
    h.controller.join().await;
    let events = drain(&mut h.rx);

    assert_eq!(statuses(&events).last(), Some(&RunPhase::Error));
    let state = h.controller.snapshot();
    assert!(state.last_error.unwrap().contains("Browser launch failed"));
    assert_eq!(h.launcher.launches(), 1);
    assert_eq!(h.launcher.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn credits_reset_when_a_new_run_starts() {
    let h = harness(remixing_page());

    h.controller.start(request(1)).unwrap();
    h.controller.join().await;
    assert_eq!(h.controller.snapshot().credits, 10);

    h.controller.start(request(2)).unwrap();
    assert_eq!(h.controller.snapshot().credits, 0);
    h.controller.join().await;

    let state = h.controller.snapshot();
    assert_eq!(state.phase, RunPhase::Completed);
    assert_eq!(state.credits, 20);
    assert_eq!(h.launcher.launches(), 2);
    assert_eq!(h.launcher.closes(), 2);
}

/// Knobs shared between [`HookedLauncher`] and the sessions it opens.
#[derive(Default)]
struct Hooks {
    panic_on_launch: AtomicBool,
    panic_on_close: AtomicBool,
    closes: AtomicUsize,
    controller: OnceLock<RunController>,
    phase_at_close: Mutex<Option<RunPhase>>,
}

/// Opens sessions over a scripted page, panicking where the hooks say so.
struct HookedLauncher {
    page: Arc<ScriptedPage>,
    hooks: Arc<Hooks>,
}

impl HookedLauncher {
    fn new(page: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            hooks: Arc::new(Hooks::default()),
        })
    }
}

#[async_trait]
impl SessionLauncher for HookedLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        if self.hooks.panic_on_launch.swap(false, Ordering::SeqCst) {
            panic!("chrome binary vanished");
        }
        Ok(Box::new(HookedSession {
            page: self.page.clone(),
            hooks: self.hooks.clone(),
        }))
    }
}

struct HookedSession {
    page: Arc<ScriptedPage>,
    hooks: Arc<Hooks>,
}

#[async_trait]
impl BrowserSession for HookedSession {
    fn page(&self) -> Arc<dyn PageDriver> {
        self.page.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.hooks.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(controller) = self.hooks.controller.get() {
            *self.hooks.phase_at_close.lock().unwrap() = Some(controller.snapshot().phase);
        }
        if self.hooks.panic_on_close.load(Ordering::SeqCst) {
            panic!("browser refused to exit");
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn panic_while_launching_releases_the_controller() {
    let launcher = HookedLauncher::new(remixing_page());
    launcher.hooks.panic_on_launch.store(true, Ordering::SeqCst);
    let (controller, mut rx) = controller_for(launcher.clone());

    controller.start(request(1)).unwrap();
    controller.join().await;
    let events = drain(&mut rx);

    assert!(!controller.is_running());
    let state = controller.snapshot();
    assert_eq!(state.phase, RunPhase::Error);
    assert!(state.last_error.unwrap().contains("chrome binary vanished"));
    assert_eq!(statuses(&events).last(), Some(&RunPhase::Error));
    assert_eq!(launcher.hooks.closes.load(Ordering::SeqCst), 0);

    controller.start(request(1)).unwrap();
    controller.join().await;
    let state = controller.snapshot();
    assert_eq!(state.phase, RunPhase::Completed);
    assert_eq!(state.credits, 10);
}

#[tokio::test(start_paused = true)]
async fn panic_while_closing_is_reported_as_error() {
    let launcher = HookedLauncher::new(remixing_page());
    launcher.hooks.panic_on_close.store(true, Ordering::SeqCst);
    let (controller, mut rx) = controller_for(launcher.clone());

    controller.start(request(1)).unwrap();
    controller.join().await;
    let events = drain(&mut rx);

    assert!(!controller.is_running());
    let state = controller.snapshot();
    assert_eq!(state.phase, RunPhase::Error);
    assert!(state.last_error.unwrap().contains("browser refused to exit"));
    assert_eq!(
        statuses(&events)
            .iter()
            .filter(|phase| !phase.is_active())
            .collect::<Vec<_>>(),
        vec![&RunPhase::Error]
    );
    assert_eq!(launcher.hooks.closes.load(Ordering::SeqCst), 1);
    assert!(controller.start(request(1)).is_ok());
    controller.join().await;
}

#[tokio::test(start_paused = true)]
async fn phase_leaves_running_before_the_browser_closes() {
    let launcher = HookedLauncher::new(remixing_page());
    let (controller, _rx) = controller_for(launcher.clone());
    let _ = launcher.hooks.controller.set(controller.clone());

    controller.start(request(2)).unwrap();
    controller.join().await;

    assert_eq!(
        *launcher.hooks.phase_at_close.lock().unwrap(),
        Some(RunPhase::Completed)
    );
    assert_eq!(controller.snapshot().phase, RunPhase::Completed);
}
