//! In-memory page driver with scriptable behaviour.
//!
//! A [`ScriptedPage`] finds every element by default. Tests narrow that
//! with [`ScriptedPage::hide`], make clicks move the page with
//! [`ScriptedPage::on_click`], and inspect what happened through the
//! recorded [`PageCall`] log.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::commands::{ElementProbe, ElementQuery, LocatorRule};
use crate::driver::{BrowserSession, LaunchOptions, PageDriver, SessionLauncher};
use crate::error::{AdapterError, AdapterErrorKind};

/// Page state visible to the scripting predicates.
#[derive(Clone, Debug, Default)]
pub struct ProbeContext {
    pub url: String,
    pub history: Vec<String>,
}

impl ProbeContext {
    /// Number of navigations whose URL contains `fragment`.
    pub fn visits(&self, fragment: &str) -> usize {
        self.history.iter().filter(|url| url.contains(fragment)).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageCall {
    Navigate(String),
    Probe(ElementQuery),
    Click(ElementQuery),
    Fill(ElementQuery, String),
}

#[derive(Clone, Debug)]
pub enum Reaction {
    /// The click moves the page to this URL.
    Navigate(String),
    /// The click kills the browser.
    Crash,
    /// The click triggers a Rust panic inside the driver.
    Panic(String),
}

type QueryPredicate = Arc<dyn Fn(&ElementQuery, &ProbeContext) -> bool + Send + Sync>;
type UrlPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    url: String,
    history: Vec<String>,
    calls: Vec<PageCall>,
    hidden: Vec<QueryPredicate>,
    reactions: Vec<(QueryPredicate, Reaction)>,
    failing_navigation: Vec<UrlPredicate>,
}

impl State {
    fn context(&self) -> ProbeContext {
        ProbeContext {
            url: self.url.clone(),
            history: self.history.clone(),
        }
    }

    fn is_hidden(&self, query: &ElementQuery) -> bool {
        let ctx = self.context();
        self.hidden.iter().any(|pred| pred(query, &ctx))
    }
}

#[derive(Default)]
pub struct ScriptedPage {
    state: Mutex<State>,
    crashed: AtomicBool,
}

impl ScriptedPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every query matching `pred` invisible while `pred` holds.
    pub fn hide<F>(&self, pred: F) -> &Self
    where
        F: Fn(&ElementQuery, &ProbeContext) -> bool + Send + Sync + 'static,
    {
        self.state.lock().hidden.push(Arc::new(pred));
        self
    }

    /// Hides every element whose rule mentions `text`.
    pub fn hide_mentioning(&self, text: &str) -> &Self {
        let text = text.to_string();
        self.hide(move |query, _| query.rule.mentions(&text))
    }

    /// Runs `reaction` after a successful click on a query matching `pred`.
    pub fn on_click<F>(&self, pred: F, reaction: Reaction) -> &Self
    where
        F: Fn(&ElementQuery, &ProbeContext) -> bool + Send + Sync + 'static,
    {
        self.state.lock().reactions.push((Arc::new(pred), reaction));
        self
    }

    /// Navigations to URLs matching `pred` time out.
    pub fn fail_navigation<F>(&self, pred: F) -> &Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.state.lock().failing_navigation.push(Arc::new(pred));
        self
    }

    /// Every later command fails as if the browser had died.
    pub fn crash(&self) {
        self.crashed.store(true, Ordering::SeqCst);
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.state.lock().calls.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn probes(&self) -> Vec<ElementQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Probe(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<ElementQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Click(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(ElementQuery, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Fill(query, text) => Some((query, text)),
                _ => None,
            })
            .collect()
    }

    fn ensure_alive(&self) -> Result<(), AdapterError> {
        if self.crashed.load(Ordering::SeqCst) {
            return Err(AdapterError::new(AdapterErrorKind::SessionClosed)
                .with_hint("scripted browser crashed"));
        }
        Ok(())
    }

    fn probe_result(query: &ElementQuery) -> ElementProbe {
        let text = match &query.rule {
            LocatorRule::Role { name, .. } => name.clone(),
            LocatorRule::Text { patterns, .. } => patterns.first().cloned().unwrap_or_default(),
            _ => String::new(),
        };
        ElementProbe {
            count: 1,
            x: 10.0,
            y: 10.0,
            tag: "div".to_string(),
            text,
        }
    }

    fn not_found(query: &ElementQuery) -> AdapterError {
        AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(format!("{query} not present"))
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&self, url: &str, _deadline: Duration) -> Result<(), AdapterError> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        state.calls.push(PageCall::Navigate(url.to_string()));
        if state.failing_navigation.iter().any(|pred| pred(url)) {
            return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{url} did not load")));
        }
        state.url = url.to_string();
        state.history.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.ensure_alive()?;
        Ok(self.state.lock().url.clone())
    }

    async fn probe(&self, query: &ElementQuery) -> Result<Option<ElementProbe>, AdapterError> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        state.calls.push(PageCall::Probe(query.clone()));
        if state.is_hidden(query) {
            return Ok(None);
        }
        Ok(Some(Self::probe_result(query)))
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        self.ensure_alive()?;
        let reaction = {
            let mut state = self.state.lock();
            if state.is_hidden(query) {
                return Err(Self::not_found(query));
            }
            state.calls.push(PageCall::Click(query.clone()));
            let ctx = state.context();
            state
                .reactions
                .iter()
                .find(|(pred, _)| pred(query, &ctx))
                .map(|(_, reaction)| reaction.clone())
        };
        match reaction {
            Some(Reaction::Navigate(url)) => {
                let mut state = self.state.lock();
                state.url = url.clone();
                state.history.push(url);
            }
            Some(Reaction::Crash) => self.crash(),
            Some(Reaction::Panic(message)) => panic!("{message}"),
            None => {}
        }
        Ok(())
    }

    async fn fill(&self, query: &ElementQuery, text: &str) -> Result<(), AdapterError> {
        self.ensure_alive()?;
        let mut state = self.state.lock();
        if state.is_hidden(query) {
            return Err(Self::not_found(query));
        }
        state.calls.push(PageCall::Fill(query.clone(), text.to_string()));
        Ok(())
    }
}

/// Hands out sessions over one shared [`ScriptedPage`] and counts
/// launches and closes.
pub struct ScriptedLauncher {
    page: Arc<ScriptedPage>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_launch: AtomicBool,
    last_options: Mutex<Option<LaunchOptions>>,
}

impl ScriptedLauncher {
    pub fn new(page: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_launch: AtomicBool::new(false),
            last_options: Mutex::new(None),
        })
    }

    pub fn failing(page: Arc<ScriptedPage>) -> Arc<Self> {
        let launcher = Self::new(page);
        launcher.fail_launch.store(true, Ordering::SeqCst);
        launcher
    }

    pub fn page(&self) -> Arc<ScriptedPage> {
        self.page.clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(AdapterError::new(AdapterErrorKind::LaunchFailed)
                .with_hint("scripted launch failure"));
        }
        Ok(Box::new(ScriptedSession {
            page: self.page.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct ScriptedSession {
    page: Arc<ScriptedPage>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    fn page(&self) -> Arc<dyn PageDriver> {
        self.page.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Pick;

    fn button(name: &str) -> ElementQuery {
        ElementQuery::new(LocatorRule::Role {
            role: "button".into(),
            name: name.into(),
            exact: false,
        })
    }

    #[tokio::test]
    async fn hidden_queries_are_not_found() {
        let page = ScriptedPage::new();
        page.hide_mentioning("remix");
        assert!(page.probe(&button("Remix")).await.unwrap().is_none());
        assert!(page.probe(&button("Publish")).await.unwrap().is_some());
        let err = page.click(&button("Remix")).await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn click_reaction_moves_the_page() {
        let page = ScriptedPage::new();
        page.on_click(
            |q, _| q.rule.mentions("remix") && q.pick == Pick::Last,
            Reaction::Navigate("https://example.test/projects/abc".into()),
        );
        page.click(&button("Remix")).await.unwrap();
        assert_eq!(page.url(), "");
        page.click(&button("Remix").with_pick(Pick::Last)).await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "https://example.test/projects/abc");
    }

    #[tokio::test]
    async fn predicates_see_navigation_history() {
        let page = ScriptedPage::new();
        page.hide(|q, ctx| q.rule.mentions("publish") && ctx.visits("/p/") < 2);
        page.navigate("https://example.test/p/1", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(page.probe(&button("Publish")).await.unwrap().is_none());
        page.navigate("https://example.test/p/1", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(page.probe(&button("Publish")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn crash_turns_every_call_into_a_session_fault() {
        let page = ScriptedPage::new();
        page.crash();
        let err = page.current_url().await.unwrap_err();
        assert!(err.is_session_fault());
    }

    #[tokio::test]
    async fn launcher_counts_sessions() {
        let launcher = ScriptedLauncher::new(ScriptedPage::new());
        let session = launcher
            .launch(&LaunchOptions { headless: true })
            .await
            .unwrap();
        session.close().await.unwrap();
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
        assert_eq!(launcher.last_options(), Some(LaunchOptions { headless: true }));

        let failing = ScriptedLauncher::failing(ScriptedPage::new());
        let err = failing
            .launch(&LaunchOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, AdapterErrorKind::LaunchFailed);
    }
}
