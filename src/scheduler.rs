// src/scheduler.rs

//! The change-detection scheduling loop.
//!
//! A single sequential control flow drives all checks: sites are evaluated
//! one at a time, in configured order, within each round. No two checks run
//! concurrently, which is also what keeps the shared browser instance
//! single-flight. The cost is head-of-line blocking; acceptable for
//! monitoring semantics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::config::Config;
use crate::fetch::{ConditionalFetch, FetchResponse, PageRenderer};
use crate::fingerprint::{Fingerprint, Fingerprinter, Sha256Fingerprinter};
use crate::models::{CheckOutcome, RoundSummary, Site, SiteState};
use crate::notify::{ChangeEvent, Notifier};

/// What a dispatched fetch observed, before comparison against stored state.
enum Observation {
    /// Origin confirmed no change; nothing was fingerprinted.
    NotModified,
    /// Fresh content, already fingerprinted.
    Content {
        fingerprint: Fingerprint,
        etag: Option<String>,
    },
    /// The fetch or render failed.
    Failed(String),
}

/// Sequential scheduler over the configured site list.
///
/// Owns every `SiteState`; states are created up front and live for the
/// process lifetime. Only a completed check for a site mutates its state.
pub struct Scheduler<F, R, N> {
    config: Arc<Config>,
    fingerprinter: Box<dyn Fingerprinter>,
    fetcher: F,
    renderer: R,
    notifier: N,
    states: HashMap<String, SiteState>,
}

impl<F, R, N> Scheduler<F, R, N>
where
    F: ConditionalFetch,
    R: PageRenderer,
    N: Notifier,
{
    /// Create a scheduler with the default fingerprinter.
    pub fn new(config: Arc<Config>, fetcher: F, renderer: R, notifier: N) -> Self {
        Self::with_fingerprinter(config, fetcher, renderer, notifier, Box::new(Sha256Fingerprinter))
    }

    /// Create a scheduler with a custom fingerprint algorithm.
    pub fn with_fingerprinter(
        config: Arc<Config>,
        fetcher: F,
        renderer: R,
        notifier: N,
        fingerprinter: Box<dyn Fingerprinter>,
    ) -> Self {
        let states = config
            .sites
            .iter()
            .map(|site| (site.name.clone(), SiteState::default()))
            .collect();

        Self {
            config,
            fingerprinter,
            fetcher,
            renderer,
            notifier,
            states,
        }
    }

    /// Read-only view of a site's state.
    pub fn state(&self, name: &str) -> Option<&SiteState> {
        self.states.get(name)
    }

    /// Run the monitor loop until the shutdown signal flips to `true`.
    ///
    /// The loop sleeps a fixed floor between rounds rather than computing an
    /// exact next-due time; scheduling granularity is deliberately coarse.
    /// Stops are honored at round boundaries, after which the renderer is
    /// released.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Monitor loop started with {} site(s)",
            self.config.sites.len()
        );
        let floor = Duration::from_secs(self.config.monitor.round_floor_secs);

        loop {
            let summary = self.round().await;
            if summary.checked > 0 {
                log::debug!(
                    "Round complete: {} checked, {} changed, {} unchanged, {} errors",
                    summary.checked,
                    summary.changed,
                    summary.unchanged,
                    summary.errors
                );
            }

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(floor) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Monitor loop stopped");
        self.shutdown().await;
    }

    /// Release the rendering resource, if live.
    pub async fn shutdown(&mut self) {
        self.renderer.shutdown().await;
    }

    /// Evaluate every site once, checking those that are due.
    pub async fn round(&mut self) -> RoundSummary {
        let mut summary = RoundSummary::default();
        let pause = Duration::from_millis(self.config.monitor.pause_between_checks_ms);

        for index in 0..self.config.sites.len() {
            let site = self.config.sites[index].clone();
            let now = Utc::now();
            if !self.is_due(&site, now) {
                continue;
            }

            let outcome = self.check_site(&site, now).await;
            log::info!("{} ({}): {}", site.name, site.url, outcome.describe());
            summary.record(&outcome);

            // Spread checks out to avoid bursts of outbound requests.
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        summary
    }

    fn is_due(&self, site: &Site, now: DateTime<Utc>) -> bool {
        match self.states.get(&site.name).and_then(|s| s.last_check) {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(site.interval_secs as i64),
        }
    }

    async fn check_site(&mut self, site: &Site, now: DateTime<Utc>) -> CheckOutcome {
        // Record the dispatch time before fetching, so a slow or failing
        // check cannot make the site due again before its interval elapses.
        let (prior_fingerprint, prior_etag) = {
            let state = self
                .states
                .get_mut(&site.name)
                .expect("state exists for every configured site");
            state.last_check = Some(now);
            (state.fingerprint, state.etag.clone())
        };

        log::info!("Checking {} ({})", site.name, site.url);

        let observation = if site.render {
            self.observe_rendered(site).await
        } else {
            self.observe_conditional(site, prior_etag.as_deref()).await
        };

        let outcome = match observation {
            Observation::NotModified => CheckOutcome::Unchanged("not modified".into()),
            Observation::Failed(reason) => CheckOutcome::Error(reason),
            Observation::Content { fingerprint, etag } => {
                let state = self
                    .states
                    .get_mut(&site.name)
                    .expect("state exists for every configured site");
                if let Some(tag) = etag {
                    state.etag = Some(tag);
                }
                if prior_fingerprint == Some(fingerprint) {
                    CheckOutcome::Unchanged("no change".into())
                } else {
                    state.fingerprint = Some(fingerprint);
                    let reason = if prior_fingerprint.is_none() {
                        "first snapshot"
                    } else {
                        "content changed"
                    };
                    CheckOutcome::Changed(reason.into())
                }
            }
        };

        if let CheckOutcome::Changed(reason) = &outcome {
            let event = ChangeEvent {
                name: site.name.clone(),
                url: site.url.clone(),
                reason: reason.clone(),
            };
            // The sink is an external collaborator; its failures must not
            // break the round.
            if let Err(e) = self.notifier.notify(&event).await {
                log::warn!("Notification for {} failed: {}", site.name, e);
            }
        }

        outcome
    }

    async fn observe_conditional(&self, site: &Site, prior_etag: Option<&str>) -> Observation {
        match self.fetcher.fetch(&site.url, prior_etag).await {
            Ok(FetchResponse::NotModified) => Observation::NotModified,
            Ok(FetchResponse::Body { body, etag }) => Observation::Content {
                fingerprint: self
                    .fingerprinter
                    .digest(&body, self.config.fetch.prefix_bytes),
                etag,
            },
            Err(e) => Observation::Failed(e.to_string()),
        }
    }

    async fn observe_rendered(&mut self, site: &Site) -> Observation {
        match self.renderer.render(&site.url).await {
            Ok(html) => Observation::Content {
                fingerprint: self
                    .fingerprinter
                    .digest(&html, self.config.browser.prefix_bytes),
                etag: None,
            },
            Err(e) => Observation::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{AppError, Result};

    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<FetchResponse>>>,
        seen_etags: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<FetchResponse>>) -> (Self, Arc<Mutex<Vec<Option<String>>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    script: Mutex::new(script.into()),
                    seen_etags: Arc::clone(&seen),
                },
                seen,
            )
        }

        fn empty() -> Self {
            Self::new(Vec::new()).0
        }
    }

    #[async_trait]
    impl ConditionalFetch for ScriptedFetcher {
        async fn fetch(&self, _url: &str, prior_etag: Option<&str>) -> Result<FetchResponse> {
            self.seen_etags
                .lock()
                .unwrap()
                .push(prior_etag.map(str::to_owned));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetch called more often than scripted")
        }
    }

    struct ScriptedRenderer {
        script: VecDeque<Result<String>>,
        shutdowns: Arc<Mutex<usize>>,
    }

    impl ScriptedRenderer {
        fn new(script: Vec<Result<String>>) -> (Self, Arc<Mutex<usize>>) {
            let shutdowns = Arc::new(Mutex::new(0));
            (
                Self {
                    script: script.into(),
                    shutdowns: Arc::clone(&shutdowns),
                },
                shutdowns,
            )
        }

        fn empty() -> Self {
            Self::new(Vec::new()).0
        }
    }

    #[async_trait]
    impl PageRenderer for ScriptedRenderer {
        async fn render(&mut self, _url: &str) -> Result<String> {
            self.script
                .pop_front()
                .expect("render called more often than scripted")
        }

        async fn shutdown(&mut self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        events: Arc<Mutex<Vec<ChangeEvent>>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &ChangeEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(AppError::notify("sink unavailable"));
            }
            Ok(())
        }
    }

    fn body(text: &str, etag: Option<&str>) -> Result<FetchResponse> {
        Ok(FetchResponse::Body {
            body: text.to_string(),
            etag: etag.map(str::to_owned),
        })
    }

    fn site(name: &str, render: bool) -> Site {
        Site {
            name: name.to_string(),
            url: format!("https://example.com/{name}"),
            interval_secs: 300,
            render,
        }
    }

    fn test_config(sites: Vec<Site>) -> Arc<Config> {
        let mut config = Config::default();
        config.monitor.pause_between_checks_ms = 0;
        config.sites = sites;
        Arc::new(config)
    }

    /// Make the named site due again without waiting out its interval.
    fn rewind<F, R, N>(scheduler: &mut Scheduler<F, R, N>, name: &str, secs: i64) {
        let state = scheduler.states.get_mut(name).expect("site state");
        state.last_check = state
            .last_check
            .map(|t| t - chrono::Duration::seconds(secs));
    }

    #[tokio::test]
    async fn first_check_reports_changed() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None)]);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler =
            Scheduler::new(config, fetcher, ScriptedRenderer::empty(), RecordingNotifier::default());

        let summary = scheduler.round().await;
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.changed, 1);
        assert!(scheduler.state("a").unwrap().fingerprint.is_some());
    }

    #[tokio::test]
    async fn interval_floor_is_never_violated() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None)]);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler =
            Scheduler::new(config, fetcher, ScriptedRenderer::empty(), RecordingNotifier::default());

        assert_eq!(scheduler.round().await.checked, 1);
        // Immediately re-running the round must dispatch nothing: the
        // scripted fetcher would panic if it were called again.
        assert_eq!(scheduler.round().await.checked, 0);
        assert_eq!(scheduler.round().await.checked, 0);
    }

    #[tokio::test]
    async fn identical_body_after_interval_is_unchanged() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None), body("X", None)]);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler =
            Scheduler::new(config, fetcher, ScriptedRenderer::empty(), RecordingNotifier::default());

        assert_eq!(scheduler.round().await.changed, 1);
        let first = scheduler.state("a").unwrap().fingerprint;

        rewind(&mut scheduler, "a", 301);
        let summary = scheduler.round().await;
        assert_eq!(summary.unchanged, 1);
        assert_eq!(scheduler.state("a").unwrap().fingerprint, first);
    }

    #[tokio::test]
    async fn not_modified_short_circuits_and_replays_etag() {
        let (fetcher, seen_etags) = ScriptedFetcher::new(vec![
            body("X", Some("\"v1\"")),
            Ok(FetchResponse::NotModified),
        ]);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler =
            Scheduler::new(config, fetcher, ScriptedRenderer::empty(), RecordingNotifier::default());

        scheduler.round().await;
        let fingerprint = scheduler.state("a").unwrap().fingerprint;

        rewind(&mut scheduler, "a", 301);
        let summary = scheduler.round().await;
        assert_eq!(summary.unchanged, 1);

        // The stored validator was replayed on the second fetch and left
        // untouched by the 304; the fingerprint was never recomputed.
        let seen = seen_etags.lock().unwrap();
        assert_eq!(seen[0], None);
        assert_eq!(seen[1], Some("\"v1\"".to_string()));
        let state = scheduler.state("a").unwrap();
        assert_eq!(state.etag.as_deref(), Some("\"v1\""));
        assert_eq!(state.fingerprint, fingerprint);
    }

    #[tokio::test]
    async fn failed_check_leaves_state_untouched() {
        let (fetcher, _) = ScriptedFetcher::new(vec![
            body("X", Some("\"v1\"")),
            Err(AppError::Transport { status: 500 }),
        ]);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler =
            Scheduler::new(config, fetcher, ScriptedRenderer::empty(), RecordingNotifier::default());

        scheduler.round().await;
        let before = scheduler.state("a").unwrap().clone();

        rewind(&mut scheduler, "a", 301);
        let summary = scheduler.round().await;
        assert_eq!(summary.errors, 1);

        let after = scheduler.state("a").unwrap();
        assert_eq!(after.fingerprint, before.fingerprint);
        assert_eq!(after.etag, before.etag);
        // Only the last-check time moved.
        assert_ne!(after.last_check, before.last_check);
    }

    #[tokio::test]
    async fn render_error_then_identical_content_is_unchanged() {
        let (renderer, _) = ScriptedRenderer::new(vec![
            Ok("<html>app</html>".to_string()),
            Err(AppError::render("https://example.com/b", "tab crashed")),
            Ok("<html>app</html>".to_string()),
        ]);
        let config = test_config(vec![site("b", true)]);
        let mut scheduler = Scheduler::new(
            config,
            ScriptedFetcher::empty(),
            renderer,
            RecordingNotifier::default(),
        );

        assert_eq!(scheduler.round().await.changed, 1);
        let fingerprint = scheduler.state("b").unwrap().fingerprint;

        rewind(&mut scheduler, "b", 301);
        assert_eq!(scheduler.round().await.errors, 1);
        assert_eq!(scheduler.state("b").unwrap().fingerprint, fingerprint);

        rewind(&mut scheduler, "b", 301);
        assert_eq!(scheduler.round().await.unchanged, 1);
        assert_eq!(scheduler.state("b").unwrap().fingerprint, fingerprint);
    }

    #[tokio::test]
    async fn notifier_fires_only_on_change() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None), body("X", None)]);
        let notifier = RecordingNotifier::default();
        let events = Arc::clone(&notifier.events);
        let config = test_config(vec![site("a", false)]);
        let mut scheduler = Scheduler::new(config, fetcher, ScriptedRenderer::empty(), notifier);

        scheduler.round().await;
        rewind(&mut scheduler, "a", 301);
        scheduler.round().await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "a");
        assert_eq!(events[0].reason, "first snapshot");
    }

    #[tokio::test]
    async fn notifier_failure_does_not_break_the_round() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None), body("Y", None)]);
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let config = test_config(vec![site("a", false), site("c", false)]);
        let mut scheduler = Scheduler::new(config, fetcher, ScriptedRenderer::empty(), notifier);

        let summary = scheduler.round().await;
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.changed, 2);
    }

    #[tokio::test]
    async fn run_stops_at_round_boundary_and_releases_renderer() {
        let (fetcher, _) = ScriptedFetcher::new(vec![body("X", None)]);
        let (renderer, shutdowns) = ScriptedRenderer::new(Vec::new());
        let mut config = Config::default();
        config.monitor.pause_between_checks_ms = 0;
        config.monitor.round_floor_secs = 1;
        config.sites = vec![site("a", false)];
        let mut scheduler = Scheduler::new(
            Arc::new(config),
            fetcher,
            renderer,
            RecordingNotifier::default(),
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(stop_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).expect("send stop");

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .expect("loop task panicked");
        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }
}
