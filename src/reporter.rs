//! Rate-limited reporting of uncaught page failures.
//!
//! At most one report is sent per cooldown window; failures inside the window
//! are dropped. Reports are submitted on a spawned task that nobody awaits,
//! and a failed submission is logged and forgotten.

use crate::config::Config;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Path of the backend endpoint that receives reports.
pub const ERROR_REPORTER_PATH: &str = "/errorReporter";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to send error report: {0}")]
    Request(#[from] reqwest::Error),

    #[error("error reporter returned {0}")]
    Status(reqwest::StatusCode),

    #[error("error report task failed: {0}")]
    Task(String),
}

/// An uncaught failure as seen by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureEvent {
    pub message: String,
    pub filename: String,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    /// Stack trace, when the failure carries one
    pub stack: Option<String>,
}

impl FailureEvent {
    /// Third-party script failures (likely plugins) carry no position.
    pub fn has_location(&self) -> bool {
        self.lineno.unwrap_or(0) != 0 || self.colno.unwrap_or(0) != 0
    }

    /// Text sent to the backend: the stack trace, or a one-line summary.
    pub fn report_text(&self) -> String {
        match self.stack.as_deref() {
            Some(stack) if !stack.is_empty() => stack.to_string(),
            _ => format!(
                "{} {} {}:{}",
                self.message,
                self.filename,
                self.lineno.unwrap_or(0),
                self.colno.unwrap_or(0)
            ),
        }
    }
}

/// Form payload posted to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub url: String,
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Delivers a report. The returned future is run on a detached task.
pub trait ReportTransport: Send + Sync {
    fn submit(&self, report: ErrorReport) -> BoxFuture<'static, Result<(), ReportError>>;
}

/// Posts reports as `application/x-www-form-urlencoded` to `/errorReporter`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), ERROR_REPORTER_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportTransport for HttpTransport {
    fn submit(&self, report: ErrorReport) -> BoxFuture<'static, Result<(), ReportError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            let response = client.post(&endpoint).form(&report).send().await?;
            if !response.status().is_success() {
                return Err(ReportError::Status(response.status()));
            }
            Ok(())
        })
    }
}

/// Handle to an in-flight submission. Dropping it detaches the task.
#[derive(Debug)]
pub struct Submission {
    handle: JoinHandle<Result<(), ReportError>>,
}

impl Submission {
    /// Wait for the submission to finish.
    pub async fn outcome(self) -> Result<(), ReportError> {
        self.handle
            .await
            .map_err(|e| ReportError::Task(e.to_string()))?
    }
}

/// Callback invoked for every uncaught failure on a page.
pub type FailureListener = Arc<dyn Fn(&FailureEvent) + Send + Sync>;

/// Where a page delivers its uncaught failures.
pub trait FailureSink {
    /// Register the page's listener. Returns `false` if one is already set.
    fn set_failure_listener(&mut self, listener: FailureListener) -> bool;
}

/// Forwards uncaught failures to the backend, at most once per cooldown.
pub struct ErrorReporter {
    page_url: String,
    cooldown: Duration,
    last_accepted: Mutex<Option<DateTime<Utc>>>,
    transport: Arc<dyn ReportTransport>,
    clock: Arc<dyn Clock>,
}

impl ErrorReporter {
    pub fn new(
        page_url: impl Into<String>,
        cooldown: Duration,
        transport: Arc<dyn ReportTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            cooldown,
            last_accepted: Mutex::new(None),
            transport,
            clock,
        }
    }

    /// Reporter posting over HTTP to the configured backend.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.page_url.clone(),
            config.error_report_cooldown,
            Arc::new(HttpTransport::new(&config.error_report_base_url)),
            Arc::new(SystemClock),
        )
    }

    /// Register `reporter` as the page's failure listener.
    ///
    /// # Arguments
    /// * `config` - Host configuration; static pages never report
    /// * `reporter` - The reporter that will receive every uncaught failure
    /// * `sink` - The page the listener is registered on
    ///
    /// # Returns
    /// The installed reporter, or `None` in static mode or when the page
    /// already has a listener
    pub fn install(
        config: &Config,
        reporter: Arc<ErrorReporter>,
        sink: &mut dyn FailureSink,
    ) -> Option<Arc<ErrorReporter>> {
        if config.is_static() {
            info!("Static page, error reporting disabled");
            return None;
        }

        let listener_reporter = Arc::clone(&reporter);
        let listener: FailureListener = Arc::new(move |event: &FailureEvent| {
            let _ = listener_reporter.handle(event);
        });

        if !sink.set_failure_listener(listener) {
            warn!("Failure listener already registered, not installing error reporter");
            return None;
        }

        debug!("Error reporter installed for {}", config.page_url);
        Some(reporter)
    }

    /// Report a failure if it has a location and the cooldown has passed.
    ///
    /// # Arguments
    /// * `event` - The uncaught failure raised by the page
    ///
    /// # Returns
    /// The spawned submission when a report was accepted and dispatched.
    /// `None` when the failure has no location, falls inside the cooldown
    /// window, or no async runtime is available to send it.
    pub fn handle(&self, event: &FailureEvent) -> Option<Submission> {
        if !event.has_location() {
            debug!("Ignoring failure without location: {}", event.message);
            return None;
        }

        // Never panic here: this is the last line of defense.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, dropping error report: {}", event.message);
            return None;
        };

        // The window only starts for a report that is actually dispatched.
        if !self.try_accept(self.clock.now()) {
            debug!("Error report rate-limited: {}", event.message);
            return None;
        }

        let report = ErrorReport {
            error: event.report_text(),
            url: self.page_url.clone(),
        };

        let submit = self.transport.submit(report);
        let handle = runtime.spawn(async move {
            match submit.await {
                Ok(()) => {
                    info!("Error reported");
                    Ok(())
                }
                Err(e) => {
                    debug!("Error report not delivered: {}", e);
                    Err(e)
                }
            }
        });

        Some(Submission { handle })
    }

    /// Check-and-set of the last accepted timestamp.
    fn try_accept(&self, now: DateTime<Utc>) -> bool {
        let mut last = match self.last_accepted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = *last {
            let cooling_down = chrono::Duration::from_std(self.cooldown)
                .ok()
                .and_then(|cooldown| previous.checked_add_signed(cooldown))
                .map_or(true, |until| until > now);
            if cooling_down {
                return false;
            }
        }

        *last = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Test Doubles ====================

    #[derive(Default)]
    struct RecordingTransport {
        reports: Mutex<Vec<ErrorReport>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            Self {
                reports: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.reports.lock().unwrap().len()
        }
    }

    impl ReportTransport for RecordingTransport {
        fn submit(&self, report: ErrorReport) -> BoxFuture<'static, Result<(), ReportError>> {
            self.reports.lock().unwrap().push(report);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(ReportError::Task("network down".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()),
            }
        }

        fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    struct TestSink {
        listener: Option<FailureListener>,
    }

    impl FailureSink for TestSink {
        fn set_failure_listener(&mut self, listener: FailureListener) -> bool {
            if self.listener.is_some() {
                return false;
            }
            self.listener = Some(listener);
            true
        }
    }

    fn located_failure(message: &str) -> FailureEvent {
        FailureEvent {
            message: message.to_string(),
            filename: "https://blockly.games/maze/generated/en/compressed.js".to_string(),
            lineno: Some(12),
            colno: Some(34),
            stack: None,
        }
    }

    fn reporter_with(
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
    ) -> ErrorReporter {
        ErrorReporter::new(
            "https://blockly.games/maze?level=2",
            Duration::from_secs(10),
            transport,
            clock,
        )
    }

    fn test_config(page_url: &str) -> Config {
        Config {
            app_name: "maze".to_string(),
            page_url: page_url.to_string(),
            product_name: "Blockly Games".to_string(),
            lang: "en".to_string(),
            languages: vec!["en".to_string()],
            error_report_base_url: "http://localhost".to_string(),
            error_report_cooldown: Duration::from_secs(10),
            screen_width: 1024,
        }
    }

    // ==================== FailureEvent Tests ====================

    #[test]
    fn test_has_location() {
        assert!(located_failure("x").has_location());

        let mut event = located_failure("x");
        event.lineno = None;
        assert!(event.has_location());

        event.colno = Some(0);
        assert!(!event.has_location());

        assert!(!FailureEvent::default().has_location());
    }

    #[test]
    fn test_report_text_prefers_stack() {
        let mut event = located_failure("boom");
        event.stack = Some("TypeError: boom\n    at f (maze.js:12:34)".to_string());
        assert_eq!(event.report_text(), "TypeError: boom\n    at f (maze.js:12:34)");
    }

    #[test]
    fn test_report_text_fallback_format() {
        let mut event = located_failure("boom");
        event.stack = Some(String::new());
        assert_eq!(
            event.report_text(),
            "boom https://blockly.games/maze/generated/en/compressed.js 12:34"
        );
    }

    // ==================== Rate Limit Tests ====================

    #[tokio::test]
    async fn test_failures_two_seconds_apart_send_once() {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        assert!(reporter.handle(&located_failure("first")).is_some());
        clock.advance(2);
        assert!(reporter.handle(&located_failure("second")).is_none());

        assert_eq!(transport.count(), 1);
        assert_eq!(transport.reports.lock().unwrap()[0].error, located_failure("first").report_text());
    }

    #[tokio::test]
    async fn test_failures_eleven_seconds_apart_send_twice() {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        reporter.handle(&located_failure("first"));
        clock.advance(11);
        reporter.handle(&located_failure("second"));

        assert_eq!(transport.count(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_boundary_is_accepted() {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        reporter.handle(&located_failure("first"));
        clock.advance(10);
        reporter.handle(&located_failure("second"));

        assert_eq!(transport.count(), 2);
    }

    #[tokio::test]
    async fn test_dropped_failures_do_not_extend_cooldown() {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        reporter.handle(&located_failure("accepted"));
        for _ in 0..4 {
            clock.advance(2);
            reporter.handle(&located_failure("dropped"));
        }
        clock.advance(2);
        reporter.handle(&located_failure("accepted again"));

        assert_eq!(transport.count(), 2);
    }

    #[tokio::test]
    async fn test_failure_without_location_never_sent() {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        let event = FailureEvent {
            message: "Script error.".to_string(),
            ..FailureEvent::default()
        };
        assert!(reporter.handle(&event).is_none());
        assert_eq!(transport.count(), 0);

        // And it does not start a cooldown.
        assert!(reporter.handle(&located_failure("real")).is_some());
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn test_report_includes_page_url() {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = reporter_with(transport.clone(), Arc::new(ManualClock::new()));

        reporter.handle(&located_failure("boom"));

        let reports = transport.reports.lock().unwrap();
        assert_eq!(reports[0].url, "https://blockly.games/maze?level=2");
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let transport = Arc::new(RecordingTransport::failing());
        let clock = Arc::new(ManualClock::new());
        let reporter = reporter_with(transport.clone(), clock.clone());

        let submission = reporter.handle(&located_failure("boom")).expect("accepted");
        assert!(submission.outcome().await.is_err());

        // A failed send still consumes the window; no retry happens.
        clock.advance(1);
        assert!(reporter.handle(&located_failure("boom")).is_none());
        assert_eq!(transport.count(), 1);
    }

    #[test]
    fn test_no_runtime_does_not_panic() {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = reporter_with(transport.clone(), Arc::new(ManualClock::new()));

        assert!(reporter.handle(&located_failure("boom")).is_none());
        assert_eq!(transport.count(), 0);
    }

    #[test]
    fn test_no_runtime_does_not_start_cooldown() {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = reporter_with(transport.clone(), Arc::new(ManualClock::new()));

        assert!(reporter.handle(&located_failure("dropped")).is_none());
        assert!(reporter.last_accepted.lock().unwrap().is_none());

        // Same instant, now with a runtime: the dropped failure left no window behind.
        let accepted =
            tokio_test::block_on(async { reporter.handle(&located_failure("boom")).is_some() });
        assert!(accepted);
        assert_eq!(transport.count(), 1);
    }

    // ==================== install Tests ====================

    #[tokio::test]
    async fn test_install_registers_listener() {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = Arc::new(reporter_with(transport.clone(), Arc::new(ManualClock::new())));
        let mut sink = TestSink { listener: None };

        let installed = ErrorReporter::install(
            &test_config("https://blockly.games/maze"),
            reporter,
            &mut sink,
        );
        assert!(installed.is_some());

        let listener = sink.listener.clone().expect("listener set");
        listener(&located_failure("boom"));
        assert_eq!(transport.count(), 1);
    }

    #[test]
    fn test_install_skipped_in_static_mode() {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = Arc::new(reporter_with(transport, Arc::new(ManualClock::new())));
        let mut sink = TestSink { listener: None };

        let installed = ErrorReporter::install(
            &test_config("file:///home/user/maze.html"),
            reporter,
            &mut sink,
        );
        assert!(installed.is_none());
        assert!(sink.listener.is_none());
    }

    #[test]
    fn test_install_only_once() {
        let config = test_config("https://blockly.games/maze");
        let mut sink = TestSink { listener: None };

        let first = Arc::new(reporter_with(
            Arc::new(RecordingTransport::default()),
            Arc::new(ManualClock::new()),
        ));
        let second = Arc::new(reporter_with(
            Arc::new(RecordingTransport::default()),
            Arc::new(ManualClock::new()),
        ));

        assert!(ErrorReporter::install(&config, first, &mut sink).is_some());
        assert!(ErrorReporter::install(&config, second, &mut sink).is_none());
    }

    // ==================== HttpTransport Tests ====================

    #[test]
    fn test_http_transport_endpoint() {
        assert_eq!(
            HttpTransport::new("https://blockly.games/").endpoint(),
            "https://blockly.games/errorReporter"
        );
        assert_eq!(
            HttpTransport::new("http://localhost:8080").endpoint(),
            "http://localhost:8080/errorReporter"
        );
    }

    #[tokio::test]
    async fn test_http_transport_posts_form() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/errorReporter"))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("error=boom+at+line+1"))
            .and(body_string_contains("url=https%3A%2F%2Fblockly.games%2Fmaze"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(&mock_server.uri());
        let result = transport
            .submit(ErrorReport {
                error: "boom at line 1".to_string(),
                url: "https://blockly.games/maze".to_string(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_http_transport_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/errorReporter"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(&mock_server.uri());
        let result = transport
            .submit(ErrorReport {
                error: "boom".to_string(),
                url: "https://blockly.games/maze".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ReportError::Status(status)) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_reporter_over_http_end_to_end() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/errorReporter"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let reporter = ErrorReporter::new(
            "https://blockly.games/maze",
            Duration::from_secs(10),
            Arc::new(HttpTransport::new(&mock_server.uri())),
            Arc::new(SystemClock),
        );

        let submission = reporter.handle(&located_failure("boom")).expect("accepted");
        assert!(reporter.handle(&located_failure("boom again")).is_none());
        assert!(submission.outcome().await.is_ok());
    }
}
