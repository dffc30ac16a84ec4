// Driven browser sessions.
//
// A SessionEngine is one way of getting a rendered page (local headless
// Chrome, a Browserless instance). Engines are tried in priority order and the
// first one that opens wins. The session it returns is stateful: it remembers
// the current page and the forms on it, so the census adapter can navigate,
// fill, submit and wait for the artifact link like a user would.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::form::{find_link_by_text, parse_forms, Form};
use crate::error::{EnrichError, Result};

/// Default spacing between re-renders while waiting for a link.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SessionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Start a session. Failure here means "try the next engine".
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
impl<T: SessionEngine + ?Sized> SessionEngine for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        (**self).open().await
    }
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    fn fill(&mut self, field: &str, value: &str) -> Result<()>;

    async fn submit(&mut self) -> Result<()>;

    /// Poll the current page until a link whose text contains `text`
    /// appears, returning its absolute URL. Bounded by `timeout`.
    async fn wait_for_link(&mut self, text: &str, timeout: Duration) -> Result<String>;

    /// Fetch a resource (the artifact) as text.
    async fn download(&mut self, url: &str) -> Result<String>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Renders one URL to its final DOM, and fetches plain resources.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;

    async fn download(&self, url: &str) -> Result<String>;

    /// Release engine resources (temp profiles and the like).
    async fn shutdown(&self) {}
}

/// Open a session on the first engine that starts.
pub async fn acquire_session(engines: &[Box<dyn SessionEngine>]) -> Result<Box<dyn BrowserSession>> {
    let mut tried = Vec::with_capacity(engines.len());
    for engine in engines {
        match engine.open().await {
            Ok(session) => {
                info!(engine = engine.name(), "session engine started");
                return Ok(session);
            }
            Err(e) => {
                warn!(engine = engine.name(), error = %e, "session engine failed to start, trying next");
                tried.push(engine.name().to_string());
            }
        }
    }
    Err(EnrichError::SessionEngineUnavailable { tried })
}

/// Stateful session over any [`PageRenderer`]: each navigation or
/// submission renders the target URL and rescans it for a form.
pub struct RenderedSession<R: PageRenderer> {
    renderer: R,
    engine: String,
    current_url: Option<String>,
    html: String,
    forms: Vec<Form>,
    /// Form chosen by the first `fill`; later fills and the submit use it.
    active: Option<usize>,
    poll_interval: Duration,
    closed: bool,
}

impl<R: PageRenderer> RenderedSession<R> {
    pub fn new(engine: &str, renderer: R) -> Self {
        Self {
            renderer,
            engine: engine.to_string(),
            current_url: None,
            html: String::new(),
            forms: Vec::new(),
            active: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            closed: false,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn load(&mut self, url: String) -> Result<()> {
        debug!(engine = %self.engine, url = %url, "session: rendering");
        self.html = self.renderer.render(&url).await?;
        self.forms = parse_forms(&self.html, &url);
        self.active = None;
        self.current_url = Some(url);
        Ok(())
    }

    fn current_url(&self) -> Result<&str> {
        self.current_url
            .as_deref()
            .ok_or_else(|| EnrichError::FormInteraction("session has not navigated anywhere".into()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(EnrichError::FormInteraction("session is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<R: PageRenderer> BrowserSession for RenderedSession<R> {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.load(url.to_string()).await?;
        if self.forms.is_empty() {
            debug!(engine = %self.engine, url, "session: page has no form");
        }
        Ok(())
    }

    fn fill(&mut self, field: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let url = self.current_url()?.to_string();
        let index = match self.active {
            Some(index) => index,
            None => {
                let index = self
                    .forms
                    .iter()
                    .position(|f| f.has_field(field))
                    .ok_or_else(|| {
                        EnrichError::FormInteraction(format!("no form on {url} has a {field:?} field"))
                    })?;
                self.active = Some(index);
                index
            }
        };
        self.forms[index].set(field, value)
    }

    async fn submit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let url = self.current_url()?.to_string();
        let form = self
            .forms
            .get(self.active.unwrap_or(0))
            .ok_or_else(|| EnrichError::FormInteraction(format!("no form on {url}")))?;
        if form.method != "get" {
            debug!(engine = %self.engine, method = %form.method, "session: submitting as GET");
        }
        let target = form.submission_url().to_string();
        self.load(target).await
    }

    async fn wait_for_link(&mut self, text: &str, timeout: Duration) -> Result<String> {
        self.ensure_open()?;
        let url = self.current_url()?.to_string();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(link) = find_link_by_text(&self.html, &url, text) {
                debug!(engine = %self.engine, link = %link, "session: link available");
                return Ok(link);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(EnrichError::RenderTimeout(timeout));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EnrichError::RenderTimeout(timeout));
            }
            match tokio::time::timeout(remaining, self.renderer.render(&url)).await {
                Ok(Ok(html)) => self.html = html,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(EnrichError::RenderTimeout(timeout)),
            }
        }
    }

    async fn download(&mut self, url: &str) -> Result<String> {
        self.ensure_open()?;
        debug!(engine = %self.engine, url, "session: downloading");
        self.renderer.download(url).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.renderer.shutdown().await;
        debug!(engine = %self.engine, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Pages {
        pages: Vec<(&'static str, &'static str)>,
        renders: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageRenderer for Pages {
        async fn render(&self, url: &str) -> Result<String> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.pages
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix))
                .map(|(_, html)| html.to_string())
                .ok_or_else(|| EnrichError::TransientNetwork(format!("no page for {url}")))
        }

        async fn download(&self, url: &str) -> Result<String> {
            Ok(format!("body of {url}"))
        }
    }

    struct Broken;

    #[async_trait]
    impl SessionEngine for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            Err(EnrichError::Other(anyhow::anyhow!("binary not found")))
        }
    }

    fn session(pages: Vec<(&'static str, &'static str)>) -> (RenderedSession<Pages>, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        let session = RenderedSession::new(
            "test",
            Pages {
                pages,
                renders: renders.clone(),
            },
        )
        .with_poll_interval(Duration::from_millis(5));
        (session, renders)
    }

    #[tokio::test]
    async fn fill_before_navigate_fails() {
        let (mut s, _) = session(vec![]);
        assert!(matches!(s.fill("latitude", "1"), Err(EnrichError::FormInteraction(_))));
    }

    #[tokio::test]
    async fn submit_renders_the_filled_action() {
        let (mut s, _) = session(vec![
            ("https://site.test/form", r#"<form action="/go"><input name="q"></form>"#),
            ("https://site.test/go?q=abc", r#"<a href="/out.csv">CSV file</a>"#),
        ]);
        s.navigate("https://site.test/form").await.unwrap();
        s.fill("q", "abc").unwrap();
        s.submit().await.unwrap();
        let link = s.wait_for_link("CSV file", Duration::from_secs(1)).await.unwrap();
        assert_eq!(link, "https://site.test/out.csv");
    }

    #[tokio::test]
    async fn fill_targets_the_form_owning_the_field() {
        let (mut s, _) = session(vec![
            (
                "https://site.test/form",
                r#"<form action="/search"><input name="q"></form>
                   <form action=/go method=get><input type=text name=latitude></form>"#,
            ),
            ("https://site.test/go?latitude=42.6", r#"<a href="/out.csv">CSV file</a>"#),
        ]);
        s.navigate("https://site.test/form").await.unwrap();
        s.fill("latitude", "42.6").unwrap();
        assert!(matches!(s.fill("q", "x"), Err(EnrichError::FormInteraction(_))));
        s.submit().await.unwrap();
        let link = s.wait_for_link("CSV file", Duration::from_secs(1)).await.unwrap();
        assert_eq!(link, "https://site.test/out.csv");
    }

    #[tokio::test]
    async fn wait_times_out_when_link_never_appears() {
        let (mut s, renders) = session(vec![("https://site.test/", "<p>working...</p>")]);
        s.navigate("https://site.test/").await.unwrap();
        let err = s
            .wait_for_link("CSV file", Duration::from_millis(40))
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::RenderTimeout(_)));
        assert!(renders.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn closed_session_refuses_work() {
        let (mut s, _) = session(vec![("https://site.test/", "<p></p>")]);
        s.close().await;
        s.close().await;
        assert!(s.navigate("https://site.test/").await.is_err());
    }

    #[tokio::test]
    async fn exhausted_engines_are_a_typed_failure() {
        let engines: Vec<Box<dyn SessionEngine>> = vec![Box::new(Broken), Box::new(Broken)];
        match acquire_session(&engines).await {
            Err(EnrichError::SessionEngineUnavailable { tried }) => {
                assert_eq!(tried, vec!["broken", "broken"]);
            }
            _ => panic!("expected SessionEngineUnavailable"),
        }
    }
}
