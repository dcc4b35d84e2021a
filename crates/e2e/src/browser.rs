//! Chrome/Chromium automation over the DevTools protocol

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{BrowserSettings, Timing};
use crate::error::{E2eError, E2eResult};
use crate::seed::js_string;

/// The slice of a browser page the quiz verification needs.
///
/// Selectors are CSS selectors. "First match" and "n-th match" follow
/// `document.querySelectorAll` order.
#[async_trait]
pub trait QuizPage: Send + Sync {
    /// Navigate and wait for the load to finish
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> E2eResult<usize>;

    /// `textContent` of the first match, `None` when nothing matches
    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    /// Click the `index`-th match
    async fn click_nth(&self, selector: &str, index: usize) -> E2eResult<()>;

    /// Attribute of the `index`-th match, `None` when the attribute is absent
    async fn attribute_nth(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> E2eResult<Option<String>>;

    /// PNG capture of the current viewport
    async fn screenshot_png(&self) -> E2eResult<Vec<u8>>;
}

/// A page owned by a running browser that must be shut down after use
#[async_trait]
pub trait QuizSession: QuizPage {
    /// Register a script that runs before any page script on every new document
    async fn add_init_script(&self, source: &str) -> E2eResult<()>;

    /// Shut the browser down and release its process
    async fn close(self) -> E2eResult<()>
    where
        Self: Sized;
}

/// Starts browser sessions for a verification run
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: QuizSession;

    async fn launch(&self, settings: &BrowserSettings, timing: &Timing) -> E2eResult<Self::Session>;
}

/// Launches a local Chrome/Chromium
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = BrowserSession;

    async fn launch(&self, settings: &BrowserSettings, timing: &Timing) -> E2eResult<BrowserSession> {
        BrowserSession::launch(settings, timing).await
    }
}

/// Pump a CDP event stream until it ends.
///
/// Errors on the stream (unparsable messages, dropped targets) are logged and
/// skipped; the browser connection stays usable after them.
pub(crate) async fn drain_events<S, E>(events: &mut S) -> usize
where
    S: futures::Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut seen = 0;
    while let Some(event) = events.next().await {
        seen += 1;
        if let Err(e) = event {
            debug!("Browser handler error: {}", e);
        }
    }
    debug!("Browser handler finished after {} event(s)", seen);
    seen
}

/// How long a closed browser gets to exit before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// The browser child process as seen by [`shutdown`]
#[async_trait]
pub(crate) trait BrowserProcess: Send {
    async fn request_close(&mut self) -> E2eResult<()>;
    async fn wait_exit(&mut self) -> E2eResult<()>;
    async fn force_kill(&mut self) -> E2eResult<()>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> E2eResult<()> {
        self.close().await?;
        Ok(())
    }

    async fn wait_exit(&mut self) -> E2eResult<()> {
        self.wait().await?;
        Ok(())
    }

    async fn force_kill(&mut self) -> E2eResult<()> {
        match self.kill().await {
            Some(result) => Ok(result?),
            None => Ok(()),
        }
    }
}

/// Ask the browser to close and wait up to `grace` for the process to exit.
///
/// A browser that refuses the close request, or outlives `grace`, is killed.
/// The close request's own error is returned after the process is gone.
pub(crate) async fn shutdown<B: BrowserProcess + ?Sized>(
    browser: &mut B,
    grace: Duration,
) -> E2eResult<()> {
    let closed = browser.request_close().await;
    if let Err(e) = &closed {
        warn!("Browser rejected close ({}), killing it", e);
        if let Err(e) = browser.force_kill().await {
            warn!("Failed to kill browser: {}", e);
        }
    }

    match timeout(grace, browser.wait_exit()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Browser process did not exit cleanly: {}", e),
        Err(_) => {
            warn!("Browser still running after {:?}, killing it", grace);
            browser.force_kill().await?;
        }
    }

    closed
}

/// A launched browser with a single page.
///
/// Call [`QuizSession::close`] to shut the browser down; dropping the
/// session without closing it still stops the event handler and lets
/// chromiumoxide kill the child process.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch the browser and open a blank page
    pub async fn launch(settings: &BrowserSettings, timing: &Timing) -> E2eResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                ..Default::default()
            })
            .request_timeout(timing.request_timeout());

        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(E2eError::BrowserLaunch)?;

        info!(
            "Launching browser ({}, {}x{})",
            if settings.headless { "headless" } else { "headed" },
            settings.viewport_width,
            settings.viewport_height
        );

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            drain_events(&mut handler).await;
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = shutdown(&mut browser, EXIT_GRACE).await;
                handler.abort();
                return Err(e.into());
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, expression: String) -> E2eResult<T> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.into_value()?)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl QuizSession for BrowserSession {
    async fn add_init_script(&self, source: &str) -> E2eResult<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        debug!("Registered init script ({} bytes)", source.len());
        Ok(())
    }

    async fn close(mut self) -> E2eResult<()> {
        info!("Closing browser");
        let closed = shutdown(&mut self.browser, EXIT_GRACE).await;
        self.handler.abort();
        closed
    }
}

#[derive(Deserialize)]
struct TextElement {
    found: bool,
    text: String,
}

#[async_trait]
impl QuizPage for BrowserSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| E2eError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        ))
        .await
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let element: TextElement = self
            .eval(format!(
                "(() => {{ const el = document.querySelector({}); \
                 return el ? {{ found: true, text: el.textContent ?? '' }} \
                 : {{ found: false, text: '' }}; }})()",
                js_string(selector)
            ))
            .await?;
        Ok(element.found.then_some(element.text))
    }

    async fn click_nth(&self, selector: &str, index: usize) -> E2eResult<()> {
        let elements = self.page.find_elements(selector).await?;
        let element = elements.get(index).ok_or_else(|| E2eError::ElementNotFound {
            selector: format!("{}[{}]", selector, index),
        })?;
        element.click().await?;
        Ok(())
    }

    async fn attribute_nth(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> E2eResult<Option<String>> {
        let elements = self.page.find_elements(selector).await?;
        let element = elements.get(index).ok_or_else(|| E2eError::ElementNotFound {
            selector: format!("{}[{}]", selector, index),
        })?;
        Ok(element.attribute(name).await?)
    }

    async fn screenshot_png(&self) -> E2eResult<Vec<u8>> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|e| E2eError::Screenshot(e.to_string()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Child process stand-in that can refuse to close or refuse to exit.
    #[derive(Default)]
    struct FakeProcess {
        close_fails: bool,
        lingers: bool,
        killed: usize,
    }

    #[async_trait]
    impl BrowserProcess for FakeProcess {
        async fn request_close(&mut self) -> E2eResult<()> {
            if self.close_fails {
                Err(E2eError::Browser("send failed because receiver is gone".into()))
            } else {
                Ok(())
            }
        }

        async fn wait_exit(&mut self) -> E2eResult<()> {
            if (self.close_fails || self.lingers) && self.killed == 0 {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn force_kill(&mut self) -> E2eResult<()> {
            self.killed += 1;
            Ok(())
        }
    }

    const GRACE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn handler_keeps_draining_after_an_error() {
        let mut events = futures::stream::iter(vec![
            Ok(()),
            Err("invalid type: null, expected a string"),
            Ok(()),
            Ok(()),
        ]);

        assert_eq!(drain_events(&mut events).await, 4);
    }

    #[tokio::test]
    async fn clean_close_does_not_kill() {
        let mut process = FakeProcess::default();
        shutdown(&mut process, GRACE).await.unwrap();
        assert_eq!(process.killed, 0);
    }

    #[tokio::test]
    async fn rejected_close_kills_and_reports_the_error() {
        let mut process = FakeProcess {
            close_fails: true,
            ..Default::default()
        };

        let result = timeout(Duration::from_secs(5), shutdown(&mut process, GRACE))
            .await
            .expect("shutdown returns");

        assert!(matches!(result, Err(E2eError::Browser(_))));
        assert_eq!(process.killed, 1);
    }

    #[tokio::test]
    async fn lingering_process_is_killed_after_grace() {
        let mut process = FakeProcess {
            lingers: true,
            ..Default::default()
        };

        let result = timeout(Duration::from_secs(5), shutdown(&mut process, GRACE))
            .await
            .expect("shutdown returns");

        assert!(result.is_ok());
        assert_eq!(process.killed, 1);
    }
}
