//! Condition-based waits over a [`QuizPage`]

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::QuizPage;
use crate::error::{E2eError, E2eResult};

/// Outcome of waiting for a text change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextChange {
    /// The text differs from the previous reading
    Changed(Option<String>),
    /// The timeout elapsed with the text still equal to the previous reading
    Unchanged(Option<String>),
}

impl TextChange {
    pub fn text(&self) -> Option<&str> {
        match self {
            TextChange::Changed(t) | TextChange::Unchanged(t) => t.as_deref(),
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, TextChange::Changed(_))
    }
}

/// Poll until at least one element matches `selector`.
pub async fn wait_for_selector<P: QuizPage + ?Sized>(
    page: &P,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> E2eResult<()> {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if page.count(selector).await? > 0 {
            debug!("'{}' present after {} poll(s)", selector, attempts);
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(E2eError::Timeout {
                what: format!("selector '{}'", selector),
                waited: timeout,
            });
        }
        sleep(poll).await;
    }
}

/// Poll the text of `selector` until it differs from `previous`.
///
/// The text is read at least once, even with a zero timeout.
pub async fn wait_for_text_change<P: QuizPage + ?Sized>(
    page: &P,
    selector: &str,
    previous: Option<&str>,
    timeout: Duration,
    poll: Duration,
) -> E2eResult<TextChange> {
    let deadline = Instant::now() + timeout;

    loop {
        let current = page.text_content(selector).await?;
        if current.as_deref() != previous {
            return Ok(TextChange::Changed(current));
        }
        if Instant::now() >= deadline {
            return Ok(TextChange::Unchanged(current));
        }
        sleep(poll).await;
    }
}
