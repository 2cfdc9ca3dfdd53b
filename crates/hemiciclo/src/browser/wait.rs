use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::{BrowserError, BrowserSession, Locator};
use crate::config::WaitConfig;

#[derive(Debug, Clone, Copy)]
enum Condition {
    Present,
    Visible,
    Invisible,
    Clickable,
}

impl Condition {
    fn describe(self, locator: &Locator) -> String {
        match self {
            Condition::Present => format!("presence of {}", locator),
            Condition::Visible => format!("visibility of {}", locator),
            Condition::Invisible => format!("invisibility of {}", locator),
            Condition::Clickable => format!("{} to be clickable", locator),
        }
    }
}

/// Bounded polling waits against a [`BrowserSession`].
///
/// A wait that runs out of time is an error at the call site; it never
/// silently continues.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    timeout: Duration,
    poll: Duration,
}

impl Waiter {
    pub fn new(config: &WaitConfig) -> Self {
        Self {
            timeout: config.timeout,
            poll: config.poll_interval,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub async fn present<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.until(session, locator, Condition::Present).await
    }

    pub async fn visible<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.until(session, locator, Condition::Visible).await
    }

    pub async fn invisible<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.until(session, locator, Condition::Invisible).await
    }

    pub async fn clickable<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.until(session, locator, Condition::Clickable).await
    }

    /// Waits for `locator` to be clickable, then clicks it by script.
    pub async fn click<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.clickable(session, locator).await?;
        session.click(locator).await
    }

    async fn until<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        locator: &Locator,
        condition: Condition,
    ) -> Result<(), BrowserError> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            let satisfied = match condition {
                Condition::Present => session.is_present(locator).await,
                Condition::Visible | Condition::Clickable => session.is_visible(locator).await,
                Condition::Invisible => session.is_visible(locator).await.map(|v| !v),
            };

            match satisfied {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                // lookups racing a re-render are retried until the deadline
                Err(e) => log::debug!("{} not yet met: {}", condition.describe(locator), e),
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    condition: condition.describe(locator),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            sleep(self.poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;

    const SPINNER: Locator = Locator::Css(".spinner-border");
    const TABLE: Locator = Locator::Css("table tbody tr");

    fn quick() -> Waiter {
        Waiter {
            timeout: Duration::from_millis(30),
            poll: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_present_returns_immediately_when_element_exists() {
        let mut session = FakeSession::new();
        session.add_element(TABLE, "<tr></tr>");

        quick()
            .present(&mut session, &TABLE)
            .await
            .expect("Element should be present");
    }

    #[tokio::test]
    async fn test_present_times_out_for_missing_element() {
        let mut session = FakeSession::new();

        let err = quick()
            .present(&mut session, &TABLE)
            .await
            .expect_err("Wait should time out");
        assert!(matches!(err, BrowserError::Timeout { .. }));
        assert!(err.to_string().contains("presence of"));
    }

    #[tokio::test]
    async fn test_invisible_succeeds_for_hidden_spinner() {
        let mut session = FakeSession::new();
        session.add_element(SPINNER, "<div class=\"spinner-border\"></div>");
        session.hide(SPINNER);

        quick()
            .invisible(&mut session, &SPINNER)
            .await
            .expect("Hidden spinner counts as invisible");
    }

    #[tokio::test]
    async fn test_click_fails_when_target_never_shows_up() {
        let mut session = FakeSession::new();

        let err = quick().click(&mut session, &TABLE).await.unwrap_err();
        assert!(matches!(err, BrowserError::Timeout { .. }));
        assert_eq!(session.clicks(&TABLE), 0);
    }
}
