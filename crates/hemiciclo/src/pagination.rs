//! Drives one paginated results listing from search form to last page.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::sleep;

use crate::browser::{BrowserError, BrowserSession, Locator, Waiter};
use crate::config::ScraperConfig;
use crate::scraper::ScraperError;

static RE_RESULTS_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Resultados\s+([\d.]+)\s+a\s+([\d.]+)\s+de\s+([\d.]+)")
        .expect("invalid regex: results range")
});

/// The paginator's "Resultados A a B de N" summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultsRange {
    pub shown_from: u32,
    pub shown_to: u32,
    pub total: u32,
}

impl ResultsRange {
    pub fn is_last_page(&self) -> bool {
        self.shown_to >= self.total
    }
}

fn parse_count(digits: &str) -> Option<u32> {
    digits.replace('.', "").parse().ok()
}

/// `None` means the range cannot be determined; callers stop paginating.
pub fn parse_results_range(text: &str) -> Option<ResultsRange> {
    let caps = RE_RESULTS_RANGE.captures(text)?;
    Some(ResultsRange {
        shown_from: parse_count(&caps[1])?,
        shown_to: parse_count(&caps[2])?,
        total: parse_count(&caps[3])?,
    })
}

/// Cursor over a listing. `shown_to` must grow with every page turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: u32,
    pub last_range: Option<ResultsRange>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 1,
            last_range: None,
        }
    }
}

impl PaginationState {
    /// Records the range read on the current page. Returns `false` when the
    /// range did not move past the previous page, i.e. the listing stalled.
    pub fn observe(&mut self, range: ResultsRange) -> bool {
        let advanced = self
            .last_range
            .is_none_or(|previous| range.shown_to > previous.shown_to);
        if advanced {
            self.last_range = Some(range);
        }
        advanced
    }
}

/// Filters applied before reading a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchForm {
    /// Must show up within the wait timeout, otherwise the listing is abandoned.
    pub legislature: Option<Locator>,
    pub selects: &'static [(Locator, &'static str)],
    pub submit: Option<Locator>,
}

/// Where a listing keeps its rows and paginator.
#[derive(Debug, Clone, Copy)]
pub struct ListingSpec {
    pub name: &'static str,
    pub rows: Locator,
    /// Summary elements in order of preference; the first readable one wins.
    pub summaries: &'static [Locator],
    pub next_page: Locator,
    pub spinner: Option<Locator>,
}

/// Turns one row snapshot into a record. May use the session (e.g. to open
/// a detail tab); an error fails the attempt and the row is tried again.
#[async_trait]
pub trait RowExtractor<S: BrowserSession + ?Sized>: Send {
    type Record: Send;

    async fn extract(
        &mut self,
        session: &mut S,
        row_html: &str,
    ) -> Result<Option<Self::Record>, ScraperError>;
}

/// Adapts a pure row parser into a [`RowExtractor`].
pub struct ParseRows<F>(pub F);

#[async_trait]
impl<S, F, T> RowExtractor<S> for ParseRows<F>
where
    S: BrowserSession + ?Sized,
    F: FnMut(&str) -> Option<T> + Send,
    T: Send,
{
    type Record = T;

    async fn extract(
        &mut self,
        _session: &mut S,
        row_html: &str,
    ) -> Result<Option<T>, ScraperError> {
        Ok((self.0)(row_html))
    }
}

#[derive(Debug)]
pub struct ListingRun<T> {
    pub records: Vec<T>,
    pub pages: u32,
    pub skipped_rows: usize,
}

pub struct Paginator<'a, S: BrowserSession + ?Sized> {
    session: &'a mut S,
    config: &'a ScraperConfig,
    waiter: Waiter,
}

impl<'a, S: BrowserSession + ?Sized> Paginator<'a, S> {
    pub fn new(session: &'a mut S, config: &'a ScraperConfig) -> Self {
        Self {
            waiter: Waiter::new(&config.waits),
            session,
            config,
        }
    }

    pub async fn run_listing<E>(
        &mut self,
        form: &SearchForm,
        listing: &ListingSpec,
        extractor: &mut E,
    ) -> Result<ListingRun<E::Record>, ScraperError>
    where
        E: RowExtractor<S>,
    {
        self.apply_form(form, listing).await?;

        let mut state = PaginationState::default();
        let mut run = ListingRun {
            records: Vec::new(),
            pages: 0,
            skipped_rows: 0,
        };

        // range of the page on screen, once a page turn has read it
        let mut current: Option<ResultsRange> = None;

        loop {
            run.pages = state.current_page;
            let Some(row_count) = self.count_rows(listing).await else {
                log::warn!(
                    "[{}] Rows of page {} unreadable, stopping",
                    listing.name,
                    state.current_page
                );
                break;
            };
            log::info!(
                "[{}] Page {} ({} rows)",
                listing.name,
                state.current_page,
                row_count
            );

            for index in 0..row_count {
                if !self.process_row(listing, index, extractor, &mut run).await {
                    run.skipped_rows += 1;
                }
            }

            let range = match current.take() {
                Some(range) => range,
                None => {
                    let Some(range) = self.read_range(listing).await else {
                        log::info!("[{}] Results range unreadable, stopping", listing.name);
                        break;
                    };
                    state.observe(range);
                    range
                }
            };
            if range.is_last_page() {
                log::info!(
                    "[{}] Last page reached ({} of {})",
                    listing.name,
                    range.shown_to,
                    range.total
                );
                break;
            }
            if let Some(max) = self.config.max_pages
                && state.current_page >= max
            {
                log::warn!("[{}] Page limit {} reached, stopping", listing.name, max);
                break;
            }

            let next = match self.advance(listing, range).await {
                Ok(Some(next)) => next,
                Ok(None) => {
                    log::info!("[{}] Results range unreadable, stopping", listing.name);
                    break;
                }
                Err(e) => {
                    log::info!("[{}] No more pages: {}", listing.name, e);
                    break;
                }
            };
            if !state.observe(next) {
                log::warn!(
                    "[{}] Listing did not advance past result {}, stopping",
                    listing.name,
                    range.shown_to
                );
                break;
            }
            current = Some(next);
            state.current_page += 1;
        }

        log::info!(
            "[{}] Done: {} records over {} page(s)",
            listing.name,
            run.records.len(),
            run.pages
        );
        Ok(run)
    }

    async fn apply_form(
        &mut self,
        form: &SearchForm,
        listing: &ListingSpec,
    ) -> Result<(), ScraperError> {
        let legislature = &self.config.legislature;

        if let Some(select) = &form.legislature {
            self.waiter
                .present(self.session, select)
                .await
                .map_err(|source| ScraperError::FiltersUnavailable {
                    listing: listing.name,
                    source,
                })?;

            let current = self.session.value(select).await?;
            if current.as_deref() != Some(legislature.as_str()) {
                self.session
                    .select(select, legislature.as_str())
                    .await
                    .map_err(|source| ScraperError::FiltersUnavailable {
                        listing: listing.name,
                        source,
                    })?;
                log::info!("[{}] Legislature {} selected", listing.name, legislature);
            }
        }

        for (select, value) in form.selects {
            if let Err(e) = self.session.select(select, value).await {
                log::warn!(
                    "[{}] Could not select '{}' on {}: {}",
                    listing.name,
                    value,
                    select,
                    e
                );
            }
        }

        if let Some(submit) = &form.submit {
            self.waiter.click(self.session, submit).await?;
        }

        self.wait_spinner(listing).await?;
        self.waiter.present(self.session, &listing.rows).await?;
        log::info!("[{}] Results loaded", listing.name);
        Ok(())
    }

    /// Returns `false` when every attempt failed.
    async fn process_row<E>(
        &mut self,
        listing: &ListingSpec,
        index: usize,
        extractor: &mut E,
        run: &mut ListingRun<E::Record>,
    ) -> bool
    where
        E: RowExtractor<S>,
    {
        let policy = &self.config.retry;

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 && !policy.delay.is_zero() {
                sleep(policy.delay).await;
            }

            // a previous click may have re-rendered the table, so never reuse rows
            let rows = match self.session.find_html(&listing.rows).await {
                Ok(rows) => rows,
                Err(e) => {
                    log::warn!(
                        "[{}] Error reading row {} (attempt {}/{}): {}",
                        listing.name,
                        index + 1,
                        attempt,
                        policy.max_attempts,
                        e
                    );
                    continue;
                }
            };
            let Some(row) = rows.get(index) else {
                log::debug!(
                    "[{}] Row {} vanished after re-render",
                    listing.name,
                    index + 1
                );
                return true;
            };

            match extractor.extract(self.session, row).await {
                Ok(Some(record)) => {
                    run.records.push(record);
                    return true;
                }
                Ok(None) => return true,
                Err(e) => log::warn!(
                    "[{}] Error processing row {} (attempt {}/{}): {}",
                    listing.name,
                    index + 1,
                    attempt,
                    policy.max_attempts,
                    e
                ),
            }
        }

        log::warn!("[{}] Skipping row {}", listing.name, index + 1);
        false
    }

    async fn read_range(&mut self, listing: &ListingSpec) -> Option<ResultsRange> {
        for summary in listing.summaries {
            match self.session.text(summary).await {
                Ok(Some(text)) => {
                    if let Some(range) = parse_results_range(&text) {
                        return Some(range);
                    }
                    log::debug!("[{}] Unrecognised summary: {:?}", listing.name, text);
                }
                Ok(None) => {}
                Err(e) => log::debug!("[{}] Could not read {}: {}", listing.name, summary, e),
            }
        }
        None
    }

    async fn wait_spinner(&mut self, listing: &ListingSpec) -> Result<(), BrowserError> {
        match &listing.spinner {
            Some(spinner) => self.waiter.invisible(self.session, spinner).await,
            None => Ok(()),
        }
    }

    /// Rows on the current page, re-read under the retry policy. `None`
    /// once every attempt failed.
    async fn count_rows(&mut self, listing: &ListingSpec) -> Option<usize> {
        let policy = &self.config.retry;

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 && !policy.delay.is_zero() {
                sleep(policy.delay).await;
            }
            match self.session.find_html(&listing.rows).await {
                Ok(rows) => return Some(rows.len()),
                Err(e) => log::warn!(
                    "[{}] Error reading rows (attempt {}/{}): {}",
                    listing.name,
                    attempt,
                    policy.max_attempts,
                    e
                ),
            }
        }
        None
    }

    /// Clicks the next-page control and returns the range shown afterwards.
    /// If the range never moves off `previous`, the last one read is
    /// returned as is and the caller sees a stalled listing.
    async fn advance(
        &mut self,
        listing: &ListingSpec,
        previous: ResultsRange,
    ) -> Result<Option<ResultsRange>, BrowserError> {
        self.session.click(&listing.next_page).await?;
        self.wait_spinner(listing).await?;

        let config = self.config;
        let waits = &config.waits;
        let mut latest = None;
        for _ in 0..waits.range_polls {
            latest = self.read_range(listing).await.or(latest);
            if latest.is_some_and(|range| range.shown_from != previous.shown_from) {
                break;
            }
            sleep(waits.range_poll_interval).await;
        }

        self.waiter.present(self.session, &listing.rows).await?;
        Ok(latest)
    }
}
