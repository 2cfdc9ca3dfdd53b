//! Scriptable in-memory [`BrowserSession`] for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{BrowserError, BrowserSession, Locator};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    elements: HashMap<Locator, Vec<String>>,
    texts: HashMap<Locator, String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, locator: Locator, html: &str) -> Self {
        self.elements
            .entry(locator)
            .or_default()
            .push(html.to_string());
        self
    }

    pub fn text(mut self, locator: Locator, text: &str) -> Self {
        self.texts.insert(locator, text.to_string());
        self
    }
}

/// Pages are switched by clicking the registered next-page locator or by
/// navigating to a routed URL. Secondary tabs render the registered
/// document for their URL.
#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    pages: Vec<FakePage>,
    current: usize,
    globals: HashMap<Locator, Vec<String>>,
    routes: HashMap<String, Vec<FakePage>>,
    next_page: Option<Locator>,
    hidden: HashSet<Locator>,
    values: HashMap<Locator, String>,
    queued: HashMap<Locator, VecDeque<Vec<String>>>,
    failures: HashMap<Locator, usize>,
    tab_open_failures: usize,
    tab_close_failures: usize,
    documents: HashMap<String, String>,
    tabs: Vec<String>,
    clicks: HashMap<Locator, usize>,
    pub visited: Vec<String>,
    pub opened_tabs: Vec<String>,
    pub closed_tabs: usize,
    pub selections: Vec<(Locator, String)>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&mut self, page: FakePage) {
        self.pages.push(page);
    }

    pub fn add_element(&mut self, locator: Locator, html: &str) {
        if self.pages.is_empty() {
            self.pages.push(FakePage::new());
        }
        let last = self.pages.len() - 1;
        self.pages[last]
            .elements
            .entry(locator)
            .or_default()
            .push(html.to_string());
    }

    /// Elements present regardless of the current page (form controls, buttons).
    pub fn add_global(&mut self, locator: Locator, html: &str) {
        self.globals
            .entry(locator)
            .or_default()
            .push(html.to_string());
    }

    pub fn route(&mut self, url: &str, pages: Vec<FakePage>) {
        self.routes.insert(url.to_string(), pages);
    }

    pub fn next_page_via(&mut self, locator: Locator) {
        self.next_page = Some(locator);
    }

    pub fn hide(&mut self, locator: Locator) {
        self.hidden.insert(locator);
    }

    pub fn set_value(&mut self, locator: Locator, value: &str) {
        self.values.insert(locator, value.to_string());
    }

    /// The next `find_html` calls on `locator` return these results in order.
    pub fn queue_results(&mut self, locator: Locator, results: Vec<Vec<String>>) {
        self.queued.entry(locator).or_default().extend(results);
    }

    /// The next `times` reads of `locator` fail like a stale element would.
    pub fn fail_reads(&mut self, locator: Locator, times: usize) {
        self.failures.insert(locator, times);
    }

    /// The next `times` tab openings fail before any tab exists.
    pub fn fail_tab_opens(&mut self, times: usize) {
        self.tab_open_failures = times;
    }

    /// The next `times` tab closings fail and leave the tab open.
    pub fn fail_tab_closes(&mut self, times: usize) {
        self.tab_close_failures = times;
    }

    pub fn add_document(&mut self, url: &str, html: &str) {
        self.documents.insert(url.to_string(), html.to_string());
    }

    pub fn clicks(&self, locator: &Locator) -> usize {
        self.clicks.get(locator).copied().unwrap_or(0)
    }

    pub fn current_page(&self) -> usize {
        self.current + 1
    }

    pub fn open_tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn lookup(&self, locator: &Locator) -> Vec<String> {
        if let Some(url) = self.tabs.last() {
            return self
                .documents
                .get(url)
                .map(|doc| select_css(doc, locator))
                .unwrap_or_default();
        }
        if self.next_page.as_ref() == Some(locator) {
            return if self.current + 1 < self.pages.len() {
                vec!["<a>&gt;</a>".to_string()]
            } else {
                Vec::new()
            };
        }
        let on_page = self
            .pages
            .get(self.current)
            .and_then(|p| p.elements.get(locator))
            .cloned();
        on_page
            .or_else(|| self.globals.get(locator).cloned())
            .unwrap_or_default()
    }
}

fn select_css(document: &str, locator: &Locator) -> Vec<String> {
    let Locator::Css(css) = locator else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    Html::parse_document(document)
        .select(&selector)
        .map(|e| e.html())
        .collect()
}

fn markup_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.visited.push(url.to_string());
        if let Some(pages) = self.routes.get(url) {
            self.pages = pages.clone();
            self.current = 0;
        }
        Ok(())
    }

    async fn find_html(&mut self, locator: &Locator) -> Result<Vec<String>, BrowserError> {
        if let Some(left) = self.failures.get_mut(locator)
            && *left > 0
        {
            *left -= 1;
            return Err(BrowserError::Driver(
                "stale element reference: element is not attached to the page document".into(),
            ));
        }
        if let Some(queue) = self.queued.get_mut(locator)
            && let Some(result) = queue.pop_front()
        {
            return Ok(result);
        }
        Ok(self.lookup(locator))
    }

    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        if self.tabs.is_empty()
            && let Some(text) = self
                .pages
                .get(self.current)
                .and_then(|p| p.texts.get(locator))
        {
            return Ok(Some(text.clone()));
        }
        Ok(self.lookup(locator).first().map(|html| markup_text(html)))
    }

    async fn value(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        Ok(self.values.get(locator).cloned())
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        Ok(!self.lookup(locator).is_empty())
    }

    async fn is_visible(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        Ok(!self.hidden.contains(locator) && !self.lookup(locator).is_empty())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError> {
        if self.lookup(locator).is_empty() {
            return Err(BrowserError::NotFound(*locator));
        }
        *self.clicks.entry(*locator).or_default() += 1;
        if self.next_page.as_ref() == Some(locator) {
            self.current += 1;
        }
        Ok(())
    }

    async fn select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError> {
        if self.lookup(locator).is_empty() {
            return Err(BrowserError::NotFound(*locator));
        }
        self.values.insert(*locator, value.to_string());
        self.selections.push((*locator, value.to_string()));
        Ok(())
    }

    async fn open_tab(&mut self, url: &str) -> Result<(), BrowserError> {
        if self.tab_open_failures > 0 {
            self.tab_open_failures -= 1;
            return Err(BrowserError::Driver("target crashed while opening tab".into()));
        }
        self.opened_tabs.push(url.to_string());
        self.tabs.push(url.to_string());
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), BrowserError> {
        if self.tab_close_failures > 0 {
            self.tab_close_failures -= 1;
            return Err(BrowserError::Driver("could not close target".into()));
        }
        self.tabs.pop().ok_or(BrowserError::NoSecondaryTab)?;
        self.closed_tabs += 1;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        match self.tabs.last() {
            Some(url) => Ok(self.documents.get(url).cloned().unwrap_or_default()),
            None => Ok(String::new()),
        }
    }

    async fn shutdown(&mut self) -> Result<(), BrowserError> {
        self.tabs.clear();
        Ok(())
    }
}
