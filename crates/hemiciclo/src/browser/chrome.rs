use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowserError, BrowserSession, Locator};
use crate::config::BrowserOptions;

const IS_VISIBLE_JS: &str = "function() { \
    const style = window.getComputedStyle(this); \
    return style.display !== 'none' && style.visibility !== 'hidden' \
        && !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); \
}";

const CLICK_JS: &str = "function() { this.click(); }";

const VALUE_JS: &str = "function() { return this.value === undefined ? null : String(this.value); }";

/// A Chrome instance driven over the DevTools protocol.
///
/// `tabs[0]` is the listing tab; a detail tab, when open, sits on top.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    tabs: Vec<Page>,
}

impl ChromeSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("CDP handler stopped: {e}");
                    break;
                }
            }
        });

        let primary = browser.new_page("about:blank").await?;
        log::info!(
            "Browser session started ({})",
            if options.headless { "headless" } else { "headed" }
        );

        Ok(Self {
            browser,
            handler,
            tabs: vec![primary],
        })
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.tabs
            .last()
            .ok_or_else(|| BrowserError::Driver("browser session has no open tab".into()))
    }

    async fn elements(&self, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        let page = self.page()?;
        let found = match locator {
            Locator::Css(css) => page.find_elements(*css).await,
            Locator::XPath(xpath) => page.find_xpaths(*xpath).await,
        };
        // the driver reports "no match" as an error for some queries
        match found {
            Ok(elements) => Ok(elements),
            Err(e) if e.to_string().contains("Could not find node") => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn first(&self, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        Ok(self.elements(locator).await?.into_iter().next())
    }

    async fn js_value(
        element: &Element,
        function: &str,
    ) -> Result<Option<serde_json::Value>, BrowserError> {
        let returns = element.call_js_fn(function, false).await?;
        Ok(returns.result.value)
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        log::debug!("Navigating to {}", url);
        self.page()?.goto(url).await?;
        Ok(())
    }

    async fn find_html(&mut self, locator: &Locator) -> Result<Vec<String>, BrowserError> {
        let mut markup = Vec::new();
        for element in self.elements(locator).await? {
            markup.push(element.outer_html().await?.unwrap_or_default());
        }
        Ok(markup)
    }

    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        match self.first(locator).await? {
            Some(element) => Ok(element.inner_text().await?),
            None => Ok(None),
        }
    }

    async fn value(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        let Some(element) = self.first(locator).await? else {
            return Ok(None);
        };
        Ok(Self::js_value(&element, VALUE_JS)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        Ok(!self.elements(locator).await?.is_empty())
    }

    async fn is_visible(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        let Some(element) = self.first(locator).await? else {
            return Ok(false);
        };
        Ok(Self::js_value(&element, IS_VISIBLE_JS)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError> {
        let element = self
            .first(locator)
            .await?
            .ok_or(BrowserError::NotFound(*locator))?;
        element.call_js_fn(CLICK_JS, false).await?;
        Ok(())
    }

    async fn select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError> {
        let element = self
            .first(locator)
            .await?
            .ok_or(BrowserError::NotFound(*locator))?;
        let value = serde_json::to_string(value)
            .map_err(|e| BrowserError::Driver(format!("unencodable option value: {e}")))?;
        let function = format!(
            "function() {{ \
                const wanted = {value}; \
                if (![...this.options].some(o => o.value === wanted)) return false; \
                this.value = wanted; \
                this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                return true; \
            }}"
        );
        let selected = Self::js_value(&element, &function)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if selected {
            Ok(())
        } else {
            Err(BrowserError::Driver(format!(
                "{} has no option with value {}",
                locator, value
            )))
        }
    }

    async fn open_tab(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.browser.new_page(url).await?;
        page.bring_to_front().await?;
        self.tabs.push(page);
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), BrowserError> {
        if self.tabs.len() < 2 {
            return Err(BrowserError::NoSecondaryTab);
        }
        if let Some(page) = self.tabs.pop() {
            page.close().await?;
        }
        self.page()?.bring_to_front().await?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.page()?.content().await?)
    }

    async fn shutdown(&mut self) -> Result<(), BrowserError> {
        self.tabs.clear();
        self.browser.close().await?;
        self.browser.wait().await.map_err(|e| BrowserError::Driver(e.to_string()))?;
        self.handler.abort();
        log::info!("Browser session closed");
        Ok(())
    }
}
