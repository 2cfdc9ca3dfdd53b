use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::browser::{BrowserError, BrowserSession, Locator, Waiter};
use crate::pagination::RowExtractor;
use crate::parser::{PlenaryRow, extract_publication, parse_plenary_row};
use crate::scraper::ScraperError;
use crate::types::{Legislature, PlenaryDocument};

pub(crate) const CONTENT_MARKER: Locator = Locator::Css("section#portlet_publicaciones");

/// Transcripts on disk, one `<identifier>.html` per document under a
/// directory per legislature.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub async fn open(output_dir: &Path, legislature: &Legislature) -> io::Result<Self> {
        let dir = output_dir.join(legislature.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.html", identifier))
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        tokio::fs::try_exists(self.path_for(identifier))
            .await
            .unwrap_or(false)
    }

    pub async fn write(&self, identifier: &str, content: &str) -> io::Result<PathBuf> {
        let path = self.path_for(identifier);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

/// Downloads the transcript behind `row` unless it is already stored.
///
/// Returns `true` only when a new file was written. A page without the
/// publication section is logged and reported as `false`. The detail tab is
/// closed before returning, whatever happened inside it.
pub async fn maybe_fetch_and_store<S: BrowserSession + ?Sized>(
    session: &mut S,
    waiter: &Waiter,
    store: &DocumentStore,
    row: &PlenaryRow,
) -> Result<bool, ScraperError> {
    if store.contains(&row.identifier).await {
        log::info!("Already stored: {}.html", row.identifier);
        return Ok(false);
    }

    log::info!("Fetching {}", row.detail_url);
    session.open_tab(&row.detail_url).await?;

    let fetched = fetch_publication(session, waiter, store, row).await;
    let closed = session.close_tab().await;

    let stored = fetched?;
    closed?;
    Ok(stored)
}

async fn fetch_publication<S: BrowserSession + ?Sized>(
    session: &mut S,
    waiter: &Waiter,
    store: &DocumentStore,
    row: &PlenaryRow,
) -> Result<bool, ScraperError> {
    match waiter.present(session, &CONTENT_MARKER).await {
        Ok(()) => {}
        Err(BrowserError::Timeout { .. }) => {
            log::warn!("No content found for {}", row.identifier);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    let source = session.page_source().await?;
    let Some(content) = extract_publication(&source) else {
        log::warn!("No content found for {}", row.identifier);
        return Ok(false);
    };

    let path = store.write(&row.identifier, &content).await?;
    log::info!("Stored {}", path.display());
    Ok(true)
}

/// Listing rows → stored transcripts.
pub struct PlenaryExtractor<'a> {
    store: &'a DocumentStore,
    waiter: Waiter,
    base_url: String,
    /// Identifier written by an attempt that failed afterwards.
    interrupted: Option<String>,
    pub downloaded: usize,
}

impl<'a> PlenaryExtractor<'a> {
    pub fn new(store: &'a DocumentStore, waiter: Waiter, base_url: &str) -> Self {
        Self {
            store,
            waiter,
            base_url: base_url.to_string(),
            interrupted: None,
            downloaded: 0,
        }
    }
}

#[async_trait]
impl<'a, S: BrowserSession + ?Sized> RowExtractor<S> for PlenaryExtractor<'a> {
    type Record = PlenaryDocument;

    async fn extract(
        &mut self,
        session: &mut S,
        row_html: &str,
    ) -> Result<Option<PlenaryDocument>, ScraperError> {
        let Some(row) = parse_plenary_row(row_html, &self.base_url) else {
            return Ok(None);
        };

        let resumed = self
            .interrupted
            .take()
            .is_some_and(|id| id == row.identifier);
        let already_downloaded = !resumed && self.store.contains(&row.identifier).await;

        match maybe_fetch_and_store(session, &self.waiter, self.store, &row).await {
            Ok(true) => self.downloaded += 1,
            Ok(false) => {}
            Err(e) => {
                // the file may be on disk already if only closing the tab failed
                if resumed || (!already_downloaded && self.store.contains(&row.identifier).await)
                {
                    if !resumed {
                        self.downloaded += 1;
                    }
                    self.interrupted = Some(row.identifier.clone());
                }
                return Err(e);
            }
        }

        Ok(Some(PlenaryDocument {
            code: row.code,
            identifier: row.identifier,
            source_url: row.detail_url,
            already_downloaded,
        }))
    }
}
