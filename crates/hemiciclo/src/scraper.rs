use std::time::Duration;

use serde::Serialize;

use crate::browser::{BrowserError, BrowserSession, Locator, Waiter};
use crate::config::ScraperConfig;
use crate::enrich::enrich;
use crate::pagination::{ListingSpec, ParseRows, Paginator, SearchForm};
use crate::parser::{parse_deputy_row, parse_group_links, parse_group_row, parse_substitution_row};
use crate::plenary::{DocumentStore, PlenaryExtractor};
use crate::types::{
    Deputy, EnrichedDeputy, GroupLink, GroupMembership, PlenaryDocument, Substitution,
};
use crate::utils::GroupFilter;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("Search filters for {listing} did not load: {source}")]
    FiltersUnavailable {
        listing: &'static str,
        source: BrowserError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

const PLENARIES_PATH: &str = "/busqueda-de-publicaciones";
const DEPUTIES_PATH: &str = "/busqueda-de-diputados";
const SUBSTITUTIONS_PATH: &str = "/es/diputados-sustituidos-y-sustitutos";
const GROUPS_PATH: &str = "/es/grupos/composicion-en-la-legislatura";

const COOKIE_BUTTON: Locator = Locator::XPath("//a[normalize-space(text())='Aceptar todas']");
const COOKIE_TIMEOUT: Duration = Duration::from_secs(5);
const SPINNER: Locator = Locator::Css(".spinner-border");

const PLENARY_FORM: SearchForm = SearchForm {
    legislature: Some(Locator::Css("#_publicaciones_legislatura")),
    selects: &[
        (Locator::Css("#publicacion"), "D"),
        (Locator::Css("#seccion"), "CONGRESO"),
    ],
    submit: Some(Locator::XPath(
        "//button[.//span[normalize-space(text())='Buscar']]",
    )),
};

const PLENARY_LISTING: ListingSpec = ListingSpec {
    name: "plenaries",
    rows: Locator::XPath("//tr[td//a[contains(text(),'Texto íntegro')]]"),
    summaries: &[Locator::Css("#_publicaciones_resultsShowedPublicaciones")],
    next_page: Locator::XPath(
        "//ul[@id='_publicaciones_paginationLinksPublicaciones']//a[text()='>']",
    ),
    spinner: Some(SPINNER),
};

const DEPUTY_FORM: SearchForm = SearchForm {
    legislature: Some(Locator::Css("#_diputadomodule_legislatura")),
    selects: &[(Locator::Css("#_diputadomodule_tipo"), "2")],
    submit: Some(Locator::Css("#_diputadomodule_searchButtonDiputadosForm")),
};

const DEPUTY_LISTING: ListingSpec = ListingSpec {
    name: "deputies",
    rows: Locator::Css("#_diputadomodule_contentPaginationDiputados table tbody tr"),
    summaries: &[
        Locator::Css("#_diputadomodule_resultsShowedDiputados"),
        Locator::Css("#_diputadomodule_resultsShowedFooterDiputados"),
    ],
    next_page: Locator::XPath(
        "//ul[@id='_diputadomodule_paginationLinksDiputados']//a[text()='>']",
    ),
    spinner: Some(SPINNER),
};

const SUBSTITUTION_FORM: SearchForm = SearchForm {
    legislature: Some(Locator::Css("#_diputadomodule_legislatura")),
    selects: &[(Locator::Css("#_diputadomodule_tipoSustitucion"), "0")],
    submit: Some(Locator::XPath(
        "//button[.//span[contains(text(), 'Buscar')]]",
    )),
};

const SUBSTITUTION_LISTING: ListingSpec = ListingSpec {
    name: "substitutions",
    rows: Locator::Css("#_diputadomodule_contentPaginationSustituciones table tbody tr"),
    summaries: &[
        Locator::Css("#_diputadomodule_resultsShowedFooterSustituciones"),
        Locator::Css("#_diputadomodule_resultsShowedSustituciones"),
    ],
    next_page: Locator::XPath(
        "//ul[@id='_diputadomodule_paginationLinksSustituciones']//a[text()='>']",
    ),
    spinner: Some(SPINNER),
};

const GROUP_LEGISLATURE: Locator = Locator::Css("#_grupos_legislatura");
const GROUP_CONTAINER: Locator = Locator::Css("#_grupos_ajaxContentGrupo");

/// Switches a group page to its join/leave history.
const ROSTER_FORM: SearchForm = SearchForm {
    legislature: None,
    selects: &[],
    submit: Some(Locator::Css("#_grupos_altaBajaA")),
};

const ROSTER_LISTING: ListingSpec = ListingSpec {
    name: "group roster",
    rows: Locator::Css("#_grupos_contentPaginationDiputados table tbody tr"),
    summaries: &[Locator::Css("#_grupos_resultsShowedFooterDiputados")],
    next_page: Locator::XPath("//ul[@id='_grupos_paginationLinksDiputados']//a[text()='>']"),
    spinner: Some(SPINNER),
};

#[derive(Debug, Serialize)]
pub struct PlenaryReport {
    pub documents: Vec<PlenaryDocument>,
    pub downloaded: usize,
    pub pages: u32,
}

/// Runs the congreso.es listings over one browser session.
pub struct CongresoScraper<S: BrowserSession> {
    session: S,
    config: ScraperConfig,
    base_url: String,
    cookies_accepted: bool,
}

impl<S: BrowserSession> CongresoScraper<S> {
    pub fn new(session: S, config: ScraperConfig) -> Self {
        Self {
            session,
            config,
            base_url: crate::BASE_URL.to_string(),
            cookies_accepted: false,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    fn waiter(&self) -> Waiter {
        Waiter::new(&self.config.waits)
    }

    /// Loads `path` and gets the page ready for a search.
    async fn open(&mut self, path: &str) -> Result<(), ScraperError> {
        let url = format!("{}{}", self.base_url, path);
        log::info!("Opening {}", url);
        self.session.goto(&url).await?;
        self.accept_cookies().await;
        self.waiter().invisible(&mut self.session, &SPINNER).await?;
        Ok(())
    }

    /// Dismisses the consent banner if it shows up. Never fails.
    pub async fn accept_cookies(&mut self) {
        if self.cookies_accepted {
            return;
        }
        let waiter = self
            .waiter()
            .with_timeout(COOKIE_TIMEOUT.min(self.config.waits.timeout));
        match waiter.click(&mut self.session, &COOKIE_BUTTON).await {
            Ok(()) => {
                self.cookies_accepted = true;
                log::info!("Cookies accepted");
            }
            Err(e) => log::debug!("Cookie banner not dismissed: {}", e),
        }
    }

    /// Downloads every plenary transcript of the configured legislature that
    /// is not in `store` yet.
    pub async fn fetch_plenaries(
        &mut self,
        store: &DocumentStore,
    ) -> Result<PlenaryReport, ScraperError> {
        self.open(PLENARIES_PATH).await?;

        let mut extractor = PlenaryExtractor::new(store, self.waiter(), &self.base_url);
        let run = Paginator::new(&mut self.session, &self.config)
            .run_listing(&PLENARY_FORM, &PLENARY_LISTING, &mut extractor)
            .await?;

        log::info!("New plenary sessions downloaded: {}", extractor.downloaded);
        Ok(PlenaryReport {
            downloaded: extractor.downloaded,
            documents: run.records,
            pages: run.pages,
        })
    }

    pub async fn fetch_deputies(&mut self) -> Result<Vec<Deputy>, ScraperError> {
        self.open(DEPUTIES_PATH).await?;

        let legislature = self.config.legislature.clone();
        let mut extractor = ParseRows(|row: &str| parse_deputy_row(row, &legislature));
        let run = Paginator::new(&mut self.session, &self.config)
            .run_listing(&DEPUTY_FORM, &DEPUTY_LISTING, &mut extractor)
            .await?;
        Ok(run.records)
    }

    pub async fn fetch_substitutions(&mut self) -> Result<Vec<Substitution>, ScraperError> {
        self.open(SUBSTITUTIONS_PATH).await?;

        let legislature = self.config.legislature.clone();
        let mut extractor = ParseRows(|row: &str| parse_substitution_row(row, &legislature));
        let run = Paginator::new(&mut self.session, &self.config)
            .run_listing(&SUBSTITUTION_FORM, &SUBSTITUTION_LISTING, &mut extractor)
            .await?;
        Ok(run.records)
    }

    /// Deputies joined with their substitution episode, if any.
    pub async fn fetch_enriched_deputies(&mut self) -> Result<Vec<EnrichedDeputy>, ScraperError> {
        let deputies = self.fetch_deputies().await?;
        let substitutions = self.fetch_substitutions().await?;
        log::info!(
            "Joining {} deputies with {} substitution records",
            deputies.len(),
            substitutions.len()
        );
        Ok(enrich(&deputies, &substitutions))
    }

    pub async fn fetch_group_links(&mut self) -> Result<Vec<GroupLink>, ScraperError> {
        self.open(GROUPS_PATH).await?;
        let waiter = self.waiter();
        let legislature = self.config.legislature.clone();

        waiter
            .present(&mut self.session, &GROUP_LEGISLATURE)
            .await
            .map_err(|source| ScraperError::FiltersUnavailable {
                listing: "groups",
                source,
            })?;
        self.session
            .select(&GROUP_LEGISLATURE, legislature.as_str())
            .await
            .map_err(|source| ScraperError::FiltersUnavailable {
                listing: "groups",
                source,
            })?;

        waiter.invisible(&mut self.session, &SPINNER).await?;
        waiter.present(&mut self.session, &GROUP_CONTAINER).await?;

        let links = self
            .session
            .find_html(&GROUP_CONTAINER)
            .await?
            .iter()
            .flat_map(|container| parse_group_links(container, &self.base_url))
            .collect::<Vec<_>>();
        log::info!("Found {} parliamentary groups", links.len());
        Ok(links)
    }

    /// Join/leave history of one group. Rows carry the group's name.
    pub async fn fetch_group_roster(
        &mut self,
        link: &GroupLink,
    ) -> Result<Vec<GroupMembership>, ScraperError> {
        log::info!("Processing group: {}", link.name);
        self.session.goto(&link.url).await?;
        self.waiter().invisible(&mut self.session, &SPINNER).await?;

        let legislature = self.config.legislature.clone();
        let mut extractor =
            ParseRows(|row: &str| parse_group_row(row, &link.name, &legislature));
        let run = Paginator::new(&mut self.session, &self.config)
            .run_listing(&ROSTER_FORM, &ROSTER_LISTING, &mut extractor)
            .await?;
        Ok(run.records)
    }

    /// Rosters of the groups passing `filter`. A group whose history cannot
    /// be opened is logged and contributes no rows.
    pub async fn fetch_groups(
        &mut self,
        filter: &GroupFilter,
    ) -> Result<Vec<GroupMembership>, ScraperError> {
        let links = filter.apply(self.fetch_group_links().await?);

        let mut memberships = Vec::new();
        for link in &links {
            match self.fetch_group_roster(link).await {
                Ok(rows) => {
                    log::info!("  -> {} members extracted", rows.len());
                    memberships.extend(rows);
                }
                Err(e) => log::warn!("Could not read join/leave history of {}: {}", link.name, e),
            }
        }
        Ok(memberships)
    }

    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.session.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, FakeSession};
    use crate::config::{RetryPolicy, WaitConfig};
    use std::fs;

    const BASE: &str = "https://www.congreso.es";

    fn config() -> ScraperConfig {
        ScraperConfig {
            waits: WaitConfig {
                timeout: Duration::from_millis(40),
                poll_interval: Duration::from_millis(5),
                range_polls: 2,
                range_poll_interval: Duration::from_millis(1),
            },
            retry: RetryPolicy::default(),
            ..ScraperConfig::default()
        }
    }

    fn deputy_page(rows: &[String], summary: &str) -> FakePage {
        rows.iter()
            .fold(FakePage::new(), |p, r| p.element(DEPUTY_LISTING.rows, r))
            .text(DEPUTY_LISTING.summaries[0], summary)
    }

    fn with_deputy_form(session: &mut FakeSession) {
        session.add_global(
            Locator::Css("#_diputadomodule_legislatura"),
            "<select></select>",
        );
        session.add_global(Locator::Css("#_diputadomodule_tipo"), "<select></select>");
        session.add_global(
            Locator::Css("#_diputadomodule_searchButtonDiputadosForm"),
            "<button>Buscar</button>",
        );
        session.next_page_via(DEPUTY_LISTING.next_page);
    }

    #[tokio::test]
    async fn test_fetch_deputies_across_pages() {
        let row = fs::read_to_string("fixtures/deputy_row.html").unwrap();
        let other = row.replace("Abades Martínez, Pedro", "Agirretxea Urresti, Joseba Andoni");
        let mut session = FakeSession::new();
        session.route(
            &format!("{}{}", BASE, DEPUTIES_PATH),
            vec![
                deputy_page(&[row.clone()], "Resultados 1 a 1 de 2"),
                deputy_page(&[other], "Resultados 2 a 2 de 2"),
            ],
        );
        with_deputy_form(&mut session);

        let mut scraper = CongresoScraper::new(session, config());
        let deputies = scraper.fetch_deputies().await.unwrap();

        assert_eq!(deputies.len(), 2);
        assert_eq!(deputies[0].name, "Abades Martínez, Pedro");
        assert_eq!(deputies[0].province, "Diputado por Ávila");
        assert_eq!(deputies[1].name, "Agirretxea Urresti, Joseba Andoni");
        assert_eq!(
            scraper.session_mut().visited,
            vec![format!("{}{}", BASE, DEPUTIES_PATH)]
        );
    }

    #[tokio::test]
    async fn test_cookie_banner_is_optional() {
        let mut session = FakeSession::new();
        session.add_global(COOKIE_BUTTON, "<a>Aceptar todas</a>");
        let mut scraper = CongresoScraper::new(session, config());

        scraper.accept_cookies().await;
        scraper.accept_cookies().await;
        assert_eq!(scraper.session_mut().clicks(&COOKIE_BUTTON), 1);

        let mut scraper = CongresoScraper::new(FakeSession::new(), config());
        scraper.accept_cookies().await;
        assert!(!scraper.cookies_accepted);
    }

    #[tokio::test]
    async fn test_fetch_groups_skips_unreadable_group() {
        let container = fs::read_to_string("fixtures/groups_content.html").unwrap();
        let roster_row = fs::read_to_string("fixtures/group_row.html").unwrap();
        let links = parse_group_links(&container, BASE);
        assert_eq!(links.len(), 3);

        let mut session = FakeSession::new();
        session.add_global(GROUP_LEGISLATURE, "<select></select>");
        session.add_global(GROUP_CONTAINER, &container);
        session.add_global(ROSTER_FORM.submit.unwrap(), "<a>Altas y bajas</a>");
        let roster = FakePage::new()
            .element(ROSTER_LISTING.rows, &roster_row)
            .text(ROSTER_LISTING.summaries[0], "Resultados 1 a 1 de 1");
        session.route(&links[0].url, vec![roster.clone()]);
        session.route(&links[1].url, vec![roster]);
        session.route(&links[2].url, vec![]);

        let mut scraper = CongresoScraper::new(session, config());
        let memberships = scraper.fetch_groups(&GroupFilter::default()).await.unwrap();

        assert_eq!(memberships.len(), 2);
        assert_eq!(
            memberships[0].group_name,
            "Grupo Parlamentario Popular en el Congreso"
        );
        assert_eq!(memberships[1].group_name, "Grupo Parlamentario Socialista");
        assert_eq!(memberships[1].member_name, "Sánchez López, Marta");
        assert_eq!(memberships[1].leave_date, "05/02/2024");
        assert_eq!(
            scraper.session_mut().selections,
            vec![(GROUP_LEGISLATURE, "15".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_group_selector_is_fatal() {
        let mut scraper = CongresoScraper::new(FakeSession::new(), config());
        let err = scraper.fetch_groups(&GroupFilter::default()).await.unwrap_err();
        assert!(matches!(
            err,
            ScraperError::FiltersUnavailable {
                listing: "groups",
                ..
            }
        ));
    }
}
