use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{Deputy, GroupLink, GroupMembership, Legislature, Substitution};

static RE_PLENARY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DSCD-\d+-PL-\d+").expect("invalid regex: plenary code"));

static RE_UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\-]").expect("invalid regex: unsafe chars"));

static RE_FIRST_LINK_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">([^<]+)</a>").expect("invalid regex: first link text"));

static RE_SUBSTITUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sustituy.*?a:\s*.*?<a[^>]*?>([^<]+)</a>").expect("invalid regex: substitutes")
});

static RE_SUBSTITUTED_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sustituido.*?por:\s*.*?<a[^>]*?>([^<]+)</a>")
        .expect("invalid regex: substituted by")
});

static SEL_TD: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static SEL_TH: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static SEL_A: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static SEL_PUBLICATION: LazyLock<Selector> =
    LazyLock::new(|| selector("section#portlet_publicaciones"));

const PLENARY_MARKER: &str = "-PL-";
const FULL_TEXT_LINK: &str = "Texto íntegro";

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes entities in a markup fragment and flattens it to plain text.
fn fragment_text(markup: &str) -> String {
    normalize_whitespace(&elem_text(Html::parse_fragment(markup).root_element()))
}

/// A lone `<tr>` is dropped by the HTML parser outside of table context.
fn parse_row(row_html: &str) -> Html {
    Html::parse_fragment(&format!("<table><tbody>{}</tbody></table>", row_html))
}

fn cell_texts(row: &Html, sel: &Selector) -> Vec<String> {
    row.select(sel)
        .map(|c| normalize_whitespace(&elem_text(c)))
        .collect()
}

pub(crate) fn absolute_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), href)
    }
}

/// Maps any document code to a filesystem-safe identifier.
///
/// The canonical `DSCD-<leg>-PL-<n>` code is used when present; otherwise
/// every character outside `[A-Za-z0-9-]` becomes `_`. Non-empty input never
/// yields an empty identifier.
pub fn canonical_identifier(code: &str) -> String {
    match RE_PLENARY_CODE.find(code) {
        Some(m) => m.as_str().to_string(),
        None => RE_UNSAFE_CHARS.replace_all(code, "_").into_owned(),
    }
}

/// A plenary listing row: code cell plus its full-text link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlenaryRow {
    pub code: String,
    pub identifier: String,
    pub detail_url: String,
}

/// Returns `None` for rows that are not plenary sessions or have no link
/// to the full text.
pub fn parse_plenary_row(row_html: &str, base_url: &str) -> Option<PlenaryRow> {
    let row = parse_row(row_html);

    let code = row
        .select(&SEL_TD)
        .map(|c| elem_text(c).trim().to_string())
        .find(|text| text.contains("DSCD"))
        .unwrap_or_default();

    if !code.contains(PLENARY_MARKER) {
        return None;
    }

    let href = row
        .select(&SEL_A)
        .find(|a| elem_text(*a).contains(FULL_TEXT_LINK))
        .and_then(|a| a.value().attr("href"))?;

    Some(PlenaryRow {
        identifier: canonical_identifier(&code),
        detail_url: absolute_url(base_url, href),
        code,
    })
}

/// Name from the first link, group and province from the first two cells.
pub fn parse_deputy_row(row_html: &str, legislature: &Legislature) -> Option<Deputy> {
    let row = parse_row(row_html);

    let name = row
        .select(&SEL_A)
        .next()
        .map(|a| normalize_whitespace(&elem_text(a)))
        .unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    let cells = cell_texts(&row, &SEL_TD);
    Some(Deputy {
        name,
        current_group: cells.first().cloned().unwrap_or_default(),
        province: cells.get(1).cloned().unwrap_or_default(),
        legislature: legislature.clone(),
    })
}

/// Roster rows come both as `<th>name</th><td>join</td><td>leave</td>` and
/// as three plain data cells.
pub fn parse_group_row(
    row_html: &str,
    group_name: &str,
    legislature: &Legislature,
) -> Option<GroupMembership> {
    let row = parse_row(row_html);
    let headers = cell_texts(&row, &SEL_TH);
    let cells = cell_texts(&row, &SEL_TD);

    let (name, dates) = match headers.into_iter().next() {
        Some(header) => (header, &cells[..]),
        None => match cells.split_first() {
            Some((first, rest)) => (first.clone(), rest),
            None => return None,
        },
    };

    if name.is_empty() {
        return None;
    }

    Some(GroupMembership {
        member_name: name,
        group_name: group_name.to_string(),
        join_date: dates.first().cloned().unwrap_or_default(),
        leave_date: dates.get(1).cloned().unwrap_or_default(),
        legislature: legislature.clone(),
    })
}

pub fn parse_substitution_row(row_html: &str, legislature: &Legislature) -> Option<Substitution> {
    let row = parse_row(row_html);
    let cells: Vec<ElementRef> = row.select(&SEL_TD).collect();
    if cells.len() < 3 {
        return None;
    }

    let raw = cells[0].inner_html();
    let capture = |re: &Regex| {
        re.captures(&raw)
            .and_then(|c| c.get(1))
            .map(|m| fragment_text(m.as_str()))
            .unwrap_or_default()
    };

    let name = capture(&RE_FIRST_LINK_TEXT);
    if name.is_empty() {
        return None;
    }

    Some(Substitution {
        name,
        start_date: normalize_whitespace(&elem_text(cells[1])),
        end_date: normalize_whitespace(&elem_text(cells[2])),
        substitutes: capture(&RE_SUBSTITUTES),
        substituted_by: capture(&RE_SUBSTITUTED_BY),
        legislature: legislature.clone(),
    })
}

/// Group links from the composition container; link text reads
/// `"<group name>: <seats>"`.
pub fn parse_group_links(container_html: &str, base_url: &str) -> Vec<GroupLink> {
    let fragment = Html::parse_fragment(container_html);

    fragment
        .select(&SEL_A)
        .filter_map(|a| {
            let text = normalize_whitespace(&elem_text(a));
            let name = text.split(':').next().unwrap_or_default().trim().to_string();
            let href = a.value().attr("href")?;
            if name.is_empty() || href.trim().is_empty() {
                log::debug!("Skipping group link without name or href: {:?}", text);
                return None;
            }
            Some(GroupLink {
                name,
                url: absolute_url(base_url, href),
            })
        })
        .collect()
}

/// Serialized `section#portlet_publicaciones` of a transcript page.
pub fn extract_publication(page_source: &str) -> Option<String> {
    Html::parse_document(page_source)
        .select(&SEL_PUBLICATION)
        .next()
        .map(|section| section.html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BASE: &str = "https://www.congreso.es";

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("fixtures/{}", name)).expect("Failed to read fixture")
    }

    #[test]
    fn test_canonical_identifier_extracts_code() {
        assert_eq!(
            canonical_identifier("Núm. DSCD-15-PL-12 de 21/11/2023"),
            "DSCD-15-PL-12"
        );
    }

    #[test]
    fn test_canonical_identifier_fallback_is_filesystem_safe() {
        let id = canonical_identifier("DSCD 15/PL (sesión) -PL-");
        assert_eq!(id, "DSCD_15_PL__sesi_n__-PL-");
        assert!(
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_canonical_identifier_never_empty_for_non_empty_input() {
        for input in [" ", "ñ", "/", "DSCD-", "-PL-", "\u{1F600}"] {
            assert!(!canonical_identifier(input).is_empty(), "input {:?}", input);
        }
        assert_eq!(canonical_identifier(""), "");
    }

    #[test]
    fn test_parse_plenary_row_from_fixture() {
        let html = fixture("plenary_row.html");
        let row = parse_plenary_row(&html, BASE).expect("Should parse plenary row");

        assert_eq!(row.code, "DSCD-15-PL-12");
        assert_eq!(row.identifier, "DSCD-15-PL-12");
        assert_eq!(
            row.detail_url,
            "https://www.congreso.es/public_oficiales/L15/CONG/DS/PL/DSCD-15-PL-12.PDF"
        );
    }

    #[test]
    fn test_parse_plenary_row_skips_committee_sessions() {
        let html = r#"<tr><td>DSCD-15-CO-45</td>
            <td><a href="/x.pdf">Texto íntegro</a></td></tr>"#;
        assert_eq!(parse_plenary_row(html, BASE), None);
    }

    #[test]
    fn test_parse_plenary_row_without_link() {
        let html = "<tr><td>DSCD-15-PL-3</td><td>Sin texto</td></tr>";
        assert_eq!(parse_plenary_row(html, BASE), None);
    }

    #[test]
    fn test_parse_deputy_row_from_fixture() {
        let html = fixture("deputy_row.html");
        let deputy = parse_deputy_row(&html, &Legislature::default()).expect("Should parse");

        assert_eq!(deputy.name, "Abades Martínez, Pedro");
        assert_eq!(deputy.current_group, "GP Popular en el Congreso");
        assert_eq!(deputy.province, "Diputado por Ávila");
        assert_eq!(deputy.legislature.as_str(), "15");
    }

    #[test]
    fn test_parse_deputy_row_missing_cells_yield_empty_strings() {
        let html = r#"<tr><th><a href="/d">Ruiz, Eva</a></th></tr>"#;
        let deputy = parse_deputy_row(html, &Legislature::default()).unwrap();
        assert_eq!(deputy.current_group, "");
        assert_eq!(deputy.province, "");
    }

    #[test]
    fn test_parse_deputy_row_drops_blank_names() {
        let html = r#"<tr><th><a href="/d">   </a></th><td>GP</td></tr>"#;
        assert_eq!(parse_deputy_row(html, &Legislature::default()), None);
    }

    #[test]
    fn test_parse_group_row_with_header_cell() {
        let html = fixture("group_row.html");
        let membership =
            parse_group_row(&html, "GP Mixto", &Legislature::default()).expect("Should parse");

        assert_eq!(membership.member_name, "Sánchez López, Marta");
        assert_eq!(membership.join_date, "17/08/2023");
        assert_eq!(membership.leave_date, "05/02/2024");
        assert_eq!(membership.group_name, "GP Mixto");
    }

    #[test]
    fn test_parse_group_row_with_data_cells_only() {
        let html = "<tr><td>García, Luis</td><td>17/08/2023</td><td></td></tr>";
        let membership = parse_group_row(html, "GP Vox", &Legislature::default()).unwrap();

        assert_eq!(membership.member_name, "García, Luis");
        assert_eq!(membership.join_date, "17/08/2023");
        assert!(membership.is_active());
    }

    #[test]
    fn test_parse_group_row_without_cells() {
        assert_eq!(
            parse_group_row("<tr></tr>", "GP", &Legislature::default()),
            None
        );
    }

    #[test]
    fn test_parse_substitution_row_from_fixture() {
        let html = fixture("substitution_row.html");
        let sub = parse_substitution_row(&html, &Legislature::default()).expect("Should parse");

        assert_eq!(sub.name, "Martín Pérez, Juan");
        assert_eq!(sub.substitutes, "Fernández Ruiz, Carmen");
        assert_eq!(sub.substituted_by, "");
        assert_eq!(sub.start_date, "12/03/2024");
        assert_eq!(sub.end_date, "");
    }

    #[test]
    fn test_parse_substitution_row_both_fragments() {
        let html = r#"<tr>
            <td><a href="/d/1">Gil, Rosa</a><br>Sustituye a: <a href="/d/2">Mora, Ángel</a>
                <br>Sustituido por: <a href="/d/3">Vidal &amp; Hijo, Pau</a></td>
            <td>01/01/2024</td><td>01/06/2024</td></tr>"#;
        let sub = parse_substitution_row(html, &Legislature::default()).unwrap();

        assert_eq!(sub.name, "Gil, Rosa");
        assert_eq!(sub.substitutes, "Mora, Ángel");
        assert_eq!(sub.substituted_by, "Vidal & Hijo, Pau");
        assert_eq!(sub.end_date, "01/06/2024");
    }

    #[test]
    fn test_parse_substitution_row_requires_three_cells() {
        let html = r#"<tr><td><a href="/d/1">Gil, Rosa</a></td><td>01/01/2024</td></tr>"#;
        assert_eq!(parse_substitution_row(html, &Legislature::default()), None);
    }

    #[test]
    fn test_parse_group_links_from_fixture() {
        let html = fixture("groups_content.html");
        let links = parse_group_links(&html, BASE);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].name, "Grupo Parlamentario Popular en el Congreso");
        assert!(links[0].url.starts_with("https://www.congreso.es/"));
        assert_eq!(links[2].name, "Grupo Parlamentario Mixto");
    }

    #[test]
    fn test_extract_publication() {
        let page = r#"<html><body><header>menu</header>
            <section id="portlet_publicaciones"><p>Se abre la sesión.</p></section>
            </body></html>"#;
        let content = extract_publication(page).expect("Should find section");
        assert!(content.starts_with("<section"));
        assert!(content.contains("Se abre la sesión."));
        assert_eq!(extract_publication("<html><body></body></html>"), None);
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url(BASE, "/a/b"), "https://www.congreso.es/a/b");
        assert_eq!(absolute_url(BASE, "a/b"), "https://www.congreso.es/a/b");
        assert_eq!(absolute_url(BASE, "//cdn.x/y"), "https://cdn.x/y");
        assert_eq!(absolute_url(BASE, "https://x.es/z"), "https://x.es/z");
    }
}
