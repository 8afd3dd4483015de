use crate::models::RawTableRow;
use ::scraper::{ElementRef, Html, Selector};

// ── Document capability ───────────────────────────────────────────────────────

/// Anything the table extractors can read sections out of.
pub trait TableSource {
    /// Body rows of the table held by the container whose id is
    /// `section_id`, in page order. `None` when there is no such container
    /// (or it holds no table body).
    fn section_rows(&self, section_id: &str) -> Option<Vec<RawTableRow>>;
}

// ── HTML implementation ───────────────────────────────────────────────────────

/// A parsed market summary page.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// The single element carrying `id`.
    pub fn find_section(&self, id: &str) -> Option<ElementRef<'_>> {
        let sel = id_selector(id)?;
        self.html.select(&sel).next()
    }

    pub fn has_element(&self, id: &str) -> bool {
        self.find_section(id).is_some()
    }

    /// `<tr>` children of the first `<tbody>` under `section`.
    pub fn rows_of<'a>(section: ElementRef<'a>) -> Option<Vec<ElementRef<'a>>> {
        let tbody_sel = Selector::parse("tbody").ok()?;
        let tbody = section.select(&tbody_sel).next()?;
        Some(child_elements(tbody, "tr").collect())
    }

    /// Trimmed text of each `<td>` of `row`.
    pub fn cells_of(row: ElementRef<'_>) -> Vec<String> {
        child_elements(row, "td")
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect()
    }
}

impl TableSource for HtmlDocument {
    fn section_rows(&self, section_id: &str) -> Option<Vec<RawTableRow>> {
        let section = self.find_section(section_id)?;
        let rows = Self::rows_of(section)?;
        Some(
            rows.into_iter()
                .map(|tr| RawTableRow {
                    cells: Self::cells_of(tr),
                })
                .collect(),
        )
    }
}

/// Quick marker probe on raw markup, used by the HTTP session.
pub fn markup_has_element(markup: &str, id: &str) -> bool {
    HtmlDocument::parse(markup).has_element(id)
}

fn id_selector(id: &str) -> Option<Selector> {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    Selector::parse(&format!("[id=\"{}\"]", escaped)).ok()
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}
