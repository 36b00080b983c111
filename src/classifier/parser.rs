//! Search result extraction
//!
//! Result entries on the catalog page are headings whose only child is a
//! link to the post: `<h2 class="post-title"><a href="...">Title</a></h2>`.

use crate::classifier::CandidateMatch;
use scraper::{Html, Selector};

const RESULT_SELECTOR: &str = "h2 > a[href], h3 > a[href], h4 > a[href]";

/// Extracts (title, link) candidates from a search page in document order
///
/// Markup that cannot be understood simply yields no candidates; an empty
/// list is a normal "nothing listed" outcome, never an error.
///
/// # Example
///
/// ```
/// use tpb_poller::classifier::extract_candidates;
///
/// let html = r#"<h2><a href="/saga-vol-10">Saga Vol. 10 TPB</a></h2>"#;
/// let candidates = extract_candidates(html);
/// assert_eq!(candidates[0].title, "Saga Vol. 10 TPB");
/// assert_eq!(candidates[0].link, "/saga-vol-10");
/// ```
pub fn extract_candidates(html: &str) -> Vec<CandidateMatch> {
    let selector = match Selector::parse(RESULT_SELECTOR) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|element| {
            let link = element.value().attr("href")?.trim();
            let title = element.text().collect::<String>();
            let title = title.trim();

            if link.is_empty() || title.is_empty() {
                return None;
            }

            Some(CandidateMatch {
                title: title.to_string(),
                link: link.to_string(),
            })
        })
        .collect()
}
