//! List-view helpers: recency order, name search and pagination.
//!
//! Lists are small enough to load whole, so filtering happens in memory
//! after the collection is read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::{Client, Invoice, Product};

/// Minimum fuzzy score for a non-substring match.
const MIN_FUZZY_SCORE: f64 = 0.85;

/// Default page size of list views.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Records that carry a creation time.
pub trait Recency {
    /// `None` for legacy records without a timestamp
    fn created(&self) -> Option<DateTime<Utc>>;
}

impl Recency for Client {
    fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Recency for Product {
    fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Recency for Invoice {
    fn created(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

/// Newest first; records without a timestamp go last in their stored order.
pub fn sort_by_recency<T: Recency>(items: &mut [T]) {
    items.sort_by(|a, b| match (a.created(), b.created()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Records the search box can match.
pub trait Searchable {
    fn search_text(&self) -> String;
}

impl Searchable for Client {
    fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.full_name(), self.national_id);
        if let Some(email) = &self.email {
            text.push(' ');
            text.push_str(email);
        }
        text
    }
}

impl Searchable for Product {
    fn search_text(&self) -> String {
        let mut text = self.name.clone();
        if let Some(brand) = &self.brand {
            text.push(' ');
            text.push_str(brand);
        }
        if let Some(internal_id) = self.internal_id {
            text.push_str(&format!(" {}", internal_id));
        }
        text
    }
}

/// Lowercase and strip the accents common in Spanish names.
fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Similarity of two words.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}

/// Score of `text` against an already folded query; 0.0 means no match.
fn match_score(query: &str, text: &str) -> f64 {
    let text = fold(text);
    if text.contains(query) {
        return 1.0;
    }

    // Every query word must resemble some word of the text
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut total = 0.0;
    let mut count = 0usize;
    for term in query.split_whitespace() {
        let best = words
            .iter()
            .map(|word| fuzzy_match(term, word))
            .fold(0.0_f64, f64::max);
        if best < MIN_FUZZY_SCORE {
            return 0.0;
        }
        total += best;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Items matching `query`, best match first. A blank query keeps everything
/// in its current order.
pub fn search<T: Searchable>(items: Vec<T>, query: &str) -> Vec<T> {
    let query = fold(query.trim());
    if query.is_empty() {
        return items;
    }

    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .filter_map(|item| {
            let score = match_score(&query, &item.search_text());
            (score > 0.0).then_some((score, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}

/// One page of a list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Cut `items` into pages of `per_page` and return the requested one.
/// Out-of-range pages are clamped to the last page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = if per_page == 0 { DEFAULT_PAGE_SIZE } else { per_page };
    let total = items.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}
