//! The test matrix list: filtering, sorting, paging and favorites over the
//! tests of one matrix.

pub mod favorites;
pub mod filter;
pub mod pager;
pub mod sorter;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::TestDefinition;

pub use favorites::Favorites;
pub use filter::{normalize, ActiveFilter, FilterKey, SearchTexts};
pub use pager::Pager;
pub use sorter::{SortKey, SortOption, SORT_OPTIONS};

/// `{"tests": {name: definition}}` as served by the matrix endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestMatrix {
    #[serde(default)]
    pub tests: BTreeMap<String, TestDefinition>,
}

#[derive(Debug, Clone)]
pub struct MatrixEntry {
    pub name: String,
    pub definition: TestDefinition,
    /// Last update as rendered by the server; compared as text.
    pub updated: String,
    texts: SearchTexts,
    excluded: bool,
}

impl MatrixEntry {
    pub fn new(name: &str, definition: TestDefinition, updated: &str) -> Self {
        let texts = SearchTexts::new(name, &definition);
        Self { name: name.to_string(), definition, updated: updated.to_string(), texts, excluded: false }
    }

    pub fn texts(&self) -> &SearchTexts {
        &self.texts
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }
}

#[derive(Debug, Clone)]
pub struct MatrixList {
    entries: Vec<MatrixEntry>,
    favorites: Favorites,
    pager: Pager,
    matched: usize,
}

impl MatrixList {
    pub fn new(entries: Vec<MatrixEntry>, per_page: usize, favorites: Favorites) -> Self {
        let matched = entries.len();
        Self { entries, favorites, pager: Pager::new(per_page), matched }
    }

    /// Entries in matrix order. `updated` comes from the caller since the
    /// matrix itself doesn't carry it.
    pub fn from_matrix(matrix: TestMatrix, updated: &BTreeMap<String, String>, per_page: usize, favorites: Favorites) -> Self {
        let entries = matrix
            .tests
            .into_iter()
            .map(|(name, def)| {
                let up = updated.get(&name).map(String::as_str).unwrap_or("");
                MatrixEntry::new(&name, def, up)
            })
            .collect();
        Self::new(entries, per_page, favorites)
    }

    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn favorites_mut(&mut self) -> &mut Favorites {
        &mut self.favorites
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn num_all(&self) -> usize {
        self.entries.len()
    }

    pub fn num_matched(&self) -> usize {
        self.matched
    }

    /// Recompute exclusion and go back to the first page. Returns the
    /// number of matched tests.
    pub fn filter(&mut self, query: &str, key: FilterKey, active: ActiveFilter) -> usize {
        let mut matched = 0;
        for entry in self.entries.iter_mut() {
            let hit = filter::matches_text(&entry.texts, query, key) && filter::matches_active(&entry.definition, active);
            entry.excluded = !hit;
            if hit {
                matched += 1;
            }
        }
        self.matched = matched;
        log(
            Level::Debug,
            Domain::Editor,
            "matrix_filtered",
            obj(&[("query", v_str(query)), ("matched", matched.into())]),
        );
        self.pager.set_page(0, matched);
        matched
    }

    /// Reorder by one of [`SORT_OPTIONS`] and go back to the first page.
    pub fn sort(&mut self, option: &SortOption) {
        self.entries
            .sort_by(|a, b| option.compare((a.name.as_str(), a.updated.as_str()), (b.name.as_str(), b.updated.as_str())));
        self.pager.set_page(0, self.matched);
    }

    pub fn set_page(&mut self, page: i64) -> usize {
        self.pager.set_page(page, self.matched)
    }

    /// Follow a URL fragment such as `#3`.
    pub fn set_page_from_fragment(&mut self, fragment: &str) -> usize {
        let current = self.pager.current();
        let page = self.pager.page_from_fragment(fragment, current, self.matched);
        self.pager.set_page(page as i64, self.matched)
    }

    /// Non-excluded entries on the current page.
    pub fn visible(&self) -> Vec<&MatrixEntry> {
        let page = self.pager.current();
        self.entries
            .iter()
            .filter(|e| !e.excluded)
            .enumerate()
            .filter(|(i, _)| self.pager.in_page(*i, page))
            .map(|(_, e)| e)
            .collect()
    }

    pub fn toggle_favorite(&mut self, test_name: &str) -> bool {
        self.favorites.toggle(test_name)
    }
}
