//! Display filtering and sorting of cabinet entries.

use crate::models::{Category, IngredientEntry, TargetList};
use crate::utils::{cmp_ignore_case, contains_ignore_case};

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientFilter {
    /// Case-insensitive substring of the name; empty matches everything
    pub query: String,
    pub category: Option<Category>,
    /// Restrict to owned (`Cabinet`) or wanted (`Shopping`) entries
    pub list: Option<TargetList>,
    pub ascending: bool,
}

impl Default for IngredientFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: None,
            list: None,
            ascending: true,
        }
    }
}

impl IngredientFilter {
    pub fn for_list(list: TargetList) -> Self {
        Self {
            list: Some(list),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &IngredientEntry, query_lower: &str) -> bool {
        let on_list = match self.list {
            Some(TargetList::Cabinet) => entry.owned,
            Some(TargetList::Shopping) => entry.wanted,
            None => true,
        };
        on_list
            && self.category.map_or(true, |c| entry.category == c)
            && contains_ignore_case(&entry.name, query_lower)
    }

    /// Filter then sort alphabetically by name in the configured direction.
    pub fn apply<'a>(&self, entries: &'a [IngredientEntry]) -> Vec<&'a IngredientEntry> {
        let query = self.query.trim().to_lowercase();
        let mut visible: Vec<&IngredientEntry> =
            entries.iter().filter(|e| self.matches(e, &query)).collect();

        visible.sort_by(|a, b| {
            let cmp = cmp_ignore_case(&a.name, &b.name);
            if self.ascending {
                cmp
            } else {
                cmp.reverse()
            }
        });
        visible
    }
}
