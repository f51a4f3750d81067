use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    TestName,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub name: &'static str,
    pub key: SortKey,
    pub descending: bool,
}

pub const SORT_OPTIONS: [SortOption; 2] = [
    SortOption { name: "test name", key: SortKey::TestName, descending: false },
    SortOption { name: "updated date", key: SortKey::Updated, descending: true },
];

impl SortOption {
    pub fn by_index(index: usize) -> Option<&'static SortOption> {
        SORT_OPTIONS.get(index)
    }

    /// Compare `(name, updated)` pairs. Equal keys keep their order under a
    /// stable sort.
    pub fn compare(&self, a: (&str, &str), b: (&str, &str)) -> Ordering {
        let ord = match self.key {
            SortKey::TestName => a.0.cmp(b.0),
            SortKey::Updated => a.1.cmp(b.1),
        };
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_table() {
        assert_eq!(SortOption::by_index(0).unwrap().name, "test name");
        assert!(SortOption::by_index(1).unwrap().descending);
        assert!(SortOption::by_index(2).is_none());
    }

    #[test]
    fn test_updated_sorts_newest_first() {
        let mut rows = vec![("a", "2024-01-01"), ("b", "2024-03-01"), ("c", "2024-02-01")];
        let opt = SORT_OPTIONS[1];
        rows.sort_by(|x, y| opt.compare(*x, *y));
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }
}
