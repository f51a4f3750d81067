//! Paging over the tests left after filtering. Pages are 0-based internally
//! and 1-based in the URL fragment.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    per_page: usize,
    current: usize,
}

impl Pager {
    pub fn new(per_page: usize) -> Self {
        Self { per_page: per_page.max(1), current: 0 }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self, matched: usize) -> usize {
        matched.div_ceil(self.per_page)
    }

    /// Clamp into `[0, page_count - 1]`, or 0 when nothing matched.
    pub fn adjust_page(&self, page: i64, matched: usize) -> usize {
        let last = self.page_count(matched) as i64 - 1;
        page.min(last).max(0) as usize
    }

    pub fn in_page(&self, i: usize, page: usize) -> bool {
        self.per_page * page <= i && i < self.per_page * (page + 1)
    }

    /// `#3` is page index 2. Anything non-numeric yields `default`.
    pub fn page_from_fragment(&self, fragment: &str, default: usize, matched: usize) -> usize {
        let hash = fragment.strip_prefix('#').unwrap_or(fragment).trim();
        let page = match hash.parse::<f64>() {
            Ok(n) if !hash.is_empty() && n.is_finite() => n as i64 - 1,
            _ => default as i64,
        };
        self.adjust_page(page, matched)
    }

    pub fn fragment_for(&self, page: usize) -> String {
        format!("#{}", page + 1)
    }

    pub fn set_page(&mut self, page: i64, matched: usize) -> usize {
        self.current = self.adjust_page(page, matched);
        self.current
    }

    pub fn next(&mut self, matched: usize) -> usize {
        self.set_page(self.current as i64 + 1, matched)
    }

    pub fn prev(&mut self, matched: usize) -> usize {
        self.set_page(self.current as i64 - 1, matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_page_clamps() {
        let p = Pager::new(10);
        assert_eq!(p.page_count(25), 3);
        assert_eq!(p.adjust_page(7, 25), 2);
        assert_eq!(p.adjust_page(-3, 25), 0);
        assert_eq!(p.adjust_page(4, 0), 0);
    }

    #[test]
    fn test_in_page() {
        let p = Pager::new(10);
        assert!(p.in_page(10, 1));
        assert!(p.in_page(19, 1));
        assert!(!p.in_page(20, 1));
        assert!(!p.in_page(9, 1));
    }

    #[test]
    fn test_fragment() {
        let p = Pager::new(10);
        assert_eq!(p.page_from_fragment("#3", 0, 100), 2);
        assert_eq!(p.page_from_fragment("#abc", 1, 100), 1);
        assert_eq!(p.page_from_fragment("", 0, 100), 0);
        assert_eq!(p.page_from_fragment("#9", 0, 25), 2);
        assert_eq!(p.fragment_for(2), "#3");
    }

    #[test]
    fn test_next_prev_stay_in_range() {
        let mut p = Pager::new(5);
        assert_eq!(p.prev(12), 0);
        assert_eq!(p.next(12), 1);
        assert_eq!(p.next(12), 2);
        assert_eq!(p.next(12), 2);
    }
}
