//! Favorite tests, persisted in a cookie.

pub const COOKIE_NAME: &str = "FavoriteTests";
pub const COOKIE_SEPARATOR: char = ',';
/// One year, in seconds.
pub const COOKIE_MAX_AGE: u64 = 31_536_000;

/// Most recently added first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    tests: Vec<String>,
}

impl Favorites {
    pub fn from_cookie(value: &str) -> Self {
        let mut favorites = Self::default();
        favorites.refresh(value);
        favorites
    }

    /// Reload from the cookie value. An empty value means no favorites.
    pub fn refresh(&mut self, value: &str) {
        self.tests = if value.is_empty() {
            Vec::new()
        } else {
            value.split(COOKIE_SEPARATOR).map(str::to_string).collect()
        };
    }

    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    pub fn contains(&self, test_name: &str) -> bool {
        self.tests.iter().any(|t| t == test_name)
    }

    /// Returns whether the test is a favorite afterwards.
    pub fn toggle(&mut self, test_name: &str) -> bool {
        match self.tests.iter().position(|t| t == test_name) {
            Some(i) => {
                self.tests.remove(i);
                false
            }
            None => {
                self.tests.insert(0, test_name.to_string());
                true
            }
        }
    }

    /// Higher for more recently added favorites, 0 for everything else.
    pub fn rank_of(&self, test_name: &str) -> usize {
        match self.tests.iter().position(|t| t == test_name) {
            Some(i) => self.tests.len() - i,
            None => 0,
        }
    }

    pub fn cookie_value(&self) -> String {
        self.tests.join(&COOKIE_SEPARATOR.to_string())
    }

    /// `Set-Cookie` header value.
    pub fn cookie_header(&self) -> String {
        format!("{}={}; Max-Age={}; Path=/", COOKIE_NAME, self.cookie_value(), COOKIE_MAX_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_prepends_and_removes() {
        let mut fav = Favorites::from_cookie("a,b");
        assert!(fav.toggle("c"));
        assert_eq!(fav.tests(), &["c", "a", "b"]);
        assert!(!fav.toggle("a"));
        assert_eq!(fav.cookie_value(), "c,b");
    }

    #[test]
    fn test_rank_of() {
        let fav = Favorites::from_cookie("x,y,z");
        assert_eq!(fav.rank_of("x"), 3);
        assert_eq!(fav.rank_of("z"), 1);
        assert_eq!(fav.rank_of("missing"), 0);
    }

    #[test]
    fn test_empty_cookie() {
        let mut fav = Favorites::from_cookie("a");
        fav.refresh("");
        assert!(fav.tests().is_empty());
        assert_eq!(fav.cookie_header(), "FavoriteTests=; Max-Age=31536000; Path=/");
    }
}
