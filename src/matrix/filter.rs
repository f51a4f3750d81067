//! Text and activity filtering of the test matrix.

use crate::model::TestDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    TestName,
    Description,
    Rule,
    Bucket,
    BucketDescription,
    TestType,
    Salt,
    All,
}

impl FilterKey {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "testName" => FilterKey::TestName,
            "description" => FilterKey::Description,
            "rule" => FilterKey::Rule,
            "bucket" => FilterKey::Bucket,
            "bucketDescription" => FilterKey::BucketDescription,
            "testType" => FilterKey::TestType,
            "salt" => FilterKey::Salt,
            "all" => FilterKey::All,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl ActiveFilter {
    pub fn from_name(name: &str) -> Self {
        match name {
            "active" => ActiveFilter::Active,
            "inactive" => ActiveFilter::Inactive,
            _ => ActiveFilter::All,
        }
    }
}

/// Lowercase, with every whitespace run collapsed to one space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.extend(c.to_lowercase());
            in_space = false;
        }
    }
    out
}

/// Searchable texts of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTexts {
    pub test_name: String,
    pub description: String,
    pub rule: String,
    pub bucket: String,
    pub bucket_description: String,
    pub test_type: String,
    pub salt: String,
    pub all: String,
}

impl SearchTexts {
    pub fn new(test_name: &str, def: &TestDefinition) -> Self {
        let rules: Vec<&str> = std::iter::once(def.rule.as_deref().unwrap_or(""))
            .chain(def.allocations.iter().map(|a| a.rule.as_deref().unwrap_or("")))
            .collect();
        let names: Vec<&str> = def.buckets.iter().map(|b| b.name.as_str()).collect();
        let descriptions: Vec<&str> = def.buckets.iter().map(|b| b.description.as_str()).collect();

        let mut texts = Self {
            test_name: normalize(test_name),
            description: normalize(def.description.as_deref().unwrap_or("")),
            rule: normalize(&rules.join(" ")),
            bucket: normalize(&names.join(" ")),
            bucket_description: normalize(&descriptions.join(" ")),
            test_type: normalize(&def.test_type),
            salt: normalize(&def.salt),
            all: String::new(),
        };
        texts.all = [
            texts.test_name.as_str(),
            &texts.description,
            &texts.rule,
            &texts.bucket,
            &texts.bucket_description,
            &texts.test_type,
            &texts.salt,
        ]
        .join(" ");
        texts
    }

    pub fn get(&self, key: FilterKey) -> &str {
        match key {
            FilterKey::TestName => &self.test_name,
            FilterKey::Description => &self.description,
            FilterKey::Rule => &self.rule,
            FilterKey::Bucket => &self.bucket,
            FilterKey::BucketDescription => &self.bucket_description,
            FilterKey::TestType => &self.test_type,
            FilterKey::Salt => &self.salt,
            FilterKey::All => &self.all,
        }
    }
}

/// Every space-separated query term must occur in the text for `key`.
pub fn matches_text(texts: &SearchTexts, query: &str, key: FilterKey) -> bool {
    let query = query.to_lowercase();
    let haystack = texts.get(key);
    query.split(' ').all(|term| haystack.contains(term))
}

pub fn matches_active(def: &TestDefinition, active: ActiveFilter) -> bool {
    match active {
        ActiveFilter::All => true,
        ActiveFilter::Active => def
            .allocations
            .iter()
            .any(|a| a.ranges.iter().all(|r| r.length < 1.0)),
        ActiveFilter::Inactive => def
            .allocations
            .iter()
            .all(|a| a.ranges.iter().any(|r| r.length == 1.0)),
    }
}
