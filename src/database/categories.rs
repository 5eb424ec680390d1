//! Keyword-based content categorization

use super::{now, Database, DatabaseError};
use rusqlite::params;
use serde_json::json;

const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("support", &["help", "question", "how", "what"]),
    ("bug-report", &["bug", "error", "issue", "problem"]),
    ("feature-request", &["feature", "suggestion", "idea"]),
];

const MAX_KEYWORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    pub content_id: i64,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
}

/// Categories and keywords for a piece of content.
///
/// Rules match substrings of the lower-cased text; keywords are the first
/// words longer than four characters.
pub fn categorize(content: &str) -> (Vec<String>, Vec<String>) {
    let lowered = content.to_lowercase();

    let categories = CATEGORY_RULES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(category, _)| category.to_string())
        .collect();

    let keywords = lowered
        .split_whitespace()
        .filter(|w| w.chars().count() > 4)
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect();

    (categories, keywords)
}

impl Database {
    /// Categorize content and store the result
    pub fn categorize_content(&self, content: &str) -> Result<Categorization, DatabaseError> {
        let (categories, keywords) = categorize(content);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO content_categories (content, categories, keywords, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                content,
                json!({ "categories": categories }).to_string(),
                serde_json::to_string(&keywords)?,
                now(),
            ],
        )?;

        Ok(Categorization {
            content_id: conn.last_insert_rowid(),
            categories,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_from_rules() {
        let (categories, _) = categorize("Hello there is a BUG in the x command, what now?");
        assert_eq!(categories, vec!["support", "bug-report"]);

        let (categories, _) = categorize("I have an idea for a new feature");
        assert_eq!(categories, vec!["feature-request"]);

        let (categories, _) = categorize("good morning");
        assert!(categories.is_empty());
    }

    #[test]
    fn test_keywords_are_long_words() {
        let (_, keywords) =
            categorize("Hello there is a bug in the command handler causing crashes sometimes");
        assert_eq!(
            keywords,
            vec!["hello", "there", "command", "handler", "causing"]
        );
    }

    #[test]
    fn test_categorization_is_stored() {
        let db = Database::open_in_memory().unwrap();
        let first = db.categorize_content("question about errors").unwrap();
        let second = db.categorize_content("nothing").unwrap();
        assert_eq!(first.categories, vec!["support", "bug-report"]);
        assert_eq!(first.keywords, vec!["question", "about", "errors"]);
        assert!(second.content_id > first.content_id);

        let conn = db.conn().unwrap();
        let stored: String = conn
            .query_row(
                "SELECT categories FROM content_categories WHERE id = ?1",
                [first.content_id],
                |row| row.get(0),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(value["categories"][1], "bug-report");
    }
}
