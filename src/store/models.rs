use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Row written into the staging table for one bestseller entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExploreBook {
    pub catalog_id: Option<String>,
    pub title: String,
    pub author: String,
    pub book_image: Option<String>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub list_name: String,
    pub list_name_encoded: String,
    pub rank: i32,
    pub created_at: DateTime<Utc>,
}

/// Row as served from the live table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ExploreBookRecord {
    pub id: i32,
    #[sqlx(rename = "google_books_id")]
    #[serde(rename = "google_books_id")]
    pub catalog_id: Option<String>,
    pub title: String,
    pub author: String,
    pub book_image: Option<String>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub list_name: String,
    pub list_name_encoded: String,
    pub rank: i32,
    /// UTC wall-clock time; the column is a plain `TIMESTAMP`.
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ListSummary {
    pub list_name: String,
    pub list_name_encoded: String,
}

/// Books of one list, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGroup {
    pub list_name: String,
    pub list_name_encoded: String,
    pub books: Vec<ExploreBookRecord>,
}

/// Groups rows already ordered by list name into per-list buckets.
#[must_use]
pub fn group_by_list(records: Vec<ExploreBookRecord>) -> Vec<ListGroup> {
    let mut groups: Vec<ListGroup> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(group) if group.list_name == record.list_name => group.books.push(record),
            _ => groups.push(ListGroup {
                list_name: record.list_name.clone(),
                list_name_encoded: record.list_name_encoded.clone(),
                books: vec![record],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i32, list: &str, rank: i32) -> ExploreBookRecord {
        ExploreBookRecord {
            id,
            catalog_id: Some(format!("cat-{id}")),
            title: format!("Title {id}"),
            author: "Author".to_string(),
            book_image: None,
            isbn_13: None,
            isbn_10: None,
            list_name: list.to_string(),
            list_name_encoded: list.to_lowercase().replace(' ', "-"),
            rank,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn groups_consecutive_rows_by_list() {
        let groups = group_by_list(vec![
            record(1, "Audio Fiction", 1),
            record(2, "Audio Fiction", 2),
            record(3, "Hardcover Fiction", 1),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].list_name_encoded, "audio-fiction");
        assert_eq!(groups[0].books.len(), 2);
        assert_eq!(groups[1].books[0].id, 3);
    }

    #[test]
    fn record_serializes_with_live_table_column_names() {
        let json = serde_json::to_value(record(7, "Audio Fiction", 1)).expect("serialize");
        assert_eq!(json["google_books_id"], "cat-7");
        assert!(json.get("catalog_id").is_none());
    }
}
