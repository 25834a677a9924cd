use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Safe to call on every startup.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS books (
            upc         TEXT PRIMARY KEY,
            title       TEXT,
            price       REAL,
            rating      INTEGER,
            category    TEXT,
            description TEXT
        );
        ",
    )?;
    Ok(())
}

/// A fully normalized book record, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub upc: String,
    pub title: String,
    pub price: f64,
    /// 1..=5, or 0 when the source rating was missing or unrecognized.
    pub rating: u8,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Insert-or-replace by UPC. Runs in autocommit mode, so each record is its
/// own durability boundary: a crawl aborted mid-run keeps everything already
/// written.
pub fn upsert_book(conn: &Connection, book: &Book) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO books (upc, title, price, rating, category, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(rusqlite::params![
        book.upc,
        book.title,
        book.price,
        book.rating,
        book.category,
        book.description,
    ])?;
    Ok(())
}

pub fn get_book(conn: &Connection, upc: &str) -> Result<Option<Book>> {
    let book = conn
        .query_row(
            "SELECT upc, title, price, rating, category, description
             FROM books WHERE upc = ?1",
            [upc],
            |row| {
                Ok(Book {
                    upc: row.get(0)?,
                    title: row.get(1)?,
                    price: row.get(2)?,
                    rating: row.get(3)?,
                    category: row.get(4)?,
                    description: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(book)
}

pub fn count_books(conn: &Connection) -> Result<usize> {
    let n: usize = conn.query_row("SELECT COUNT(*) FROM books", [], |r| r.get(0))?;
    Ok(n)
}

// ── Listing ──

pub struct BookListRow {
    pub upc: String,
    pub title: String,
    pub price: f64,
    pub rating: u8,
    pub category: String,
}

/// Filtered scan over the finished table, the same shape downstream
/// consumers use: `rating >= min AND price <= max`.
pub fn fetch_books(
    conn: &Connection,
    min_rating: Option<u8>,
    max_price: Option<f64>,
    limit: usize,
) -> Result<Vec<BookListRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(r) = min_rating {
        conditions.push(format!("rating >= ?{}", params.len() + 1));
        params.push(Box::new(r));
    }
    if let Some(p) = max_price {
        conditions.push(format!("price <= ?{}", params.len() + 1));
        params.push(Box::new(p));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT upc, COALESCE(title,''), price, rating, COALESCE(category,'')
         FROM books{}
         ORDER BY rating DESC, price ASC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(BookListRow {
                upc: row.get(0)?,
                title: row.get(1)?,
                price: row.get(2)?,
                rating: row.get(3)?,
                category: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub categories: usize,
    pub unrated: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM books", [], |r| r.get(0))?;
    let categories: usize = conn.query_row(
        "SELECT COUNT(DISTINCT category) FROM books WHERE category IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let unrated: usize =
        conn.query_row("SELECT COUNT(*) FROM books WHERE rating = 0", [], |r| r.get(0))?;
    Ok(Stats {
        total,
        categories,
        unrated,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample(upc: &str, price: f64, rating: u8) -> Book {
        Book {
            upc: upc.to_string(),
            title: format!("Book {}", upc),
            price,
            rating,
            category: Some("Travel".to_string()),
            description: None,
        }
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(count_books(&conn).unwrap(), 0);
    }

    #[test]
    fn upsert_replaces_by_upc() {
        let conn = test_conn();
        upsert_book(&conn, &sample("a1", 10.0, 3)).unwrap();
        let mut updated = sample("a1", 12.5, 4);
        updated.description = Some("now with a blurb".to_string());
        upsert_book(&conn, &updated).unwrap();

        assert_eq!(count_books(&conn).unwrap(), 1);
        let stored = get_book(&conn, "a1").unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn missing_upc_is_none() {
        let conn = test_conn();
        assert!(get_book(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn filtered_scan_matches_consumer_shape() {
        let conn = test_conn();
        upsert_book(&conn, &sample("a1", 10.0, 5)).unwrap();
        upsert_book(&conn, &sample("a2", 55.0, 5)).unwrap();
        upsert_book(&conn, &sample("a3", 8.0, 2)).unwrap();

        let rows = fetch_books(&conn, Some(4), Some(20.0), 50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].upc, "a1");

        let all = fetch_books(&conn, None, None, 50).unwrap();
        assert_eq!(all.len(), 3);
        // rating desc, then price asc
        assert_eq!(all[0].upc, "a1");
        assert_eq!(all[1].upc, "a2");
        assert_eq!(all[2].upc, "a3");
    }

    #[test]
    fn stats_count_unrated() {
        let conn = test_conn();
        upsert_book(&conn, &sample("a1", 10.0, 0)).unwrap();
        upsert_book(&conn, &sample("a2", 10.0, 4)).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 2);
        assert_eq!(s.categories, 1);
        assert_eq!(s.unrated, 1);
    }
}
