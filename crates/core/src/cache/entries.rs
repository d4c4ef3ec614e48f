//! Entry-level store operations: exact lookup, last-write-wins put, and the
//! transactional batch write install uses.

use super::connection::CacheDb;
use super::generations::Generation;
use super::key::RequestKey;
use crate::Error;
use crate::model::StoredResponse;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl Generation {
    /// Exact lookup by normalized request key. No fuzzy matching.
    pub async fn lookup(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let tag = self.tag.clone();
        let digest = key.digest().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, headers_json, body FROM entries
                     WHERE generation_tag = ?1 AND request_key = ?2",
                )?;

                let result = stmt.query_row(params![tag, digest], |row| {
                    let status: u16 = row.get(0)?;
                    let headers_json: String = row.get(1)?;
                    let body: Vec<u8> = row.get(2)?;
                    Ok((status, headers_json, body))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json).unwrap_or_default();
                        Ok(Some(StoredResponse::new(status, headers, body)))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Write one entry, overwriting any existing entry for the same key.
    ///
    /// Fails with [`Error::CacheWrite`] when the row cannot be written, which
    /// includes a write racing the deletion of this generation. Callers
    /// absorb that: the response has already been delivered.
    pub async fn store(&self, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CacheWrite(e.to_string()))?;
        let tag = self.tag.clone();
        let digest = key.digest().to_string();
        let method = key.method().to_string();
        let url = key.url().to_string();
        let status = response.status;
        let body = response.body.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        generation_tag, request_key, method, url,
                        status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(generation_tag, request_key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        tag,
                        digest,
                        method,
                        url,
                        status,
                        headers_json,
                        body,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(|e| Error::CacheWrite(e.to_string()))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Write a full set of entries into a generation in one transaction,
    /// creating the generation row if needed.
    ///
    /// Either every entry lands or none does; install leans on this for its
    /// all-or-nothing guarantee.
    pub async fn put_many(
        &self, tag: &str, entries: Vec<(RequestKey, StoredResponse)>,
    ) -> Result<usize, Error> {
        let tag = tag.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut rows = Vec::with_capacity(entries.len());
        for (key, response) in &entries {
            let headers_json =
                serde_json::to_string(&response.headers).map_err(|e| Error::CacheWrite(e.to_string()))?;
            rows.push((
                key.digest().to_string(),
                key.method().to_string(),
                key.url().to_string(),
                response.status,
                headers_json,
                response.body.clone(),
            ));
        }

        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction().map_err(Error::from)?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (tag, created_at) VALUES (?1, ?2)",
                    params![tag, now],
                )?;
                for (digest, method, url, status, headers_json, body) in &rows {
                    tx.execute(
                        "INSERT INTO entries (
                            generation_tag, request_key, method, url,
                            status, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(generation_tag, request_key) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![tag, digest, method, url, status, headers_json, body, now],
                    )?;
                }
                tx.commit().map_err(Error::from)?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        let url = Url::parse("https://app.example").unwrap().join(path).unwrap();
        RequestKey::new("GET", &url)
    }

    fn response(status: u16, body: &str) -> StoredResponse {
        StoredResponse::new(
            status,
            vec![("content-type".to_string(), "text/html".to_string())],
            body.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_store_and_lookup_roundtrip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = Generation::open(&db, "app-v1").await.unwrap();

        generation.store(&key("/index.html"), &response(200, "<html>")).await.unwrap();

        let found = generation.lookup(&key("/index.html")).await.unwrap().unwrap();
        assert_eq!(found.status, 200);
        assert_eq!(found.content_type(), Some("text/html"));
        assert_eq!(found.body, b"<html>".to_vec());
    }

    #[tokio::test]
    async fn test_lookup_miss_returns_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = Generation::open(&db, "app-v1").await.unwrap();
        assert!(generation.lookup(&key("/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_is_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = Generation::open(&db, "app-v1").await.unwrap();

        generation.store(&key("/"), &response(200, "first")).await.unwrap();
        generation.store(&key("/"), &response(200, "second")).await.unwrap();

        let found = generation.lookup(&key("/")).await.unwrap().unwrap();
        assert_eq!(found.body, b"second".to_vec());
    }

    #[tokio::test]
    async fn test_store_into_deleted_generation_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = Generation::open(&db, "app-v1").await.unwrap();
        db.delete_generation("app-v1").await.unwrap();

        let result = generation.store(&key("/"), &response(200, "late write")).await;
        assert!(matches!(result, Err(Error::CacheWrite(_))));
    }

    #[tokio::test]
    async fn test_delete_generation_cascades_to_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = Generation::open(&db, "app-v1").await.unwrap();
        generation.store(&key("/"), &response(200, "root")).await.unwrap();

        db.delete_generation("app-v1").await.unwrap();

        let reopened = Generation::open(&db, "app-v1").await.unwrap();
        assert!(reopened.lookup(&key("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_many_writes_all_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (key("/"), response(200, "root")),
            (key("/index.html"), response(200, "index")),
            (key("/icon-192.png"), response(200, "png")),
        ];

        let written = db.put_many("app-v2", entries).await.unwrap();
        assert_eq!(written, 3);

        let generation = Generation::open(&db, "app-v2").await.unwrap();
        for path in ["/", "/index.html", "/icon-192.png"] {
            assert!(generation.lookup(&key(path)).await.unwrap().is_some(), "missing {path}");
        }
    }

    #[tokio::test]
    async fn test_put_many_creates_generation_row() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_many("app-v3", vec![(key("/"), response(200, "root"))]).await.unwrap();
        assert!(db.list_generations().await.unwrap().contains(&"app-v3".to_string()));
    }
}
