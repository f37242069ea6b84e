//! ArangoDB HTTP API transport.
//!
//! Blocking `reqwest` client; one request per operation plus one per extra
//! cursor batch.

use std::collections::VecDeque;

use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{
    BindVars, CollectionInfo, CollectionKind, DocumentCursor, DocumentStore, QueryOptions,
    ServerVersion, ViewInfo, ViewKind,
};
use crate::connection::ConnectionConfig;
use crate::core::{Document, DriverError, Result, Value};

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic { user: String, password: String },
    Bearer(String),
}

#[derive(Debug, Clone)]
struct Transport {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl Transport {
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => request,
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorize(request).send()?;
        let status = response.status();
        let body = response.text()?;
        decode_response(status, &body)
    }

    /// `{base}/_db/{database}/{path..}` with every segment percent-encoded.
    fn db_url(&self, database: &str, path: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            DriverError::ConfigurationError(format!("invalid endpoint '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                DriverError::ConfigurationError(format!(
                    "endpoint '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("_db")
            .push(database)
            .extend(path);
        Ok(url)
    }
}

/// Read every remaining document of `cursor`, then release it. The cursor is
/// released on failure too.
fn drain_and_release(mut cursor: Box<dyn DocumentCursor>) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let drained = loop {
        match cursor.next_document() {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    let released = cursor.close();
    drained?;
    released?;
    Ok(documents)
}

/// Turn a status and body into the expected payload or a driver error.
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DriverError::ConnectivityError(format!(
            "authentication rejected ({})",
            status
        )));
    }

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => DriverError::QueryError(format!(
                "{} (error {}, HTTP {})",
                err.error_message,
                err.error_num,
                status.as_u16()
            )),
            Err(_) => DriverError::QueryError(format!("HTTP {}: {}", status.as_u16(), body)),
        });
    }

    Ok(serde_json::from_str(body)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorRequest<'a> {
    query: &'a str,
    bind_vars: &'a BindVars,
    count: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorResponse {
    #[serde(default)]
    result: Vec<JsonValue>,
    #[serde(default)]
    has_more: bool,
    id: Option<String>,
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_message: String,
    #[serde(default)]
    error_num: i64,
}

#[derive(Debug, Deserialize)]
struct ResultList<T> {
    result: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionEntry {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    is_system: bool,
}

impl From<CollectionEntry> for CollectionInfo {
    fn from(entry: CollectionEntry) -> Self {
        // 3 is an edge collection, 2 a document collection
        let kind = if entry.kind == 3 {
            CollectionKind::Edge
        } else {
            CollectionKind::Document
        };
        Self {
            name: entry.name,
            kind,
            is_system: entry.is_system,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ViewEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<ViewEntry> for ViewInfo {
    fn from(entry: ViewEntry) -> Self {
        let kind = match entry.kind.as_str() {
            "search-alias" => ViewKind::SearchAlias,
            _ => ViewKind::ArangoSearch,
        };
        Self {
            name: entry.name,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    server: String,
    version: String,
    #[serde(default)]
    license: String,
}

/// Document store reached over the ArangoDB HTTP API.
#[derive(Debug)]
pub struct HttpStore {
    transport: Transport,
}

impl HttpStore {
    /// Build the HTTP client from `config`. Nothing is sent until the first call.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(max) = config.max_connections {
            builder = builder.pool_max_idle_per_host(max);
        }
        if let Some(ttl) = config.connection_ttl {
            builder = builder.pool_idle_timeout(ttl);
        }
        if let Some(interval) = config.keep_alive_interval {
            builder = builder.tcp_keepalive(interval);
        }
        if config.use_ssl && !config.verify_host {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| DriverError::ConfigurationError(format!("HTTP client: {}", e)))?;

        let auth = match (&config.jwt, &config.user) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(user)) => Auth::Basic {
                user: user.clone(),
                password: config.password.clone().unwrap_or_default(),
            },
            (None, None) => Auth::None,
        };

        debug!("HTTP store for {}", config.endpoint());
        Ok(Self {
            transport: Transport {
                client,
                base_url: config.endpoint(),
                auth,
            },
        })
    }
}

impl DocumentStore for HttpStore {
    fn query(
        &self,
        database: &str,
        query: &str,
        bind_vars: &BindVars,
        options: &QueryOptions,
    ) -> Result<Box<dyn DocumentCursor>> {
        debug!("POST cursor on '{}': {}", database, query);
        let request = CursorRequest {
            query,
            bind_vars,
            count: options.count,
            batch_size: options.batch_size,
        };
        let t = &self.transport;
        let response: CursorResponse =
            t.send(t.client.post(t.db_url(database, &["_api", "cursor"])?).json(&request))?;

        Ok(Box::new(HttpCursor::new(t.clone(), database, response)))
    }

    fn sample_documents(
        &self,
        database: &str,
        collection: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let mut bind_vars = BindVars::new();
        bind_vars.insert("@collection".into(), JsonValue::from(collection));
        let query = match limit {
            Some(n) => {
                bind_vars.insert("limit".into(), JsonValue::from(n as u64));
                "FOR doc IN @@collection LIMIT @limit RETURN doc"
            }
            None => "FOR doc IN @@collection RETURN doc",
        };

        let cursor = self.query(database, query, &bind_vars, &QueryOptions::default())?;
        drain_and_release(cursor)
    }

    fn collections(&self, database: &str) -> Result<Vec<CollectionInfo>> {
        let t = &self.transport;
        let list: ResultList<CollectionEntry> =
            t.send(t.client.get(t.db_url(database, &["_api", "collection"])?))?;
        Ok(list.result.into_iter().map(CollectionInfo::from).collect())
    }

    fn views(&self, database: &str) -> Result<Vec<ViewInfo>> {
        let t = &self.transport;
        let list: ResultList<ViewEntry> =
            t.send(t.client.get(t.db_url(database, &["_api", "view"])?))?;
        Ok(list.result.into_iter().map(ViewInfo::from).collect())
    }

    fn databases(&self) -> Result<Vec<String>> {
        let t = &self.transport;
        let list: ResultList<String> =
            t.send(t.client.get(format!("{}/_api/database/user", t.base_url)))?;
        Ok(list.result)
    }

    fn version(&self) -> Result<ServerVersion> {
        let t = &self.transport;
        let v: VersionResponse = t.send(t.client.get(format!("{}/_api/version", t.base_url)))?;
        Ok(ServerVersion {
            server: v.server,
            version: v.version,
            license: v.license,
        })
    }

    fn shutdown(&self) {
        debug!("HTTP store for {} shut down", self.transport.base_url);
    }
}

/// Server-side cursor read batch by batch.
struct HttpCursor {
    transport: Transport,
    database: String,
    id: Option<String>,
    buffer: VecDeque<JsonValue>,
    has_more: bool,
    count: Option<u64>,
}

impl HttpCursor {
    fn new(transport: Transport, database: &str, first: CursorResponse) -> Self {
        Self {
            transport,
            database: database.to_string(),
            id: first.id,
            buffer: first.result.into(),
            has_more: first.has_more,
            count: first.count,
        }
    }

    fn cursor_url(&self, id: &str) -> Result<Url> {
        self.transport
            .db_url(&self.database, &["_api", "cursor", id])
    }

    fn fetch_next_batch(&mut self) -> Result<()> {
        let id = self.id.clone().ok_or_else(|| {
            DriverError::QueryError("store reported more results without a cursor id".into())
        })?;
        debug!("PUT cursor {}", id);
        let t = &self.transport;
        let batch: CursorResponse = t.send(t.client.put(self.cursor_url(&id)?))?;
        self.buffer.extend(batch.result);
        self.has_more = batch.has_more;
        Ok(())
    }
}

impl DocumentCursor for HttpCursor {
    fn has_next(&self) -> bool {
        !self.buffer.is_empty() || self.has_more
    }

    fn next_value(&mut self) -> Result<Option<Value>> {
        while self.buffer.is_empty() && self.has_more {
            self.fetch_next_batch()?;
        }
        Ok(self.buffer.pop_front().map(Value::from))
    }

    fn count(&self) -> Option<u64> {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        if !self.has_more {
            return Ok(());
        }
        self.has_more = false;

        if let Some(id) = self.id.take() {
            debug!("DELETE cursor {}", id);
            let t = &self.transport;
            let response = t.authorize(t.client.delete(self.cursor_url(&id)?)).send()?;
            if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
                warn!("closing cursor {} returned {}", id, response.status());
            }
        }
        Ok(())
    }
}

impl Drop for HttpCursor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("releasing cursor on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VecCursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_decode_cursor_response() {
        let body = r#"{
            "result": [{"_key": "1", "name": "Alice"}, {"_key": "2", "name": "Bob"}],
            "hasMore": true,
            "id": "12345",
            "count": 5,
            "error": false,
            "code": 201
        }"#;

        let response: CursorResponse = decode_response(StatusCode::CREATED, body).unwrap();
        assert_eq!(response.result.len(), 2);
        assert!(response.has_more);
        assert_eq!(response.id.as_deref(), Some("12345"));
        assert_eq!(response.count, Some(5));

        let doc = Value::document_from_json(response.result[0].clone()).unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_key", "name"]);
    }

    #[test]
    fn test_decode_final_batch() {
        let body = r#"{"result": [], "hasMore": false, "error": false, "code": 201}"#;
        let response: CursorResponse = decode_response(StatusCode::CREATED, body).unwrap();
        assert!(response.result.is_empty());
        assert!(!response.has_more);
        assert!(response.id.is_none());
    }

    #[test]
    fn test_decode_query_error() {
        let body = r#"{"error": true, "errorMessage": "AQL: syntax error", "code": 400, "errorNum": 1501}"#;
        let err = decode_response::<CursorResponse>(StatusCode::BAD_REQUEST, body).unwrap_err();
        match err {
            DriverError::QueryError(msg) => {
                assert!(msg.contains("syntax error"));
                assert!(msg.contains("1501"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_auth_failure() {
        let err = decode_response::<CursorResponse>(StatusCode::UNAUTHORIZED, "").unwrap_err();
        assert!(matches!(err, DriverError::ConnectivityError(_)));
    }

    #[test]
    fn test_decode_non_json_error_body() {
        let err = decode_response::<CursorResponse>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, DriverError::QueryError(msg) if msg.contains("502")));
    }

    #[test]
    fn test_decode_collections_and_views() {
        let body = r#"{"result": [
            {"name": "users", "type": 2, "isSystem": false, "status": 3},
            {"name": "knows", "type": 3, "isSystem": false},
            {"name": "_graphs", "type": 2, "isSystem": true}
        ]}"#;
        let list: ResultList<CollectionEntry> = decode_response(StatusCode::OK, body).unwrap();
        let infos: Vec<CollectionInfo> = list.result.into_iter().map(CollectionInfo::from).collect();
        assert_eq!(infos[1].kind, CollectionKind::Edge);
        assert!(infos[2].is_system);

        let body = r#"{"result": [{"name": "search", "type": "search-alias", "id": "7"}]}"#;
        let list: ResultList<ViewEntry> = decode_response(StatusCode::OK, body).unwrap();
        let view = ViewInfo::from(list.result.into_iter().next().unwrap());
        assert_eq!(view.kind, ViewKind::SearchAlias);
    }

    #[test]
    fn test_client_builds_from_config() {
        let config = ConnectionConfig::new("localhost").jwt("token").use_ssl(true);
        let store = HttpStore::new(&config).unwrap();
        assert_eq!(store.transport.base_url, "https://localhost:8529");
        assert!(matches!(store.transport.auth, Auth::Bearer(_)));
    }

    #[test]
    fn test_cursor_drains_buffer_without_fetching() {
        let config = ConnectionConfig::default();
        let store = HttpStore::new(&config).unwrap();
        let first = CursorResponse {
            result: vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})],
            has_more: false,
            id: None,
            count: Some(2),
        };
        let mut cursor = HttpCursor::new(store.transport.clone(), "_system", first);

        assert_eq!(cursor.count(), Some(2));
        assert!(cursor.next_document().unwrap().is_some());
        assert!(cursor.has_next());
        assert!(cursor.next_document().unwrap().is_some());
        assert!(!cursor.has_next());
        assert!(cursor.next_document().unwrap().is_none());
        assert!(cursor.close().is_ok());
    }

    #[test]
    fn test_urls_encode_database_and_cursor_id() {
        let store = HttpStore::new(&ConnectionConfig::default()).unwrap();
        let url = store.transport.db_url("my db/x", &["_api", "cursor"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8529/_db/my%20db%2Fx/_api/cursor");

        let first = CursorResponse {
            result: Vec::new(),
            has_more: false,
            id: None,
            count: None,
        };
        let cursor = HttpCursor::new(store.transport.clone(), "shop", first);
        assert_eq!(
            cursor.cursor_url("12/34").unwrap().as_str(),
            "http://localhost:8529/_db/shop/_api/cursor/12%2F34"
        );
    }

    #[test]
    fn test_unreachable_cursor_close_is_not_retried() {
        let config = ConnectionConfig::new("127.0.0.1").port(1);
        let store = HttpStore::new(&config).unwrap();
        let first = CursorResponse {
            result: vec![serde_json::json!({"a": 1})],
            has_more: true,
            id: Some("99".into()),
            count: None,
        };
        let mut cursor = HttpCursor::new(store.transport.clone(), "_system", first);

        assert!(matches!(cursor.close(), Err(DriverError::ConnectivityError(_))));
        assert!(!cursor.has_next());
        assert!(cursor.close().is_ok());
    }

    /// Counts releases of the wrapped cursor.
    struct Tracked {
        inner: VecCursor,
        closes: Arc<AtomicUsize>,
    }

    impl DocumentCursor for Tracked {
        fn has_next(&self) -> bool {
            self.inner.has_next()
        }

        fn next_value(&mut self) -> Result<Option<Value>> {
            self.inner.next_value()
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()
        }
    }

    #[test]
    fn test_drain_releases_cursor_on_bad_row() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cursor = Tracked {
            inner: VecCursor::from_values(vec![
                Value::from(serde_json::json!({"a": 1})),
                Value::Integer(2),
            ]),
            closes: closes.clone(),
        };

        let result = drain_and_release(Box::new(cursor));
        assert!(matches!(result, Err(DriverError::QueryError(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain_reads_all_documents() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cursor = Tracked {
            inner: VecCursor::from_values(vec![
                Value::from(serde_json::json!({"a": 1})),
                Value::from(serde_json::json!({"a": 2})),
            ]),
            closes: closes.clone(),
        };

        assert_eq!(drain_and_release(Box::new(cursor)).unwrap().len(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
