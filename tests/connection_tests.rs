/// Connection tests
///
/// Connection strings, properties and the close cascade from connection to
/// statements and cursors.
/// Run with: cargo test --test connection_tests
use arango_rdbc::{Connection, ConnectionConfig, DriverError, MemoryStore, SampleSize, connect};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn memory_connection() -> (Connection, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_json("_system", "users", json!({"name": "Alice"}))
        .unwrap();
    store
        .insert_json("_system", "users", json!({"name": "Bob"}))
        .unwrap();
    let conn = Connection::with_store(ConnectionConfig::default(), store.clone()).unwrap();
    (conn, store)
}

#[test]
fn test_parse_full_url() {
    let config = ConnectionConfig::from_url("arangodb://db.example:8530/shop").unwrap();
    assert_eq!(config.host, "db.example");
    assert_eq!(config.port, 8530);
    assert_eq!(config.database, "shop");
    assert_eq!(config.to_url(), "arangodb://db.example:8530/shop");
}

#[test]
fn test_url_defaults() {
    let config = ConnectionConfig::from_url("jdbc:arangodb://db.example").unwrap();
    assert_eq!(config.port, 8529);
    assert_eq!(config.database, "_system");
    assert_eq!(config.schema, "public");
    assert_eq!(config.sample_size(), SampleSize::Bounded(1000));
}

#[test]
fn test_malformed_urls() {
    for url in [
        "postgres://localhost/db",
        "arangodb://",
        "arangodb://:8529/db",
        "arangodb://host:port/db",
        "arangodb://host:99999/db",
    ] {
        assert!(
            matches!(ConnectionConfig::from_url(url), Err(DriverError::ConfigurationError(_))),
            "{} should be rejected",
            url
        );
    }
}

#[test]
fn test_properties_override_defaults() {
    let config = ConnectionConfig::from_url("arangodb://localhost/db")
        .unwrap()
        .with_properties(&props(&[
            ("user", "root"),
            ("password", "secret"),
            ("timeout", "2500"),
            ("keepAliveInterval", "30"),
            ("maxConnections", "4"),
            ("useSsl", "true"),
            ("verifyHost", "false"),
            ("schema", "sales"),
            ("jdbcMetadataSampleSize", "0"),
        ]));

    assert_eq!(config.user.as_deref(), Some("root"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
    assert_eq!(config.keep_alive_interval, Some(Duration::from_secs(30)));
    assert_eq!(config.max_connections, Some(4));
    assert!(config.use_ssl);
    assert!(!config.verify_host);
    assert_eq!(config.schema, "sales");
    assert_eq!(config.sample_size(), SampleSize::Unbounded);
    assert_eq!(config.endpoint(), "https://localhost:8529");
}

#[test]
fn test_malformed_property_keeps_default() {
    let config = ConnectionConfig::default().with_properties(&props(&[
        ("timeout", "soon"),
        ("useSsl", "maybe"),
        ("jdbcMetadataSampleSize", "lots"),
    ]));
    assert_eq!(config.timeout, None);
    assert!(!config.use_ssl);
    assert_eq!(config.metadata_sample_size, 1000);
}

#[test]
fn test_from_properties_without_url() {
    let config = ConnectionConfig::from_properties(&props(&[
        ("host", "arango.internal"),
        ("port", "9000"),
        ("databaseName", "inventory"),
    ]))
    .unwrap();
    assert_eq!(config.to_url(), "arangodb://arango.internal:9000/inventory");

    let config = ConnectionConfig::from_properties(&props(&[
        ("url", "arangodb://a:1/b"),
        ("host", "ignored"),
    ]))
    .unwrap();
    assert_eq!(config.host, "a");
}

#[test]
fn test_connect_does_not_touch_network() {
    let conn = connect("arangodb://127.0.0.1:1/inventory", &HashMap::new()).unwrap();
    assert_eq!(conn.catalog().unwrap(), "inventory");
    assert!(!conn.is_closed());
}

#[test]
fn test_connect_rejects_password_without_user() {
    let result = connect(
        "arangodb://localhost/db",
        &props(&[("password", "secret")]),
    );
    assert!(matches!(result, Err(DriverError::ConfigurationError(_))));
}

#[test]
fn test_close_cascades_to_statements_and_cursors() {
    let (mut conn, store) = memory_connection();
    let mut stmt = conn.create_statement().unwrap();
    let rs = stmt.execute_query("FOR u IN users RETURN u").unwrap();
    assert!(rs.advance().unwrap());

    conn.close().unwrap();

    assert!(rs.is_closed());
    assert!(matches!(rs.advance(), Err(DriverError::StateError(_))));
    assert!(matches!(rs.get_string("name"), Err(DriverError::StateError(_))));
    assert!(stmt.is_closed());
    assert!(matches!(
        stmt.execute_query("FOR u IN users RETURN u"),
        Err(DriverError::StateError(_))
    ));
    assert!(store.is_shut_down());
}

#[test]
fn test_closing_statement_closes_its_cursor() {
    let (conn, _) = memory_connection();
    let mut stmt = conn.create_statement().unwrap();
    stmt.execute("FOR u IN users RETURN u").unwrap();
    stmt.close().unwrap();

    assert!(!conn.is_closed());
    assert!(matches!(stmt.result_set(), Err(DriverError::StateError(_))));
    assert!(conn.create_statement().is_ok());
}

#[test]
fn test_cursor_close_is_idempotent() {
    let (conn, _) = memory_connection();
    let mut stmt = conn.create_statement().unwrap();
    let rs = stmt.execute_query("FOR u IN users RETURN u").unwrap();

    rs.close().unwrap();
    rs.close().unwrap();
    assert!(matches!(rs.advance(), Err(DriverError::StateError(_))));
    assert!(!stmt.is_closed());
}

#[test]
fn test_catalog_switch_applies_to_existing_statements() {
    let (mut conn, store) = memory_connection();
    store.create_database("shop").unwrap();
    store
        .insert_json("shop", "users", json!({"name": "Zed"}))
        .unwrap();

    let mut stmt = conn.create_statement().unwrap();
    conn.set_catalog("shop").unwrap();

    let rs = stmt.execute_query("FOR u IN users RETURN u").unwrap();
    assert!(rs.advance().unwrap());
    assert_eq!(rs.get_string("name").unwrap().as_deref(), Some("Zed"));
}

#[test]
fn test_validity_follows_store() {
    let (conn, store) = memory_connection();
    assert!(conn.is_valid());
    store.set_available(false).unwrap();
    assert!(!conn.is_valid());

    let mut stmt = conn.create_statement().unwrap();
    assert!(matches!(
        stmt.execute_query("FOR u IN users RETURN u"),
        Err(DriverError::ConnectivityError(_))
    ));
}
