//! Resource router tests: URI dispatch, metadata shapes and cache behavior.

mod common;

use common::{config_with, names, read_only_config, rows, text, MockConnector, Reply};
use serde_json::json;
use sqlserver_mcp_server::database::SqlValue;
use sqlserver_mcp_server::error::ServerError;
use sqlserver_mcp_server::resources::ResourceRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LIST_TABLES: &[&str] = &["INFORMATION_SCHEMA.TABLES", "object_name"];
const LIST_VIEWS: &[&str] = &["INFORMATION_SCHEMA.VIEWS", "object_name"];
const LIST_PROCEDURES: &[&str] = &["INFORMATION_SCHEMA.ROUTINES", "object_name"];
const LIST_SCHEMAS: &[&str] = &["AS schema_name"];
const SCHEMA_SUMMARY: &[&str] = &["schema_count"];
const COLUMNS: &[&str] = &["INFORMATION_SCHEMA.COLUMNS"];
const PRIMARY_KEY: &[&str] = &["KEY_COLUMN_USAGE"];
const FOREIGN_KEYS: &[&str] = &["sys.foreign_keys"];
const ROW_COUNT: &[&str] = &["sys.partitions"];
const PROCEDURE_EXISTS: &[&str] = &["match_count"];
const PARAMETERS: &[&str] = &["INFORMATION_SCHEMA.PARAMETERS"];
const DEFINITION: &[&str] = &["sys.sql_modules"];

fn router(mock: &MockConnector) -> ResourceRouter {
    ResourceRouter::new(mock.as_connector(), &read_only_config())
}

fn user_columns() -> sqlserver_mcp_server::database::RowSet {
    rows(
        &[
            "column_name",
            "ordinal_position",
            "data_type",
            "max_length",
            "numeric_precision",
            "numeric_scale",
            "is_nullable",
            "default_value",
        ],
        vec![
            vec![
                text("Id"),
                SqlValue::Int(1),
                text("int"),
                SqlValue::Null,
                SqlValue::Int(10),
                SqlValue::Int(0),
                text("NO"),
                SqlValue::Null,
            ],
            vec![
                text("Email"),
                SqlValue::Int(2),
                text("nvarchar"),
                SqlValue::Int(255),
                SqlValue::Null,
                SqlValue::Null,
                text("YES"),
                text("('')"),
            ],
        ],
    )
}

mod caching {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_table_list_cached_for_ttl() {
        let mock = MockConnector::new();
        mock.on_rows(LIST_TABLES, names("object_name", &["Orders", "Users"]));
        let router = router(&mock);
        let cancel = CancellationToken::new();
        let uri = "sqlserver://schemas/dbo/tables";

        let first = router.read(uri, &cancel).await.unwrap();
        assert_eq!(
            first,
            json!({ "schema": "dbo", "count": 2, "tables": ["Orders", "Users"] })
        );
        assert_eq!(mock.count(LIST_TABLES), 1);

        // The catalog changes, but the cached list is still served.
        mock.on_rows(LIST_TABLES, names("object_name", &["Orders", "Users", "Audit"]));
        tokio::time::advance(Duration::from_secs(5 * 60)).await;

        let second = router.read(uri, &cancel).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(mock.count(LIST_TABLES), 1);

        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;

        let third = router.read(uri, &cancel).await.unwrap();
        assert_eq!(third["count"], json!(3));
        assert_eq!(mock.count(LIST_TABLES), 2);

        let stats = router.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.populations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_ttl_applies() {
        let mock = MockConnector::new();
        mock.on_rows(LIST_VIEWS, names("object_name", &["ActiveUsers"]));
        let config = config_with(&[("MSSQL_CACHE_TTL", "30")]);
        let router = ResourceRouter::new(mock.as_connector(), &config);
        let cancel = CancellationToken::new();

        router.read("sqlserver://schemas/dbo/views", &cancel).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        router.read("sqlserver://schemas/dbo/views", &cancel).await.unwrap();

        assert_eq!(mock.count(LIST_VIEWS), 2);
    }

    #[tokio::test]
    async fn test_definitions_are_never_cached() {
        let mock = MockConnector::new();
        mock.on_rows(
            DEFINITION,
            names("definition", &["CREATE VIEW dbo.ActiveUsers AS SELECT 1 AS x"]),
        );
        let router = router(&mock);
        let cancel = CancellationToken::new();
        let uri = "sqlserver://schemas/dbo/views/ActiveUsers/definition";

        let first = router.read(uri, &cancel).await.unwrap();
        let second = router.read(uri, &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first["definition"],
            json!("CREATE VIEW dbo.ActiveUsers AS SELECT 1 AS x")
        );
        assert_eq!(mock.count(DEFINITION), 2);
        assert_eq!(router.cache_stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_failed_population_is_not_cached() {
        let mock = MockConnector::new();
        mock.on(
            LIST_PROCEDURES,
            Reply::ConnectivityError("network unreachable".into()),
        );
        let router = router(&mock);
        let cancel = CancellationToken::new();
        let uri = "sqlserver://schemas/dbo/procedures";

        let err = router.read(uri, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("network unreachable"));

        mock.on_rows(LIST_PROCEDURES, names("object_name", &["GetUser"]));
        let value = router.read(uri, &cancel).await.unwrap();

        assert_eq!(value["procedures"], json!(["GetUser"]));
        assert_eq!(mock.count(LIST_PROCEDURES), 2);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_cached() {
        let mock = MockConnector::new();
        let router = router(&mock);
        let cancel = CancellationToken::new();
        let uri = "sqlserver://schemas/dbo/tables/Ghost";

        let err = router.read(uri, &cancel).await.unwrap_err();
        assert!(matches!(err, ServerError::ResourceNotFound { .. }));
        assert_eq!(err.to_string(), "Table not found: dbo.Ghost");

        mock.on_rows(COLUMNS, user_columns());
        let value = router.read(uri, &cancel).await.unwrap();
        assert_eq!(value["name"], json!("Ghost"));
        assert_eq!(mock.count(COLUMNS), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_population() {
        let mock = MockConnector::new();
        mock.set_delay(Duration::from_millis(500));
        mock.on_rows(LIST_TABLES, names("object_name", &["Users"]));
        let router = router(&mock);
        let cancel = CancellationToken::new();

        let reads = (0..8).map(|_| router.read("sqlserver://schemas/dbo/tables", &cancel));
        let results = futures_util::future::join_all(reads).await;

        for result in results {
            assert_eq!(result.unwrap()["tables"], json!(["Users"]));
        }
        assert_eq!(mock.count(LIST_TABLES), 1);
        assert_eq!(mock.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_table_and_view_with_same_name_do_not_collide() {
        let mock = MockConnector::new();
        mock.on_rows(COLUMNS, user_columns());
        let router = router(&mock);
        let cancel = CancellationToken::new();

        let table = router
            .read("sqlserver://schemas/dbo/tables/Users", &cancel)
            .await
            .unwrap();
        let view = router
            .read("sqlserver://schemas/dbo/views/Users", &cancel)
            .await
            .unwrap();

        assert!(table.get("primaryKey").is_some());
        assert!(view.get("primaryKey").is_none());
        assert_eq!(mock.count(COLUMNS), 2);
        assert_eq!(router.cache_stats().entry_count, 2);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let mock = MockConnector::new();
        mock.on_rows(LIST_SCHEMAS, names("schema_name", &["dbo"]));
        let router = router(&mock);
        let cancel = CancellationToken::new();

        router.read("sqlserver://schemas", &cancel).await.unwrap();
        router.clear_cache();
        router.read("sqlserver://schemas", &cancel).await.unwrap();

        assert_eq!(mock.count(LIST_SCHEMAS), 2);
    }
}

mod payloads {
    use super::*;

    #[tokio::test]
    async fn test_schema_list() {
        let mock = MockConnector::new();
        mock.on_rows(LIST_SCHEMAS, names("schema_name", &["dbo", "sales"]));
        let router = router(&mock);

        let value = router
            .read("sqlserver://schemas", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(value, json!({ "count": 2, "schemas": ["dbo", "sales"] }));
    }

    #[tokio::test]
    async fn test_schema_summary() {
        let mock = MockConnector::new();
        mock.on_rows(
            SCHEMA_SUMMARY,
            rows(
                &["schema_count", "table_count", "view_count", "procedure_count"],
                vec![vec![
                    SqlValue::Int(1),
                    SqlValue::Int(4),
                    SqlValue::Int(2),
                    SqlValue::Int(7),
                ]],
            ),
        );
        let router = router(&mock);

        let value = router
            .read("sqlserver://schemas/sales", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            value,
            json!({ "schema": "sales", "tableCount": 4, "viewCount": 2, "procedureCount": 7 })
        );
        let issued = mock.issued();
        assert_eq!(issued[0].params, vec![text("sales")]);
    }

    #[tokio::test]
    async fn test_unknown_schema_summary_is_not_found() {
        let mock = MockConnector::new();
        mock.on_rows(
            SCHEMA_SUMMARY,
            rows(
                &["schema_count", "table_count", "view_count", "procedure_count"],
                vec![vec![
                    SqlValue::Int(0),
                    SqlValue::Int(0),
                    SqlValue::Int(0),
                    SqlValue::Int(0),
                ]],
            ),
        );
        let router = router(&mock);

        let err = router
            .read("sqlserver://schemas/nope", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Schema not found: nope");
    }

    #[tokio::test]
    async fn test_table_descriptor() {
        let mock = MockConnector::new();
        mock.on_rows(COLUMNS, user_columns());
        mock.on_rows(PRIMARY_KEY, names("column_name", &["Id"]));
        mock.on_rows(
            FOREIGN_KEYS,
            rows(
                &[
                    "constraint_name",
                    "column_name",
                    "referenced_schema",
                    "referenced_table",
                    "referenced_column",
                ],
                vec![vec![
                    text("FK_Users_Org"),
                    text("OrgId"),
                    text("dbo"),
                    text("Orgs"),
                    text("Id"),
                ]],
            ),
        );
        mock.on_rows(
            ROW_COUNT,
            rows(&["row_count"], vec![vec![SqlValue::Int(1234)]]),
        );
        let router = router(&mock);

        let value = router
            .read("sqlserver://schemas/dbo/tables/Users", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(value["schema"], json!("dbo"));
        assert_eq!(value["name"], json!("Users"));
        assert_eq!(value["rowCount"], json!(1234));
        assert_eq!(value["primaryKey"], json!(["Id"]));
        assert_eq!(
            value["columns"][0],
            json!({
                "name": "Id",
                "ordinalPosition": 1,
                "dataType": "int",
                "maxLength": null,
                "numericPrecision": 10,
                "numericScale": 0,
                "isNullable": false,
                "defaultValue": null
            })
        );
        assert_eq!(value["columns"][1]["isNullable"], json!(true));
        assert_eq!(value["columns"][1]["maxLength"], json!(255));
        assert_eq!(
            value["foreignKeys"][0],
            json!({
                "name": "FK_Users_Org",
                "column": "OrgId",
                "referencedSchema": "dbo",
                "referencedTable": "Orgs",
                "referencedColumn": "Id"
            })
        );

        // One connection serves all four catalog queries.
        assert_eq!(mock.opens(), 1);
        assert_eq!(mock.live_connections(), 0);
        let columns_query = mock
            .issued()
            .into_iter()
            .find(|i| i.sql.contains("INFORMATION_SCHEMA.COLUMNS"))
            .unwrap();
        assert_eq!(
            columns_query.params,
            vec![text("dbo"), text("Users"), text("BASE TABLE")]
        );
    }

    #[tokio::test]
    async fn test_listed_names_are_readable_as_listed() {
        let mock = MockConnector::new();
        mock.on_rows(
            LIST_TABLES,
            names("object_name", &["Order Details", "Sales-2024"]),
        );
        mock.on_rows(COLUMNS, user_columns());
        let router = router(&mock);
        let cancel = CancellationToken::new();

        let listed = router
            .read("sqlserver://schemas/dbo/tables", &cancel)
            .await
            .unwrap();
        assert_eq!(listed["tables"], json!(["Order Details", "Sales-2024"]));

        for (uri, table) in [
            ("sqlserver://schemas/dbo/tables/Order Details", "Order Details"),
            ("sqlserver://schemas/dbo/tables/Order%20Details", "Order Details"),
            ("sqlserver://schemas/dbo/tables/Sales-2024", "Sales-2024"),
        ] {
            let value = router.read(uri, &cancel).await.unwrap();
            assert_eq!(value["name"], json!(table), "{uri}");
        }

        let bound: Vec<_> = mock
            .issued()
            .into_iter()
            .filter(|i| i.sql.contains("INFORMATION_SCHEMA.COLUMNS"))
            .map(|i| i.params)
            .collect();
        // The raw and encoded spellings share one cache entry.
        assert_eq!(
            bound,
            vec![
                vec![text("dbo"), text("Order Details"), text("BASE TABLE")],
                vec![text("dbo"), text("Sales-2024"), text("BASE TABLE")],
            ]
        );
    }

    #[tokio::test]
    async fn test_procedure_descriptor() {
        let mock = MockConnector::new();
        mock.on_rows(
            PROCEDURE_EXISTS,
            rows(&["match_count"], vec![vec![SqlValue::Int(1)]]),
        );
        mock.on_rows(
            PARAMETERS,
            rows(
                &[
                    "parameter_name",
                    "ordinal_position",
                    "parameter_mode",
                    "data_type",
                    "max_length",
                    "numeric_precision",
                    "numeric_scale",
                ],
                vec![vec![
                    text("@UserId"),
                    SqlValue::Int(1),
                    text("IN"),
                    text("int"),
                    SqlValue::Null,
                    SqlValue::Int(10),
                    SqlValue::Int(0),
                ]],
            ),
        );
        let router = router(&mock);

        let value = router
            .read(
                "sqlserver://schemas/dbo/procedures/GetUser",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(value["name"], json!("GetUser"));
        assert_eq!(value["parameters"][0]["name"], json!("@UserId"));
        assert_eq!(value["parameters"][0]["mode"], json!("IN"));
        assert_eq!(value["parameters"][0]["dataType"], json!("int"));
    }

    #[tokio::test]
    async fn test_missing_procedure_definition() {
        let mock = MockConnector::new();
        let router = router(&mock);

        let payload = router
            .read_or_error(
                "sqlserver://schemas/dbo/procedures/Nope/definition",
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            payload,
            json!({
                "uri": "sqlserver://schemas/dbo/procedures/Nope/definition",
                "message": "Procedure not found: dbo.Nope"
            })
        );
        let issued = mock.issued();
        assert_eq!(issued[0].params[2], text("P"));
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_unknown_uri_never_touches_the_database() {
        let mock = MockConnector::new();
        let router = router(&mock);
        let cancel = CancellationToken::new();

        for uri in [
            "sqlserver://schemas/dbo/functions",
            "sqlserver://schemas/dbo/tables/Users/definition",
            "sqlserver://schemas/dbo/views/V/definition/extra",
            "sqlserver://databases",
            "postgres://schemas",
            "sqlserver://schemas//tables",
            "sqlserver://schemas/dbo/tables/a%2Fb",
        ] {
            let payload = router.read_or_error(uri, &cancel).await;
            assert_eq!(payload["uri"], json!(uri));
            assert!(payload["message"].is_string(), "{uri}");
        }
        assert_eq!(mock.opens(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_read_leaves_cache_empty() {
        let mock = MockConnector::new();
        mock.on_rows(LIST_TABLES, names("object_name", &["Users"]));
        let router = Arc::new(router(&mock));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = router
            .read("sqlserver://schemas/dbo/tables", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Cancelled));
        assert_eq!(router.cache_stats().populations, 0);

        let value = router
            .read("sqlserver://schemas/dbo/tables", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(value["count"], json!(1));
        assert_eq!(router.cache_stats().populations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_catalog_times_out() {
        let mock = MockConnector::new();
        mock.set_delay(Duration::from_secs(120));
        let config = config_with(&[("MSSQL_QUERY_TIMEOUT", "5")]);
        let router = ResourceRouter::new(mock.as_connector(), &config);

        let err = router
            .read("sqlserver://schemas", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Query timed out after 5 seconds");
        assert_eq!(mock.live_connections(), 0);
    }
}
