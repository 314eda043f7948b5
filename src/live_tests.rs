use chrono::{Datelike, NaiveDate, Timelike};
use jwt_simple::algorithms::RS256KeyPair;

use crate::{
    Cell, ClientConfig, Credentials, Record, Shape, SnowflakeClient, SnowflakeError,
    SnowflakeResult, ValueKind,
};

fn default_client() -> SnowflakeClient {
    let _ = env_logger::try_init();
    let require = |name: &str| std::env::var(name).expect(&format!("{} not set", name));
    let credentials = match std::env::var("SNOWFLAKE_TRADITIONAL_RSA_KEY_PATH") {
        Ok(key_path) => {
            let key_content = std::fs::read_to_string(key_path).expect("failed to read key file");
            Credentials::KeyPair(RS256KeyPair::from_pem(&key_content).expect("failed to parse key"))
        }
        Err(_) => Credentials::Password(require("SNOWFLAKE_PASSWORD")),
    };
    let config = ClientConfig::new(
        &require("SNOWFLAKE_ACCOUNT"),
        &require("SNOWFLAKE_USER"),
        credentials,
    )
    .with_database(&require("SNOWFLAKE_DATABASE"))
    .with_warehouse(&require("SNOWFLAKE_WAREHOUSE"))
    .with_role(&require("SNOWFLAKE_ROLE"));
    SnowflakeClient::new(config).expect("invalid live test configuration")
}

#[tokio::test]
async fn can_login() -> SnowflakeResult<()> {
    let client = default_client();
    let info = client.init_session().await?;
    assert!(info.warehouse.is_some());
    assert_eq!(client.execute_scalar("SELECT 1", &()).await?, Some("1".into()));
    client.renew_session().await?;
    assert_eq!(client.execute_scalar("SELECT 2", &()).await?, Some("2".into()));
    client.close_session().await?;
    assert!(!client.is_active().await);
    Ok(())
}

#[tokio::test]
async fn can_query_many_types() -> SnowflakeResult<()> {
    let client = default_client();
    let shape = Shape::new()
        .positional(ValueKind::Integer)
        .positional(ValueKind::Text)
        .positional(ValueKind::Float)
        .positional(ValueKind::Boolean)
        .nullable_positional(ValueKind::Text)
        .positional(ValueKind::Binary)
        .positional(ValueKind::Timestamp)
        .positional(ValueKind::Timestamp)
        .positional(ValueKind::Timestamp)
        .positional(ValueKind::Date)
        .positional(ValueKind::Time)
        .positional(ValueKind::Json);
    let rows = client
        .execute_query_as(
            "SELECT 1,
            'foo',
            1.1,
            true,
            NULL,
            '666f6f'::binary,
            '2023-01-01 01:01:01'::timestamp_ntz,
            '2023-01-01 01:01:01'::timestamp_ltz,
            '2023-01-01 01:01:01 +02:00'::timestamp_tz,
            '2023-01-01'::date,
            '01:01:01'::time,
            parse_json('{\"a\": [1, 2]}')",
            &(),
            &shape,
        )
        .await?;
    assert_eq!(rows.len(), 1);
    let cells = rows[0].values();
    assert!(matches!(cells[0], Cell::Int(1)));
    assert!(matches!(cells[1], Cell::Varchar(ref x) if x == "foo"));
    assert!(matches!(cells[2], Cell::Float(x) if x > 1.0 && x < 1.2));
    assert!(matches!(cells[3], Cell::Boolean(true)));
    assert!(matches!(cells[4], Cell::Null));
    assert!(matches!(cells[5], Cell::Binary(ref x) if x == b"foo"));
    assert!(matches!(cells[6],
        Cell::Timestamp(ref x)
        if x.year() == 2023
        && x.month() == 1
        && x.day() == 1
        && x.hour() == 1
        && x.minute() == 1
        && x.second() == 1
    ));
    assert!(matches!(cells[7], Cell::TimestampTz(_)));
    assert!(matches!(cells[8],
        Cell::TimestampTz(ref x)
        if x.offset().local_minus_utc() == 7200 && x.hour() == 1
    ));
    assert_eq!(cells[9], Cell::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
    assert!(matches!(cells[10],
        Cell::Time(ref x)
        if x.hour() == 1
        && x.minute() == 1
        && x.second() == 1
    ));
    assert_eq!(cells[11], Cell::Json(serde_json::json!({"a": [1, 2]})));
    Ok(())
}

#[tokio::test]
async fn can_query_many_rows() -> SnowflakeResult<()> {
    let client = default_client();
    let rows: Vec<Record> = client
        .execute_query("SELECT seq4() AS ix FROM table(generator(rowcount => 100))", &())
        .await?;
    assert_eq!(rows.len(), 100);
    for row in rows {
        assert_eq!(row.values().len(), 1);
        assert!(row.cell("IX").is_some());
    }
    Ok(())
}

#[tokio::test]
async fn can_query_with_many_bindings() -> SnowflakeResult<()> {
    let client = default_client();
    let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let time = chrono::NaiveTime::from_hms_opt(1, 1, 1).unwrap();
    let shape = Shape::new()
        .positional(ValueKind::Integer)
        .positional(ValueKind::Text)
        .positional(ValueKind::Float)
        .positional(ValueKind::Boolean)
        .positional(ValueKind::Binary)
        .positional(ValueKind::Date)
        .positional(ValueKind::Time)
        .positional(ValueKind::Timestamp)
        .nullable_positional(ValueKind::Integer);
    let rows = client
        .prepare(
            "SELECT
            ?::int,
            ?::varchar,
            ?::float,
            ?::boolean,
            ?::binary,
            ?::date,
            ?::time,
            ?::timestamp_ntz,
            ?::int",
        )
        .add_binding(1)
        .add_binding("foo")
        .add_binding(1.0)
        .add_binding(true)
        .add_binding(b"foo".as_slice())
        .add_binding(date)
        .add_binding(time)
        .add_binding(date.and_time(time))
        .add_binding(None::<i64>)
        .query_as(&shape)
        .await?;
    let cells = rows[0].values();
    assert!(matches!(cells[0], Cell::Int(1)));
    assert!(matches!(cells[1], Cell::Varchar(ref x) if x == "foo"));
    assert!(matches!(cells[2], Cell::Float(ref x) if x == &1.0));
    assert!(matches!(cells[3], Cell::Boolean(true)));
    assert!(matches!(cells[4], Cell::Binary(ref x) if x == b"foo"));
    assert_eq!(cells[5], Cell::Date(date));
    assert_eq!(cells[6], Cell::Time(time));
    assert_eq!(cells[7], Cell::Timestamp(date.and_time(time)));
    assert_eq!(cells[8], Cell::Null);
    Ok(())
}

#[tokio::test]
async fn can_insert_and_count() -> SnowflakeResult<()> {
    let client = default_client();
    client
        .execute_non_query("CREATE TEMPORARY TABLE live_rows (id INT, name VARCHAR)", &())
        .await?;
    let inserted = client
        .execute_non_query(
            "INSERT INTO live_rows VALUES (?, ?), (?, ?)",
            &(1, "a", 2, "b"),
        )
        .await?;
    assert_eq!(inserted, 2);
    let count = client.execute_scalar("SELECT COUNT(*) FROM live_rows", &()).await?;
    assert_eq!(count.as_deref(), Some("2"));
    Ok(())
}

#[tokio::test]
async fn large_results_are_refused() {
    let client = default_client();
    let result = client
        .execute_query_as(
            "SELECT seq4() AS ix FROM table(generator(rowcount => 100000))",
            &(),
            &Shape::scalar(ValueKind::Integer),
        )
        .await;
    assert!(matches!(
        result,
        Err(SnowflakeError::UnsupportedFeature(_))
    ));
}
