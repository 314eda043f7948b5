//! A lightweight Snowflake SQL client over Snowflake's HTTP session API.
//!
//! The client logs in once, renews its session token transparently when the
//! server reports it expired, and converts result rows using the column metadata
//! the server sends with them.
//!
//! Example usage:
//!
//! ```rust,no_run
//! use light_snowflake_client::{
//!     ClientConfig, Credentials, Shape, SnowflakeClient, SnowflakeError, ValueKind,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SnowflakeError> {
//!     let config = ClientConfig::new("ACCOUNT", "USER", Credentials::Password("secret".into()))
//!         .with_database("DB")
//!         .with_warehouse("WH")
//!         .with_role("ROLE");
//!     let client = SnowflakeClient::new(config)?;
//!
//!     // Rows mapped to a shape, with parameters bound positionally
//!     let shape = Shape::new()
//!         .field("id", ValueKind::Integer)
//!         .nullable_field("name", ValueKind::Text);
//!     let rows = client
//!         .execute_query_as("SELECT id, name FROM TEST_TABLE WHERE id > ?", &[10], &shape)
//!         .await?;
//!     for row in rows {
//!         let id: i64 = row.get("id")?;
//!         let name: Option<String> = row.get("name")?;
//!         println!("{id}: {name:?}");
//!     }
//!
//!     // The same through the statement builder
//!     let inserted = client
//!         .prepare("INSERT INTO TEST_TABLE VALUES (?, ?)")
//!         .add_binding(11)
//!         .add_binding("Henry")
//!         .execute()
//!         .await?;
//!     assert_eq!(inserted, 1);
//!
//!     let count = client.execute_scalar("SELECT COUNT(*) FROM TEST_TABLE", &()).await?;
//!     println!("{count:?} rows");
//!
//!     client.close_session().await?;
//!     Ok(())
//! }
//! ```
mod bindings;
mod cells;
mod client;
mod config;
mod errors;
mod executor;
mod jwt;
mod mapper;
mod requests;
mod response;
mod session;
mod statement;
mod transport;

#[cfg(test)]
mod stub;

#[cfg(test)]
#[cfg(feature = "live-tests")]
mod live_tests;

pub use bindings::{Binding, BindingType, Bindings};
pub use cells::{Cell, SqlType, ValueKind};
pub use client::SnowflakeClient;
pub use config::{ClientConfig, Credentials, Protocol, SessionOptions};
pub use errors::{SnowflakeError, SnowflakeResult, SESSION_EXPIRED_CODE};
pub use jwt_simple;
pub use mapper::{Field, FromCell, FromRow, MapperOptions, Record, Shape};
pub use response::{ChunkInfo, ColumnType, QueryResponse};
pub use session::{Session, SessionInfo};
pub use statement::Statement;
pub use transport::Transport;
