use serde::Serialize;

use crate::bindings::{Binding, Bindings};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::mapper::{self, FromRow, MapperOptions, Record, Shape};
use crate::requests::{self, QueryRequest};
use crate::response::{ColumnType, QueryResponse};
use crate::SnowflakeClient;

/// A builder for one SQL statement (created by [`SnowflakeClient::prepare`])
///
/// Executing a statement consumes it: each execution is one logical request
/// with its own request id, which is what [`SnowflakeClient::cancel_query`] targets.
/// A clone is a separate call and gets a new request id.
#[derive(Debug)]
pub struct Statement<'a> {
    client: &'a SnowflakeClient,
    sql: String,
    bindings: Bindings,
    request_id: uuid::Uuid,
    mapper: MapperOptions,
}

impl Clone for Statement<'_> {
    fn clone(&self) -> Self {
        Statement {
            client: self.client,
            sql: self.sql.clone(),
            bindings: self.bindings.clone(),
            request_id: uuid::Uuid::new_v4(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<'a> Statement<'a> {
    /// Create a new statement from a SQL string and a SnowflakeClient
    ///
    /// Usually you will want to use [`SnowflakeClient::prepare`] instead of this method
    /// but the difference is merely ergonomic.
    pub fn new(sql: &str, client: &'a SnowflakeClient) -> Statement<'a> {
        Statement {
            client,
            sql: sql.to_owned(),
            bindings: Bindings::new(),
            request_id: uuid::Uuid::new_v4(),
            mapper: client.config().mapper.clone(),
        }
    }

    /// The id the statement is submitted with, usable to cancel it from elsewhere
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Add a binding to the statement
    ///
    /// Several types are supported:
    ///
    /// * All integers are bound as `FIXED`
    /// * `f64` and `f32` are bound as `REAL`
    /// * `bool` is bound as `BOOLEAN`
    /// * `&str`, `String` and `char` are bound as `TEXT`
    /// * `&[u8]` and `Vec<u8>` are bound as hex encoded `BINARY`
    /// * `chrono::NaiveDate`, `NaiveTime`, `NaiveDateTime` and `DateTime<FixedOffset>`
    ///   are bound as `DATE`, `TIME`, `TIMESTAMP_NTZ` and `TIMESTAMP_TZ`
    /// * `None` is bound as a null
    pub fn add_binding<T: Into<Binding>>(mut self, value: T) -> Statement<'a> {
        self.bindings.push(value);
        self
    }

    /// Replace the bindings with the values of a serializable parameter object
    ///
    /// See [`Bindings::from_serialize`] for how values are ordered and typed.
    pub fn bind_all<P: Serialize + ?Sized>(mut self, params: &P) -> SnowflakeResult<Statement<'a>> {
        self.bindings = Bindings::from_serialize(params)?;
        Ok(self)
    }

    /// Override the client's options for converting the result
    pub fn with_mapper_options(mut self, mapper: MapperOptions) -> Statement<'a> {
        self.mapper = mapper;
        self
    }

    async fn send(&self, describe_only: bool) -> SnowflakeResult<QueryResponse> {
        let body = QueryRequest {
            sql_text: &self.sql,
            describe_only,
            bindings: &self.bindings,
        };
        log::debug!(
            "Sending statement {} with {} bindings: {}",
            self.request_id,
            self.bindings.len(),
            self.sql
        );
        let request_id = self.request_id;
        self.client
            .executor()
            .execute_authenticated(|config, session| {
                requests::query(config, session, request_id, &body)
            })
            .await?
            .ok_or_else(|| SnowflakeError::OperationFailed {
                message: "query response carried no data".into(),
                code: None,
            })
    }

    /// Execute the statement and return the response as the server sent it
    ///
    /// The row set is left unconverted, and chunk pointers are not checked.
    pub async fn raw(self) -> SnowflakeResult<QueryResponse> {
        self.send(false).await
    }

    /// Execute SQL that returns a result set, converting each row with [`FromRow`]
    pub async fn query<T: FromRow>(self) -> SnowflakeResult<Vec<T>> {
        self.query_as(&T::shape())
            .await?
            .into_iter()
            .map(T::from_row)
            .collect()
    }

    /// Execute SQL that returns a result set, mapping each row to `shape`
    pub async fn query_as(self, shape: &Shape) -> SnowflakeResult<Vec<Record>> {
        let response = self.send(false).await?;
        mapper::map_response(&response, shape, &self.mapper)
    }

    /// Execute SQL and return the first column of the first row, unconverted
    ///
    /// Returns `None` when there are no rows or the value is null.
    pub async fn scalar(self) -> SnowflakeResult<Option<String>> {
        Ok(mapper::scalar(&self.send(false).await?))
    }

    /// Execute SQL that does not return a result set
    ///
    /// This is useful for DML statements like `INSERT`, `UPDATE`, and `DELETE`,
    /// and returns the number of affected rows (0 for statements like DDL).
    pub async fn execute(self) -> SnowflakeResult<i64> {
        mapper::affected_rows(&self.send(false).await?)
    }

    /// Describe the columns the statement would return, without running it
    pub async fn describe(self) -> SnowflakeResult<Vec<ColumnType>> {
        Ok(self.send(true).await?.row_type)
    }
}
