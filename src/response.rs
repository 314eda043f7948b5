use serde::Deserialize;

use crate::cells::SqlType;
use crate::errors::{SnowflakeError, SnowflakeResult};

pub type StringTable = Vec<Vec<Option<String>>>;

/// The `data` payload of a query-request response
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(rename = "rowtype", default)]
    pub row_type: Vec<ColumnType>,
    /// Absent for statements that produce no rows at all
    #[serde(rename = "rowset", default)]
    pub row_set: Option<StringTable>,
    /// Pointers to the remainder of a large result, which this client does not fetch
    #[serde(default)]
    pub chunks: Option<Vec<ChunkInfo>>,
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub statement_type_id: Option<i64>,
    #[serde(default)]
    pub final_database_name: Option<String>,
    #[serde(default)]
    pub final_schema_name: Option<String>,
}

impl QueryResponse {
    /// Get the number of columns
    pub fn num_columns(&self) -> usize {
        self.row_type.len()
    }

    /// The rows returned inline, possibly none
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        self.row_set.as_deref().unwrap_or_default()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.as_ref().map_or(0, Vec::len)
    }

    /// Fail instead of silently returning only the first part of a large result
    pub fn ensure_unchunked(&self) -> SnowflakeResult<()> {
        if self.num_chunks() > 0 {
            log::warn!(
                "Query {:?} returned {} result chunks",
                self.query_id,
                self.num_chunks()
            );
            return Err(SnowflakeError::UnsupportedFeature("chunked results"));
        }
        Ok(())
    }
}

/// The type of a column in the result set
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ColumnType {
    /// The name of the column
    pub name: String,
    #[serde(rename = "type")]
    /// The format used when serializing the type to String before returning it
    pub sql_type: SqlType,
    // Whether the column can be null
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    // The number of decimal digits of scale (for numbers) or fractional seconds (for times)
    #[serde(default)]
    pub scale: Option<u32>,
    /// How many decimal digits of precision the column has
    #[serde(default)]
    pub precision: Option<u32>,
    /// The length of text columns, in characters
    #[serde(default)]
    pub length: Option<u64>,
    /// The length of the column in bytes
    #[serde(default)]
    pub byte_length: Option<u64>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
}

fn default_nullable() -> bool {
    true
}

impl ColumnType {
    pub fn new(name: &str, sql_type: SqlType) -> ColumnType {
        ColumnType {
            name: name.to_owned(),
            sql_type,
            nullable: true,
            scale: None,
            precision: None,
            length: None,
            byte_length: None,
            database: String::new(),
            schema: String::new(),
            table: String::new(),
        }
    }

    pub fn with_scale(mut self, scale: u32) -> ColumnType {
        self.scale = Some(scale);
        self
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub url: String,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub uncompressed_size: u64,
    #[serde(default)]
    pub compressed_size: u64,
}
