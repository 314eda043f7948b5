//! Conversion of string-encoded result rows into caller-described shapes.
//!
//! The caller describes what it expects with a [`Shape`]: an ordered list of
//! fields, each naming the [`ValueKind`] it wants. Mapping matches fields to
//! columns, coerces each cell according to its column's [`SqlType`], and
//! returns one [`Record`] per row, in row order.
//!
//! [`SqlType`]: crate::SqlType
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::cells::{Cell, ValueKind};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::response::{ColumnType, QueryResponse};

/// Options for converting rows, passed explicitly on every mapping call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// Match field names to column names exactly instead of ignoring case
    pub case_sensitive: bool,
    /// Truncate fractional fixed-point values when an integer is requested
    pub lossy_numbers: bool,
}

/// One field of a target shape
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The column name to match, or `None` to match by position
    pub name: Option<String>,
    pub kind: ValueKind,
    /// Whether a null cell or a missing column is acceptable
    pub nullable: bool,
}

impl Field {
    /// The name used in errors and in `Record` lookups
    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

/// A description of the result type a caller wants for each row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    fields: Vec<Field>,
}

impl Shape {
    pub fn new() -> Shape {
        Shape::default()
    }

    /// A shape with a single positional value, for scalar results
    pub fn scalar(kind: ValueKind) -> Shape {
        Shape::new().positional(kind)
    }

    /// A non-nullable field matched by column name
    pub fn field(mut self, name: &str, kind: ValueKind) -> Shape {
        self.fields.push(Field {
            name: Some(name.to_owned()),
            kind,
            nullable: false,
        });
        self
    }

    /// A nullable field matched by column name
    pub fn nullable_field(mut self, name: &str, kind: ValueKind) -> Shape {
        self.fields.push(Field {
            name: Some(name.to_owned()),
            kind,
            nullable: true,
        });
        self
    }

    /// A non-nullable field matched by its position in the shape
    pub fn positional(mut self, kind: ValueKind) -> Shape {
        self.fields.push(Field {
            name: None,
            kind,
            nullable: false,
        });
        self
    }

    pub fn nullable_positional(mut self, kind: ValueKind) -> Shape {
        self.fields.push(Field {
            name: None,
            kind,
            nullable: true,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One mapped row, holding a value per field of the shape it was mapped to
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    names: Arc<[String]>,
    values: Vec<Cell>,
    case_sensitive: bool,
}

impl Record {
    /// Look up a value by field name
    ///
    /// An exact match wins. Otherwise case is ignored, unless the record was
    /// mapped with [`MapperOptions::case_sensitive`].
    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.names
            .iter()
            .position(|n| n == name)
            .or_else(|| {
                if self.case_sensitive {
                    None
                } else {
                    self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
                }
            })
            .map(|index| &self.values[index])
    }

    /// Look up a value by field position
    pub fn cell_at(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    /// Extract a typed value by field name
    pub fn get<T: FromCell>(&self, name: &str) -> SnowflakeResult<T> {
        let cell = self
            .cell(name)
            .ok_or_else(|| SnowflakeError::mapping(name, "no such field"))?;
        T::from_cell(cell).map_err(|reason| SnowflakeError::mapping(name, reason))
    }

    /// Extract a typed value by field position
    pub fn at<T: FromCell>(&self, index: usize) -> SnowflakeResult<T> {
        let cell = self
            .cell_at(index)
            .ok_or_else(|| SnowflakeError::mapping(format!("#{index}"), "no such field"))?;
        T::from_cell(cell).map_err(|reason| SnowflakeError::mapping(self.names[index].clone(), reason))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }

    /// Convert the record into a JSON object keyed by field name
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.names
                .iter()
                .cloned()
                .zip(self.values.iter().cloned().map(serde_json::Value::from))
                .collect(),
        )
    }
}

/// Types that can be built from a mapped row
///
/// ```rust
/// use light_snowflake_client::{FromRow, Record, Shape, SnowflakeResult, ValueKind};
///
/// struct Person {
///     id: i64,
///     name: Option<String>,
/// }
///
/// impl FromRow for Person {
///     fn shape() -> Shape {
///         Shape::new()
///             .field("id", ValueKind::Integer)
///             .nullable_field("name", ValueKind::Text)
///     }
///
///     fn from_row(row: Record) -> SnowflakeResult<Self> {
///         Ok(Person {
///             id: row.get("id")?,
///             name: row.get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn shape() -> Shape;
    fn from_row(row: Record) -> SnowflakeResult<Self>;
}

impl FromRow for Record {
    /// An empty shape maps every column by its name and reports it as text
    fn shape() -> Shape {
        Shape::new()
    }

    fn from_row(row: Record) -> SnowflakeResult<Self> {
        Ok(row)
    }
}

/// Values that can be extracted from a [`Cell`]
pub trait FromCell: Sized {
    fn from_cell(cell: &Cell) -> Result<Self, String>;
}

fn unexpected(expected: &str, cell: &Cell) -> String {
    match cell {
        Cell::Null => format!("expected {expected}, found null"),
        other => format!("expected {expected}, found {other:?}"),
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Null => Ok(None),
            cell => T::from_cell(cell).map(Some),
        }
    }
}

impl FromCell for Cell {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        Ok(cell.clone())
    }
}

macro_rules! impl_from_int_cell {
    ($($ty: ty),*) => {
        $(
            impl FromCell for $ty {
                fn from_cell(cell: &Cell) -> Result<Self, String> {
                    match cell {
                        Cell::Int(value) => <$ty>::try_from(*value)
                            .map_err(|_| format!("{value} does not fit in {}", stringify!($ty))),
                        other => Err(unexpected("an integer", other)),
                    }
                }
            }
        )*
    };
}
impl_from_int_cell!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl FromCell for f64 {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Float(value) => Ok(*value),
            Cell::Int(value) => Ok(*value as f64),
            other => Err(unexpected("a number", other)),
        }
    }
}

impl FromCell for bool {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Boolean(value) => Ok(*value),
            other => Err(unexpected("a boolean", other)),
        }
    }
}

impl FromCell for String {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Varchar(value) => Ok(value.clone()),
            other => Err(unexpected("text", other)),
        }
    }
}

impl FromCell for Vec<u8> {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Binary(value) => Ok(value.clone()),
            other => Err(unexpected("binary", other)),
        }
    }
}

impl FromCell for NaiveDate {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Date(value) => Ok(*value),
            other => Err(unexpected("a date", other)),
        }
    }
}

impl FromCell for NaiveTime {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Time(value) => Ok(*value),
            other => Err(unexpected("a time", other)),
        }
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::Timestamp(value) => Ok(*value),
            Cell::TimestampTz(value) => Ok(value.naive_utc()),
            other => Err(unexpected("a timestamp", other)),
        }
    }
}

impl FromCell for DateTime<FixedOffset> {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        match cell {
            Cell::TimestampTz(value) => Ok(*value),
            other => Err(unexpected("a timestamp with time zone", other)),
        }
    }
}

impl FromCell for serde_json::Value {
    fn from_cell(cell: &Cell) -> Result<Self, String> {
        Ok(cell.clone().into())
    }
}

fn find_column(
    columns: &[ColumnType],
    field: &Field,
    index: usize,
    options: &MapperOptions,
) -> Option<usize> {
    match &field.name {
        Some(name) if options.case_sensitive => columns.iter().position(|c| &c.name == name),
        Some(name) => columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name)),
        None if index < columns.len() => Some(index),
        None => None,
    }
}

/// The shape used when a caller asks for no particular shape: every column, as text
fn text_shape(columns: &[ColumnType]) -> Shape {
    columns.iter().fold(Shape::new(), |shape, column| {
        shape.nullable_field(&column.name, ValueKind::Text)
    })
}

/// Map every row of a result to the given shape, preserving row order
pub fn map_rows(
    columns: &[ColumnType],
    rows: &[Vec<Option<String>>],
    shape: &Shape,
    options: &MapperOptions,
) -> SnowflakeResult<Vec<Record>> {
    let fallback;
    let shape = if shape.is_empty() {
        fallback = text_shape(columns);
        &fallback
    } else {
        shape
    };

    // Resolve fields to columns once, not per row
    let mut plan = Vec::with_capacity(shape.len());
    for (index, field) in shape.fields().iter().enumerate() {
        let column = find_column(columns, field, index, options);
        if column.is_none() && !field.nullable {
            return Err(SnowflakeError::mapping(
                field.label(index),
                "no matching column in the result",
            ));
        }
        plan.push((field, column));
    }
    let names: Arc<[String]> = shape
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| match (&field.name, plan[index].1) {
            (Some(name), _) => name.clone(),
            (None, Some(column)) => columns[column].name.clone(),
            (None, None) => field.label(index),
        })
        .collect();

    rows.iter()
        .enumerate()
        .map(|(row_index, row)| {
            if row.len() != columns.len() {
                return Err(SnowflakeError::mapping(
                    format!("row {row_index}"),
                    format!("has {} cells but {} columns", row.len(), columns.len()),
                ));
            }
            let values = plan
                .iter()
                .enumerate()
                .map(|(index, (field, column))| {
                    let value = column.and_then(|column| row[column].as_deref().map(|v| (column, v)));
                    match value {
                        None if field.nullable => Ok(Cell::Null),
                        None => Err(SnowflakeError::mapping(
                            field.label(index),
                            format!("null in row {row_index}"),
                        )),
                        Some((column, value)) => {
                            let column = &columns[column];
                            column
                                .sql_type
                                .coerce(value, column.scale.unwrap_or(0), field.kind, options)
                                .map_err(|reason| {
                                    SnowflakeError::mapping(
                                        field.label(index),
                                        format!("{reason} in row {row_index}"),
                                    )
                                })
                        }
                    }
                })
                .collect::<SnowflakeResult<Vec<Cell>>>()?;
            Ok(Record {
                names: names.clone(),
                values,
                case_sensitive: options.case_sensitive,
            })
        })
        .collect()
}

/// Map a whole query response, refusing results split into chunks
pub fn map_response(
    response: &QueryResponse,
    shape: &Shape,
    options: &MapperOptions,
) -> SnowflakeResult<Vec<Record>> {
    response.ensure_unchunked()?;
    map_rows(&response.row_type, response.rows(), shape, options)
}

/// Row 0, column 0 as the server sent it, or `None` if there is no such value
pub fn scalar(response: &QueryResponse) -> Option<String> {
    response.rows().first()?.first()?.clone()
}

/// The affected row count reported for a DML statement
///
/// Statements without a row set (DDL, for example) report 0.
pub fn affected_rows(response: &QueryResponse) -> SnowflakeResult<i64> {
    let Some(cell) = response.rows().first().and_then(|row| row.first()) else {
        return Ok(0);
    };
    match cell {
        None => Ok(0),
        Some(value) => value.trim().parse().map_err(|_| {
            let name = response
                .row_type
                .first()
                .map_or_else(|| "#0".to_owned(), |c| c.name.clone());
            SnowflakeError::mapping(name, format!("`{value}` is not a row count"))
        }),
    }
}
