use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::ser::{
    self, Impossible, SerializeMap, SerializeSeq, SerializeStruct, SerializeTuple,
    SerializeTupleStruct,
};
use serde::{Serialize, Serializer};

use crate::errors::{SnowflakeError, SnowflakeResult};

/// Binding types, used for serialization and sending data to Snowflake.
///
/// These don't round trip because the format Snowflake returns is different,
/// and those are in `cells::Cell`.
///
/// The struct name only matters to the parameter serializer, which uses it to
/// recognize a `Binding` nested in a parameter object. JSON ignores it.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename = "$snowflake::Binding")]
pub struct Binding {
    #[serde(rename = "type")]
    pub sql_type: BindingType,
    pub value: Option<String>,
}

const BINDING_TOKEN: &str = "$snowflake::Binding";

// With `arbitrary_precision`, serde_json hands its numbers to other
// serializers as a one-field struct of this name holding the digits
const JSON_NUMBER_TOKEN: &str = "$serde_json::private::Number";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingType {
    /// Only used for nulls, which have no type of their own
    Any,
    Boolean,
    Fixed,
    Real,
    Text,
    Binary,
    Date,
    Time,
    TimestampNtz,
    TimestampTz,
}

impl Binding {
    pub fn new(sql_type: BindingType, value: impl Into<String>) -> Binding {
        Binding {
            sql_type,
            value: Some(value.into()),
        }
    }

    pub fn null() -> Binding {
        Binding {
            sql_type: BindingType::Any,
            value: None,
        }
    }
}

/// Positional bindings, sent as `{"1": {...}, "2": {...}}`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings(Vec<Binding>);

impl Bindings {
    pub fn new() -> Bindings {
        Bindings::default()
    }

    /// Bind every value of a serializable parameter object
    ///
    /// * structs and maps bind their values in field order
    /// * sequences and tuples bind their elements in order
    /// * `()` and `None` bind nothing
    /// * any other single value is bound as the only parameter
    ///
    /// Each value is typed by how it serializes: integers as `FIXED`, floats
    /// (including NaN and infinities) as `REAL`, strings as `TEXT`, bytes as
    /// `BINARY`. Chrono values serialize as ISO 8601 strings and so bind as
    /// `TEXT`, which Snowflake casts where the SQL expects a date or time.
    /// To send one with its own SQL type, put `Binding::from(value)` in the
    /// parameter object instead.
    ///
    /// Nested arrays or objects fail with [`SnowflakeError::Binding`].
    pub fn from_serialize<P: Serialize + ?Sized>(params: &P) -> SnowflakeResult<Bindings> {
        params.serialize(ParamsSerializer).map(Bindings)
    }

    pub fn push<T: Into<Binding>>(&mut self, value: T) {
        self.0.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The binding at a 1-based position, as the server numbers them
    pub fn get(&self, position: usize) -> Option<&Binding> {
        position.checked_sub(1).and_then(|index| self.0.get(index))
    }
}

impl Serialize for Bindings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .enumerate()
                .map(|(index, binding)| ((index + 1).to_string(), binding)),
        )
    }
}

//
// Parameter serialization
//

impl ser::Error for SnowflakeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SnowflakeError::Binding {
            index: 0,
            reason: msg.to_string(),
        }
    }
}

fn unsupported(index: usize, what: &str) -> SnowflakeError {
    SnowflakeError::Binding {
        index,
        reason: format!("{what} have no SQL binding type"),
    }
}

/// Attach the parameter position to errors raised by a value's own `Serialize`
fn reindex(index: usize) -> impl FnOnce(SnowflakeError) -> SnowflakeError {
    move |error| match error {
        SnowflakeError::Binding { index: 0, reason } => SnowflakeError::Binding { index, reason },
        other => other,
    }
}

macro_rules! bind_value {
    ($($method: ident($ty: ty)),* $(,)?) => {
        $(
            fn $method(self, value: $ty) -> SnowflakeResult<Binding> {
                Ok(Binding::from(value))
            }
        )*
    };
}

/// Turns one parameter value into one binding
struct ValueSerializer {
    index: usize,
}

impl Serializer for ValueSerializer {
    type Ok = Binding;
    type Error = SnowflakeError;
    type SerializeSeq = Impossible<Binding, SnowflakeError>;
    type SerializeTuple = Impossible<Binding, SnowflakeError>;
    type SerializeTupleStruct = Impossible<Binding, SnowflakeError>;
    type SerializeTupleVariant = Impossible<Binding, SnowflakeError>;
    type SerializeMap = Impossible<Binding, SnowflakeError>;
    type SerializeStruct = CapturedBinding;
    type SerializeStructVariant = Impossible<Binding, SnowflakeError>;

    bind_value!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    );

    fn serialize_none(self) -> SnowflakeResult<Binding> {
        Ok(Binding::null())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> SnowflakeResult<Binding> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> SnowflakeResult<Binding> {
        Ok(Binding::null())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> SnowflakeResult<Binding> {
        Ok(Binding::null())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> SnowflakeResult<Binding> {
        Ok(Binding::from(variant))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> SnowflakeResult<Binding> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> SnowflakeResult<Binding> {
        Err(unsupported(self.index, "enum variants with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> SnowflakeResult<Self::SerializeSeq> {
        Err(unsupported(self.index, "arrays"))
    }

    fn serialize_tuple(self, _len: usize) -> SnowflakeResult<Self::SerializeTuple> {
        Err(unsupported(self.index, "arrays"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeTupleStruct> {
        Err(unsupported(self.index, "arrays"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeTupleVariant> {
        Err(unsupported(self.index, "enum variants with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> SnowflakeResult<Self::SerializeMap> {
        Err(unsupported(self.index, "objects"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeStruct> {
        CapturedBinding::new(name, self.index)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeStructVariant> {
        Err(unsupported(self.index, "enum variants with data"))
    }
}

/// The structs that stand for a single value: a `Binding` or a serde_json number
struct CapturedBinding {
    number: bool,
    binding: Binding,
}

impl CapturedBinding {
    fn new(name: &'static str, index: usize) -> SnowflakeResult<CapturedBinding> {
        match name {
            BINDING_TOKEN | JSON_NUMBER_TOKEN => Ok(CapturedBinding {
                number: name == JSON_NUMBER_TOKEN,
                binding: Binding::null(),
            }),
            _ => Err(unsupported(index, "objects")),
        }
    }
}

impl SerializeStruct for CapturedBinding {
    type Ok = Binding;
    type Error = SnowflakeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> SnowflakeResult<()> {
        let value = serde_json::to_value(value)?;
        if self.number {
            let digits = value.as_str().unwrap_or_default().to_owned();
            let sql_type = if digits.parse::<i128>().is_ok() {
                BindingType::Fixed
            } else {
                BindingType::Real
            };
            self.binding = Binding::new(sql_type, digits);
            return Ok(());
        }
        match key {
            "type" => self.binding.sql_type = serde_json::from_value(value)?,
            "value" => self.binding.value = serde_json::from_value(value)?,
            _ => {}
        }
        Ok(())
    }

    fn end(self) -> SnowflakeResult<Binding> {
        Ok(self.binding)
    }
}

macro_rules! bind_single {
    ($($method: ident($ty: ty)),* $(,)?) => {
        $(
            fn $method(self, value: $ty) -> SnowflakeResult<Vec<Binding>> {
                ValueSerializer { index: 1 }.$method(value).map(|binding| vec![binding])
            }
        )*
    };
}

/// Turns a whole parameter object into positional bindings
struct ParamsSerializer;

impl Serializer for ParamsSerializer {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;
    type SerializeSeq = ParamsCollector;
    type SerializeTuple = ParamsCollector;
    type SerializeTupleStruct = ParamsCollector;
    type SerializeTupleVariant = Impossible<Vec<Binding>, SnowflakeError>;
    type SerializeMap = ParamsCollector;
    type SerializeStruct = ParamsCollector;
    type SerializeStructVariant = Impossible<Vec<Binding>, SnowflakeError>;

    bind_single!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    );

    fn serialize_none(self) -> SnowflakeResult<Vec<Binding>> {
        Ok(vec![])
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> SnowflakeResult<Vec<Binding>> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> SnowflakeResult<Vec<Binding>> {
        Ok(vec![])
    }

    fn serialize_unit_struct(self, _name: &'static str) -> SnowflakeResult<Vec<Binding>> {
        Ok(vec![])
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> SnowflakeResult<Vec<Binding>> {
        ValueSerializer { index: 1 }
            .serialize_unit_variant(name, variant_index, variant)
            .map(|binding| vec![binding])
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> SnowflakeResult<Vec<Binding>> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> SnowflakeResult<Vec<Binding>> {
        Err(unsupported(1, "enum variants with data"))
    }

    fn serialize_seq(self, len: Option<usize>) -> SnowflakeResult<ParamsCollector> {
        Ok(ParamsCollector::many(len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> SnowflakeResult<ParamsCollector> {
        Ok(ParamsCollector::many(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> SnowflakeResult<ParamsCollector> {
        Ok(ParamsCollector::many(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeTupleVariant> {
        Err(unsupported(1, "enum variants with data"))
    }

    fn serialize_map(self, len: Option<usize>) -> SnowflakeResult<ParamsCollector> {
        Ok(ParamsCollector::many(len.unwrap_or(0)))
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> SnowflakeResult<ParamsCollector> {
        match name {
            // A lone binding or number is a single parameter, not a parameter object
            BINDING_TOKEN | JSON_NUMBER_TOKEN => {
                Ok(ParamsCollector::One(CapturedBinding::new(name, 1)?))
            }
            _ => Ok(ParamsCollector::many(len)),
        }
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> SnowflakeResult<Self::SerializeStructVariant> {
        Err(unsupported(1, "enum variants with data"))
    }
}

enum ParamsCollector {
    Many(Vec<Binding>),
    One(CapturedBinding),
}

impl ParamsCollector {
    fn many(len: usize) -> ParamsCollector {
        ParamsCollector::Many(Vec::with_capacity(len))
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> SnowflakeResult<()> {
        match self {
            ParamsCollector::Many(bindings) => {
                let index = bindings.len() + 1;
                let binding = value
                    .serialize(ValueSerializer { index })
                    .map_err(reindex(index))?;
                bindings.push(binding);
                Ok(())
            }
            ParamsCollector::One(_) => Err(unsupported(1, "nested values")),
        }
    }

    fn finish(self) -> SnowflakeResult<Vec<Binding>> {
        match self {
            ParamsCollector::Many(bindings) => Ok(bindings),
            ParamsCollector::One(captured) => captured.end().map(|binding| vec![binding]),
        }
    }
}

impl SerializeSeq for ParamsCollector {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> SnowflakeResult<()> {
        self.push(value)
    }

    fn end(self) -> SnowflakeResult<Vec<Binding>> {
        self.finish()
    }
}

impl SerializeTuple for ParamsCollector {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> SnowflakeResult<()> {
        self.push(value)
    }

    fn end(self) -> SnowflakeResult<Vec<Binding>> {
        self.finish()
    }
}

impl SerializeTupleStruct for ParamsCollector {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> SnowflakeResult<()> {
        self.push(value)
    }

    fn end(self) -> SnowflakeResult<Vec<Binding>> {
        self.finish()
    }
}

impl SerializeMap for ParamsCollector {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> SnowflakeResult<()> {
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> SnowflakeResult<()> {
        self.push(value)
    }

    fn end(self) -> SnowflakeResult<Vec<Binding>> {
        self.finish()
    }
}

impl SerializeStruct for ParamsCollector {
    type Ok = Vec<Binding>;
    type Error = SnowflakeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> SnowflakeResult<()> {
        match self {
            ParamsCollector::One(captured) => captured.serialize_field(key, value),
            ParamsCollector::Many(_) => self.push(value),
        }
    }

    fn end(self) -> SnowflakeResult<Vec<Binding>> {
        self.finish()
    }
}

macro_rules! impl_binding {
    ($ty: ty, $ex: ident) => {
        impl From<$ty> for Binding {
            fn from(value: $ty) -> Self {
                Binding::new(BindingType::$ex, value.to_string())
            }
        }
    };
}
impl_binding!(bool, Boolean);
impl_binding!(i8, Fixed);
impl_binding!(i16, Fixed);
impl_binding!(i32, Fixed);
impl_binding!(i64, Fixed);
impl_binding!(i128, Fixed);
impl_binding!(isize, Fixed);
impl_binding!(u8, Fixed);
impl_binding!(u16, Fixed);
impl_binding!(u32, Fixed);
impl_binding!(u64, Fixed);
impl_binding!(u128, Fixed);
impl_binding!(usize, Fixed);
impl_binding!(f32, Real);
impl_binding!(f64, Real);
impl_binding!(char, Text);
impl_binding!(String, Text);
impl_binding!(&str, Text);

impl From<&[u8]> for Binding {
    fn from(value: &[u8]) -> Self {
        Binding::new(BindingType::Binary, hex::encode(value))
    }
}

impl From<Vec<u8>> for Binding {
    fn from(value: Vec<u8>) -> Self {
        Binding::from(value.as_slice())
    }
}

// Temporal values bind as epoch counts, which is what the server parses for typed bindings

/// Milliseconds since the epoch, at midnight
impl From<NaiveDate> for Binding {
    fn from(value: NaiveDate) -> Self {
        // 719163 is the day number of 1970-01-01
        let millis = (i64::from(value.num_days_from_ce()) - 719_163) * 86_400_000;
        Binding::new(BindingType::Date, millis.to_string())
    }
}

/// Nanoseconds since midnight
impl From<NaiveTime> for Binding {
    fn from(value: NaiveTime) -> Self {
        let nanos = i64::from(value.num_seconds_from_midnight()) * 1_000_000_000
            + i64::from(value.nanosecond());
        Binding::new(BindingType::Time, nanos.to_string())
    }
}

fn epoch_nanos(value: &NaiveDateTime) -> String {
    let seconds = Utc.from_utc_datetime(value).timestamp();
    let nanos = i128::from(seconds) * 1_000_000_000 + i128::from(value.nanosecond());
    nanos.to_string()
}

/// Nanoseconds since the epoch
impl From<NaiveDateTime> for Binding {
    fn from(value: NaiveDateTime) -> Self {
        Binding::new(BindingType::TimestampNtz, epoch_nanos(&value))
    }
}

/// Nanoseconds since the epoch (UTC), then the offset in minutes plus 1440
impl From<DateTime<FixedOffset>> for Binding {
    fn from(value: DateTime<FixedOffset>) -> Self {
        let offset = value.offset().local_minus_utc() / 60 + 1440;
        Binding::new(
            BindingType::TimestampTz,
            format!("{} {offset}", epoch_nanos(&value.naive_utc())),
        )
    }
}

impl<T: Into<Binding>> From<Option<T>> for Binding {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Binding::null, Into::into)
    }
}
