// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Typed SQL values.
//!
//! [`Value`] is what statement parameters are bound from and what result cells
//! decode into. Parameters are encoded against the type the server inferred
//! for the placeholder, so the same value works against dialects that infer
//! `bigint` where PostgreSQL would infer `integer`, as long as the conversion
//! is lossless.

use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// A non-null cell of a type this crate does not decode, named by its
    /// type.
    Unsupported(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    /// Reports whether this value may be bound to a column of type `ty`.
    /// `NULL` fits every column.
    pub fn fits(&self, ty: ColumnType) -> bool {
        use ColumnType::*;
        match (self, ty) {
            (Value::Null, _) => true,
            (Value::Bool(_), Bool) => true,
            (Value::Int2(_), Int2) => true,
            (Value::Int4(_), Int4) => true,
            (Value::Int8(_), Int8) => true,
            (Value::Float4(_), Float4) => true,
            (Value::Float8(_), Float8) => true,
            (Value::Text(_), Text | Varchar) => true,
            (Value::Timestamp(_), Timestamp | TimestampTz) => true,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int2(v) => Some(i64::from(*v)),
            Value::Int4(v) => Some(i64::from(*v)),
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int2(_) => "int2",
            Value::Int4(_) => "int4",
            Value::Int8(_) => "int8",
            Value::Float4(_) => "float4",
            Value::Float8(_) => "float8",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Unsupported(_) => "unsupported",
        }
    }

    /// Decodes every cell of `row`.
    pub fn decode_row(row: &Row) -> Result<Vec<Value>, tokio_postgres::Error> {
        let mut out = Vec::with_capacity(row.len());
        for (i, col) in row.columns().iter().enumerate() {
            let value = match *col.type_() {
                Type::BOOL => row.try_get::<_, Option<bool>>(i)?.map(Value::Bool),
                Type::INT2 => row.try_get::<_, Option<i16>>(i)?.map(Value::Int2),
                Type::INT4 => row.try_get::<_, Option<i32>>(i)?.map(Value::Int4),
                Type::INT8 => row.try_get::<_, Option<i64>>(i)?.map(Value::Int8),
                Type::FLOAT4 => row.try_get::<_, Option<f32>>(i)?.map(Value::Float4),
                Type::FLOAT8 => row.try_get::<_, Option<f64>>(i)?.map(Value::Float8),
                Type::BPCHAR | Type::TEXT | Type::VARCHAR | Type::NAME => {
                    row.try_get::<_, Option<String>>(i)?.map(Value::Text)
                }
                Type::TIMESTAMP => row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(i)?
                    .map(|ts| Value::Timestamp(ts.and_utc())),
                Type::TIMESTAMPTZ => row
                    .try_get::<_, Option<DateTime<Utc>>>(i)?
                    .map(Value::Timestamp),
                ref ty => row
                    .try_get::<_, Option<Opaque>>(i)?
                    .map(|_| Value::Unsupported(ty.name().to_string())),
            };
            out.push(value.unwrap_or(Value::Null));
        }
        Ok(out)
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    String => Text,
    &str => Text,
    DateTime<Utc> => Timestamp,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => v.fmt(f),
            Value::Int2(v) => v.fmt(f),
            Value::Int4(v) => v.fmt(f),
            Value::Int8(v) => v.fmt(f),
            Value::Float4(v) => v.fmt(f),
            Value::Float8(v) => v.fmt(f),
            Value::Text(v) => f.write_str(v),
            Value::Timestamp(v) => v.fmt(f),
            Value::Unsupported(ty) => write!(f, "<{}>", ty),
        }
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (Value::Null, _) => Ok(IsNull::Yes),
            (Value::Bool(v), &Type::BOOL) => v.to_sql(ty, out),
            (Value::Int2(v), &Type::INT2) => v.to_sql(ty, out),
            (Value::Int2(v), &Type::INT4) => i32::from(*v).to_sql(ty, out),
            (Value::Int2(v), &Type::INT8) => i64::from(*v).to_sql(ty, out),
            (Value::Int4(v), &Type::INT2) => i16::try_from(*v)?.to_sql(ty, out),
            (Value::Int4(v), &Type::INT4) => v.to_sql(ty, out),
            (Value::Int4(v), &Type::INT8) => i64::from(*v).to_sql(ty, out),
            (Value::Int8(v), &Type::INT2) => i16::try_from(*v)?.to_sql(ty, out),
            (Value::Int8(v), &Type::INT4) => i32::try_from(*v)?.to_sql(ty, out),
            (Value::Int8(v), &Type::INT8) => v.to_sql(ty, out),
            (Value::Float4(v), &Type::FLOAT4) => v.to_sql(ty, out),
            (Value::Float4(v), &Type::FLOAT8) => f64::from(*v).to_sql(ty, out),
            (Value::Float8(v), &Type::FLOAT8) => v.to_sql(ty, out),
            (Value::Text(v), ty) if <&str as ToSql>::accepts(ty) => {
                v.as_str().to_sql(ty, out)
            }
            (Value::Timestamp(v), &Type::TIMESTAMPTZ) => v.to_sql(ty, out),
            (Value::Timestamp(v), &Type::TIMESTAMP) => v.naive_utc().to_sql(ty, out),
            _ => Err(format!("cannot encode {} value as {}", self.kind(), ty).into()),
        }
    }

    fn accepts(_: &Type) -> bool {
        // Compatibility depends on the value, so it is checked in `to_sql`.
        true
    }

    to_sql_checked!();
}

/// Accepts a cell of any type without decoding it.
struct Opaque;

impl<'a> FromSql<'a> for Opaque {
    fn from_sql(_: &Type, _: &'a [u8]) -> Result<Opaque, Box<dyn Error + Sync + Send>> {
        Ok(Opaque)
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// The declared type of a prepared statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Varchar,
    Timestamp,
    TimestampTz,
}

impl ColumnType {
    pub fn pg_type(&self) -> Type {
        match self {
            ColumnType::Bool => Type::BOOL,
            ColumnType::Int2 => Type::INT2,
            ColumnType::Int4 => Type::INT4,
            ColumnType::Int8 => Type::INT8,
            ColumnType::Float4 => Type::FLOAT4,
            ColumnType::Float8 => Type::FLOAT8,
            ColumnType::Text => Type::TEXT,
            ColumnType::Varchar => Type::VARCHAR,
            ColumnType::Timestamp => Type::TIMESTAMP,
            ColumnType::TimestampTz => Type::TIMESTAMPTZ,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.pg_type().name())
    }
}
