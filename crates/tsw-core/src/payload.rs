//! JSON push payloads for the `tsw` binary.
//!
//! ```json
//! {
//!   "tables": [{
//!     "name": "trades",
//!     "columns": [{"name": "px", "type": "double"},
//!                 {"name": "venue", "type": "symbol", "symtable": "venues"}],
//!     "index": [1700000000000000000, 1700000001000000000],
//!     "data": [{"dtype": "float32", "values": [101.5, null]}, null]
//!   }]
//! }
//! ```
//!
//! `null` values are masked rows. A `null` column, or a missing `data`
//! list, pushes the column as all nulls. Payload schemas are served by a
//! [`ScriptedStore`], which keeps what it was sent and succeeds unless a
//! failure script says otherwise.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tsw_common::{Error, Result};
use tsw_convert::{Array, Mask, MaskedArray, Object};

use crate::retry::Sleep;
use crate::store::{ColumnInfo, ScriptedStore, Status, Store};
use crate::writer::{Writer, WriterData};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    pub tables: Vec<TablePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablePayload {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Nanoseconds since the epoch.
    pub index: Vec<i64>,
    #[serde(default)]
    pub data: Vec<Option<ColumnPayload>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnPayload {
    /// int16, int32, int64, float32, float64, datetime64[ns], unicode, bytes or object.
    pub dtype: String,
    pub values: Vec<Value>,
}

fn bad_value(dtype: &str, row: usize, value: &Value) -> Error {
    Error::InvalidArgument(format!("row {row}: {value} is not a valid {dtype} value"))
}

/// Split JSON values into data and mask, using `fill` for null rows.
fn collect<T, F>(dtype: &str, values: &[Value], fill: T, parse: F) -> Result<(Vec<T>, Vec<bool>)>
where
    T: Clone,
    F: Fn(&Value) -> Option<T>,
{
    let mut data = Vec::with_capacity(values.len());
    let mut mask = Vec::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        if value.is_null() {
            data.push(fill.clone());
            mask.push(true);
        } else {
            data.push(parse(value).ok_or_else(|| bad_value(dtype, row, value))?);
            mask.push(false);
        }
    }
    Ok((data, mask))
}

fn object_value(value: &Value) -> Option<Object> {
    match value {
        Value::Null => Some(Object::None),
        Value::String(s) => Some(Object::Str(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(Object::Int)
            .or_else(|| n.as_f64().map(Object::Float)),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Object::Bytes),
        _ => None,
    }
}

impl ColumnPayload {
    pub fn to_masked(&self) -> Result<MaskedArray> {
        let dtype = self.dtype.as_str();
        let values = &self.values;
        let (array, mask) = match dtype {
            "int16" => {
                let (d, m) = collect(dtype, values, 0, |v| {
                    v.as_i64().and_then(|x| i16::try_from(x).ok())
                })?;
                (Array::Int16(d), m)
            }
            "int32" => {
                let (d, m) = collect(dtype, values, 0, |v| {
                    v.as_i64().and_then(|x| i32::try_from(x).ok())
                })?;
                (Array::Int32(d), m)
            }
            "int64" => {
                let (d, m) = collect(dtype, values, 0, Value::as_i64)?;
                (Array::Int64(d), m)
            }
            "float32" => {
                let (d, m) = collect(dtype, values, 0.0, |v| v.as_f64().map(|x| x as f32))?;
                (Array::Float32(d), m)
            }
            "float64" => {
                let (d, m) = collect(dtype, values, 0.0, Value::as_f64)?;
                (Array::Float64(d), m)
            }
            "datetime64[ns]" => {
                let (d, m) = collect(dtype, values, 0, Value::as_i64)?;
                (Array::Datetime64Ns(d), m)
            }
            "unicode" => {
                let (d, m) = collect(dtype, values, String::new(), |v| {
                    v.as_str().map(str::to_string)
                })?;
                (Array::unicode_from_strs(&d), m)
            }
            "bytes" => {
                let (d, m) = collect(dtype, values, String::new(), |v| {
                    v.as_str().map(str::to_string)
                })?;
                (Array::bytes_from_slices(&d), m)
            }
            "object" => {
                let (d, m) = collect(dtype, values, Object::None, object_value)?;
                (Array::Object(d), m)
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown payload dtype '{other}'"
                )))
            }
        };
        MaskedArray::new(array, Mask::new(mask))
    }
}

impl Payload {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Store that knows the payload's table schemas.
    pub fn dry_run_store(&self) -> ScriptedStore {
        let mut store = ScriptedStore::new();
        for table in &self.tables {
            store.add_table(&table.name, table.columns.clone());
        }
        store
    }

    /// Resolve every table through the writer's store and build the push input.
    pub fn to_writer_data<S: Store, Z: Sleep>(&self, writer: &Writer<S, Z>) -> Result<WriterData> {
        let mut data = WriterData::new();
        for table in &self.tables {
            let resolved = writer.table(&table.name)?;
            let mut columns = table
                .data
                .iter()
                .map(|c| c.as_ref().map(ColumnPayload::to_masked).transpose())
                .collect::<Result<Vec<_>>>()?;
            if columns.is_empty() {
                columns.resize(resolved.columns().len(), None);
            }
            data.append(resolved, Array::Datetime64Ns(table.index.clone()), columns)?;
        }
        Ok(data)
    }
}

/// Parse a status name as used by `tsw push --simulate`.
pub fn parse_status(name: &str) -> Result<Status> {
    match name.trim() {
        "success" => Ok(Status::Success),
        "pipe_full" => Ok(Status::PipeFull),
        "try_again" => Ok(Status::TryAgain),
        other => other
            .strip_prefix("failed:")
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| Status::Failed {
                code,
                message: "simulated failure".to_string(),
            })
            .ok_or_else(|| Error::InvalidArgument(format!("unknown status '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PushOptions;
    use serde_json::json;
    use tsw_convert::{ColumnType, MaskProbe};

    fn payload() -> Payload {
        Payload::from_json(
            &json!({
                "tables": [{
                    "name": "trades",
                    "columns": [
                        {"name": "qty", "type": "int64"},
                        {"name": "venue", "type": "symbol", "symtable": "venues"},
                        {"name": "raw", "type": "blob"}
                    ],
                    "index": [10, 20, 30],
                    "data": [
                        {"dtype": "int32", "values": [1, null, 3]},
                        {"dtype": "unicode", "values": ["XNYS", "XLON", null]},
                        null
                    ]
                }]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_column_payload_masks_nulls() {
        let col = ColumnPayload {
            dtype: "float64".into(),
            values: vec![json!(1.5), Value::Null],
        };
        let masked = col.to_masked().unwrap();
        assert_eq!(masked.probe(), MaskProbe::Mixed);
        assert_eq!(masked.data(), &Array::Float64(vec![1.5, 0.0]));
    }

    #[test]
    fn test_column_payload_rejects_bad_values() {
        let col = ColumnPayload {
            dtype: "int16".into(),
            values: vec![json!(70000)],
        };
        assert!(matches!(col.to_masked(), Err(Error::InvalidArgument(_))));
        let col = ColumnPayload {
            dtype: "complex128".into(),
            values: vec![],
        };
        assert!(col.to_masked().is_err());
    }

    #[test]
    fn test_object_values() {
        let col = ColumnPayload {
            dtype: "object".into(),
            values: vec![json!("a"), json!([1, 0, 2]), Value::Null, json!(7)],
        };
        let masked = col.to_masked().unwrap();
        assert_eq!(
            masked.data(),
            &Array::Object(vec![
                Object::Str("a".into()),
                Object::Bytes(vec![1, 0, 2]),
                Object::None,
                Object::Int(7),
            ])
        );
    }

    #[test]
    fn test_dry_run_push() {
        let payload = payload();
        let mut writer = Writer::new(payload.dry_run_store());
        let data = payload.to_writer_data(&writer).unwrap();
        let outcome = writer.push(&data, &PushOptions::new()).unwrap();
        assert_eq!(outcome.rows, 3);

        assert_eq!(writer.store().submit_calls(), 1);
        let sent = writer.store().last_submitted().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].columns[1].data_type, ColumnType::String);
        assert_eq!(sent[0].columns[2].len, 3);
    }

    #[test]
    fn test_missing_data_means_null_columns() {
        let mut payload = payload();
        payload.tables[0].data.clear();
        let writer = Writer::new(payload.dry_run_store());
        let data = payload.to_writer_data(&writer).unwrap();
        let entry = data.iter().next().unwrap();
        assert!(entry.columns().iter().all(Option::is_none));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("pipe_full").unwrap(), Status::PipeFull);
        assert!(matches!(
            parse_status("failed:42").unwrap(),
            Status::Failed { code: 42, .. }
        ));
        assert!(parse_status("meh").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, serde_json::to_string(&payload()).unwrap()).unwrap();
        assert_eq!(Payload::load(&path).unwrap(), payload());
    }
}
