//! Table schemas and typed access to packed records.
//!
//! A schema is an ordered list of fixed-width attributes plus a key-column
//! set. It owns the record geometry (attribute offsets, total record size),
//! the on-disk ASCII serialization stored in a table's header pages, and the
//! encode/decode of individual attributes inside a packed record body.
//!
//! Attribute packing follows schema order, little-endian, at each type's
//! natural width: INT 4, FLOAT 4, BOOL 1, STRING its declared capacity.

use ahash::RandomState;
use common::{DbError, DbResult, Record};
use types::{DataType, Value};

type Map<K, V> = hashbrown::HashMap<K, V, RandomState>;

/// Describes one column of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    /// Byte capacity for `STRING` attributes; ignored for the other types.
    pub length: u32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: 0,
        }
    }

    /// A `STRING` attribute with a fixed byte capacity.
    pub fn string(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::String,
            length,
        }
    }

    /// Packed width of this attribute inside a record body.
    pub fn width(&self) -> usize {
        match self.data_type {
            DataType::Int => 4,
            DataType::Float => 4,
            DataType::Bool => 1,
            DataType::String => self.length as usize,
        }
    }
}

/// Column layout for a table, along with a name lookup.
#[derive(Clone, Debug)]
pub struct Schema {
    attrs: Vec<Attribute>,
    key_attrs: Vec<usize>,
    name_to_ordinal: Map<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs && self.key_attrs == other.key_attrs
    }
}

impl Schema {
    /// Build a schema, validating the attribute list and key set.
    pub fn try_new(attrs: Vec<Attribute>, key_attrs: Vec<usize>) -> DbResult<Self> {
        if attrs.is_empty() {
            return Err(DbError::Schema(
                "schema must contain at least one attribute".into(),
            ));
        }
        let mut name_to_ordinal = Map::default();
        for (idx, attr) in attrs.iter().enumerate() {
            if attr.name.is_empty() || attr.name.contains([',', ':', '(', ')', '<', '>']) {
                return Err(DbError::Schema(format!(
                    "attribute name '{}' is not serializable",
                    attr.name
                )));
            }
            if attr.data_type == DataType::String && attr.length == 0 {
                return Err(DbError::Schema(format!(
                    "string attribute '{}' must declare a capacity",
                    attr.name
                )));
            }
            if name_to_ordinal.insert(attr.name.clone(), idx).is_some() {
                return Err(DbError::Schema(format!(
                    "duplicate attribute '{}' found while building schema",
                    attr.name
                )));
            }
        }
        for &key in &key_attrs {
            if key >= attrs.len() {
                return Err(DbError::Schema(format!(
                    "key ordinal {key} out of range for {} attributes",
                    attrs.len()
                )));
            }
        }
        Ok(Self {
            attrs,
            key_attrs,
            name_to_ordinal,
        })
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    /// Returns the ordinal for an attribute name.
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.name_to_ordinal.get(name).copied()
    }

    /// Attribute names in schema order.
    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.iter().map(|a| a.name.clone()).collect()
    }

    /// Total packed size of one record body in bytes.
    pub fn record_size(&self) -> usize {
        self.attrs.iter().map(Attribute::width).sum()
    }

    /// Byte offset of attribute `i` inside the record body.
    pub fn attr_offset(&self, i: usize) -> usize {
        self.attrs[..i].iter().map(Attribute::width).sum()
    }

    /// A zero-filled record sized for this schema.
    pub fn new_record(&self) -> Record {
        Record::zeroed(self.record_size())
    }

    /// Decode attribute `i` of `record` into a typed value.
    pub fn get_attr(&self, record: &Record, i: usize) -> DbResult<Value> {
        let attr = self.attr_checked(i)?;
        let offset = self.attr_offset(i);
        let bytes = record
            .data
            .get(offset..offset + attr.width())
            .ok_or_else(|| {
                DbError::Schema(format!(
                    "record body of {} bytes is too short for attribute '{}'",
                    record.data.len(),
                    attr.name
                ))
            })?;

        let value = match attr.data_type {
            DataType::Int => Value::Int(i32::from_le_bytes(bytes.try_into().unwrap())),
            DataType::Float => Value::Float(f32::from_le_bytes(bytes.try_into().unwrap())),
            DataType::Bool => Value::Bool(bytes[0] != 0),
            DataType::String => {
                let text = bytes.split(|b| *b == 0).next().unwrap_or(&[]);
                let text = std::str::from_utf8(text).map_err(|_| {
                    DbError::Schema(format!("attribute '{}' is not valid UTF-8", attr.name))
                })?;
                Value::Str(text.to_string())
            }
        };
        Ok(value)
    }

    /// Encode `value` into attribute `i` of `record`. Strings longer than
    /// the declared capacity are truncated; shorter ones are zero-padded.
    pub fn set_attr(&self, record: &mut Record, i: usize, value: &Value) -> DbResult<()> {
        let attr = self.attr_checked(i)?;
        if value.data_type() != attr.data_type {
            return Err(DbError::Schema(format!(
                "attribute '{}' is {}, got a {} value",
                attr.name,
                attr.data_type,
                value.data_type()
            )));
        }
        let offset = self.attr_offset(i);
        let width = attr.width();
        let slot = record
            .data
            .get_mut(offset..offset + width)
            .ok_or_else(|| {
                DbError::Schema(format!(
                    "record body too short for attribute '{}'",
                    attr.name
                ))
            })?;

        match value {
            Value::Int(v) => slot.copy_from_slice(&v.to_le_bytes()),
            Value::Float(v) => slot.copy_from_slice(&v.to_le_bytes()),
            Value::Bool(v) => slot[0] = *v as u8,
            Value::Str(v) => {
                let bytes = v.as_bytes();
                let n = bytes.len().min(width);
                slot[..n].copy_from_slice(&bytes[..n]);
                slot[n..].fill(0);
            }
        }
        Ok(())
    }

    /// Decode every attribute of `record` in schema order.
    pub fn values(&self, record: &Record) -> DbResult<Vec<Value>> {
        (0..self.attrs.len())
            .map(|i| self.get_attr(record, i))
            .collect()
    }

    /// Pack a full tuple into a fresh record.
    pub fn record_from_values(&self, values: &[Value]) -> DbResult<Record> {
        if values.len() != self.attrs.len() {
            return Err(DbError::Schema(format!(
                "expected {} values, got {}",
                self.attrs.len(),
                values.len()
            )));
        }
        let mut record = self.new_record();
        for (i, value) in values.iter().enumerate() {
            self.set_attr(&mut record, i, value)?;
        }
        Ok(record)
    }

    /// Serialize to the ASCII form stored in a table's header pages:
    ///
    /// `Schema with <2> attributes (id: INT, name: STRING[10]) with keys: (id)`
    pub fn serialize(&self) -> String {
        let attrs: Vec<String> = self
            .attrs
            .iter()
            .map(|a| match a.data_type {
                DataType::String => format!("{}: STRING[{}]", a.name, a.length),
                _ => format!("{}: {}", a.name, a.data_type),
            })
            .collect();
        let keys: Vec<&str> = self
            .key_attrs
            .iter()
            .map(|&k| self.attrs[k].name.as_str())
            .collect();
        format!(
            "Schema with <{}> attributes ({}) with keys: ({})",
            self.attrs.len(),
            attrs.join(", "),
            keys.join(", ")
        )
    }

    /// Parse the serialized form back into a schema.
    pub fn parse(text: &str) -> DbResult<Self> {
        let text = text.trim_end_matches('\0').trim();
        let rest = text
            .strip_prefix("Schema with <")
            .ok_or_else(|| malformed(text))?;
        let (count, rest) = rest.split_once('>').ok_or_else(|| malformed(text))?;
        let declared: usize = count
            .parse()
            .map_err(|_| DbError::Schema(format!("bad attribute count '{count}'")))?;
        let rest = rest
            .strip_prefix(" attributes (")
            .ok_or_else(|| malformed(text))?;
        let (attrs_part, keys_part) = rest
            .split_once(") with keys: (")
            .ok_or_else(|| malformed(text))?;
        let keys_part = keys_part.strip_suffix(')').ok_or_else(|| malformed(text))?;

        let mut attrs = Vec::new();
        for item in attrs_part.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, ty) = item
                .split_once(':')
                .ok_or_else(|| DbError::Schema(format!("bad attribute '{item}'")))?;
            attrs.push(parse_attribute(name.trim(), ty.trim())?);
        }
        if attrs.len() != declared {
            return Err(DbError::Schema(format!(
                "declared {declared} attributes but found {}",
                attrs.len()
            )));
        }

        let mut key_attrs = Vec::new();
        for key in keys_part.split(',') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let idx = attrs
                .iter()
                .position(|a| a.name == key)
                .ok_or_else(|| DbError::Schema(format!("key '{key}' is not an attribute")))?;
            key_attrs.push(idx);
        }

        Self::try_new(attrs, key_attrs)
    }

    fn attr_checked(&self, i: usize) -> DbResult<&Attribute> {
        self.attrs.get(i).ok_or_else(|| {
            DbError::Schema(format!(
                "attribute ordinal {i} out of range for {} attributes",
                self.attrs.len()
            ))
        })
    }
}

fn malformed(text: &str) -> DbError {
    let head: String = text.chars().take(40).collect();
    DbError::Schema(format!("malformed schema text starting '{head}'"))
}

fn parse_attribute(name: &str, ty: &str) -> DbResult<Attribute> {
    match ty {
        "INT" => Ok(Attribute::new(name, DataType::Int)),
        "FLOAT" => Ok(Attribute::new(name, DataType::Float)),
        "BOOL" => Ok(Attribute::new(name, DataType::Bool)),
        _ => {
            let width = ty
                .strip_prefix("STRING[")
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(|| DbError::UnknownDataType(ty.to_string()))?;
            let width: u32 = width
                .parse()
                .map_err(|_| DbError::Schema(format!("bad string capacity '{width}'")))?;
            Ok(Attribute::string(name, width))
        }
    }
}
