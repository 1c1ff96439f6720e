//! Entity contract, runtime type descriptor and request-scoped dynamic instances.

use crate::error::CrudError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::any::TypeId;
use std::fmt;

/// Any value stored as a row. The table name locates it in storage and derives its route.
pub trait Entity: Send + Sync {
    fn table_name(&self) -> &str;
}

/// Runtime descriptor of an entity type, captured once at registration.
///
/// Stands in for reflection: it knows how to build a zero-valued instance of
/// the type and how to force an arbitrary JSON object into its exact shape.
#[derive(Clone, Copy)]
pub struct TableType {
    type_name: &'static str,
    type_id: TypeId,
    zero: fn() -> Result<Value, serde_json::Error>,
    conform: fn(Value) -> Result<Value, serde_json::Error>,
}

impl TableType {
    pub fn of<E>() -> Self
    where
        E: Entity + Default + Serialize + DeserializeOwned + 'static,
    {
        TableType {
            type_name: std::any::type_name::<E>(),
            type_id: TypeId::of::<E>(),
            zero: || serde_json::to_value(E::default()),
            conform: |v| serde_json::from_value::<E>(v).and_then(|e| serde_json::to_value(&e)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fresh zero-valued instance.
    pub fn new_instance(&self) -> Result<Instance, CrudError> {
        match (self.zero)()? {
            Value::Object(fields) => Ok(Instance { fields }),
            _ => Err(CrudError::InvalidBody),
        }
    }

    /// Field names of the zero instance, in serialization order.
    pub fn fields(&self) -> Vec<String> {
        match (self.zero)() {
            Ok(Value::Object(fields)) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableType").field("type_name", &self.type_name).finish()
    }
}

impl PartialEq for TableType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// A request-scoped value of an entity type, held as a JSON object carrying exactly the entity's fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    fields: Map<String, Value>,
}

impl Instance {
    /// Overlay a JSON body on the zero instance of `table_type`; fields the body omits or sets to null stay zero.
    pub fn decode(table_type: &TableType, body: &[u8]) -> Result<Self, CrudError> {
        let decoded: Value = serde_json::from_slice(body)?;
        let Value::Object(mut overlay) = decoded else {
            return Err(CrudError::InvalidBody);
        };
        overlay.retain(|_, v| !v.is_null());
        let mut instance = table_type.new_instance()?;
        instance.fields.extend(overlay);
        instance.conform(table_type)?;
        Ok(instance)
    }

    /// Re-shape the fields through the entity type: unknown keys drop, wrong types fail.
    pub fn conform(&mut self, table_type: &TableType) -> Result<(), CrudError> {
        let fields = std::mem::take(&mut self.fields);
        match (table_type.conform)(Value::Object(fields))? {
            Value::Object(fields) => {
                self.fields = fields;
                Ok(())
            }
            _ => Err(CrudError::InvalidBody),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Absent, null, `0`, `""`, `false` and empty containers are zero.
    pub fn is_zero(&self, field: &str) -> bool {
        self.fields.get(field).map_or(true, is_zero_value)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Instance {
    fn from(fields: Map<String, Value>) -> Self {
        Instance { fields }
    }
}

pub fn is_zero_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
