use serde::{Deserialize, Serialize};

/// A user-declared table: named, typed fields, nested child tables, and
/// explicit joins to other tables.
///
/// Unknown keys in a description are rejected at the decode boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Table {
    /// Name of the table, globally unique within the schema.
    pub name: String,

    /// Fields contained by the table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,

    /// Nested child tables. Every child implicitly belongs to this table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,

    /// Explicit joins: this table belongs to each named table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<Join>,

    /// When `true`, the parent has at most one such child.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub single: bool,

    /// When `true`, the implicit parent foreign key joins the table's
    /// natural key.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub unique: bool,
}

/// A declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    /// The field name.
    pub name: String,

    /// The declared type.
    #[serde(rename = "type")]
    pub ty: FieldType,

    /// When `true`, the field joins the table's natural key.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub unique: bool,
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Number,
    String,
    Object,
    Map,
    List,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "Bool",
            FieldType::Number => "Number",
            FieldType::String => "String",
            FieldType::Object => "Object",
            FieldType::Map => "Map",
            FieldType::List => "List",
        }
    }
}

/// A declared belongs-to reference from a table to a parent table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Join {
    /// Name of the parent table.
    pub table: String,

    /// When `true`, the parent has at most one such child.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub single: bool,

    /// When `true`, the implicit foreign key joins the child's natural key.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub unique: bool,
}

impl Table {
    /// The fields that join the table's natural key, in declaration order.
    pub fn unique_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.unique)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_from_description() {
        let table: Table = serde_json::from_value(serde_json::json!({
            "name": "zoo",
            "fields": [
                {"name": "Name", "type": "string", "unique": true},
                {"name": "State", "type": "string"}
            ],
            "tables": [
                {"name": "shops", "fields": [{"name": "Open", "type": "bool"}]}
            ]
        }))
        .unwrap();

        assert_eq!(table.name, "zoo");
        assert_eq!(table.fields.len(), 2);
        assert!(table.fields[0].unique);
        assert_eq!(table.fields[1].ty, FieldType::String);
        assert_eq!(table.tables.len(), 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Table, _> = serde_json::from_value(serde_json::json!({
            "name": "zoo",
            "color": "blue"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn serialization_round_trips() {
        let table: Table = serde_json::from_value(serde_json::json!({
            "name": "zoo",
            "fields": [{"name": "Name", "type": "string", "unique": true}],
            "joins": [{"table": "city", "unique": true}]
        }))
        .unwrap();

        let json = serde_json::to_value(&table).unwrap();
        let back: Table = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, table.name);
        assert_eq!(back.joins[0].table, "city");
        assert!(back.joins[0].unique);
    }
}
