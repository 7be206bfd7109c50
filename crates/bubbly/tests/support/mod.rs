#![allow(dead_code)]

use bubbly::schema::Table;
use bubbly::{Cx, DataBlocks, Sqlite, Store};

use std::sync::Arc;

pub fn cx() -> Cx {
    Cx::new()
}

pub async fn store() -> Store {
    Store::open(Arc::new(Sqlite::in_memory().unwrap()))
        .await
        .unwrap()
}

pub fn tables(json: serde_json::Value) -> Vec<Table> {
    serde_json::from_value(json).unwrap()
}

pub fn blocks(json: serde_json::Value) -> DataBlocks {
    serde_json::from_value(json).unwrap()
}

/// The menagerie: a zoo with restaurants, shops, and a single office.
pub fn zoo_tables() -> Vec<Table> {
    tables(serde_json::json!([
        {
            "name": "zoo",
            "fields": [
                {"name": "Name", "type": "string", "unique": true},
                {"name": "State", "type": "string"}
            ],
            "tables": [
                {
                    "name": "restaurants",
                    "fields": [
                        {"name": "Name", "type": "string", "unique": true},
                        {"name": "Capacity", "type": "number"}
                    ]
                },
                {
                    "name": "shops",
                    "fields": [
                        {"name": "Name", "type": "string", "unique": true},
                        {"name": "Open", "type": "bool"}
                    ]
                },
                {
                    "name": "office",
                    "single": true,
                    "fields": [{"name": "Phone", "type": "string"}]
                }
            ]
        }
    ]))
}

pub fn boise_zoo() -> DataBlocks {
    blocks(serde_json::json!([
        {
            "tableName": "zoo",
            "fields": [
                {"name": "Name", "value": "Boise Zoo"},
                {"name": "State", "value": "ID"}
            ]
        }
    ]))
}

pub async fn zoo_store() -> Store {
    let store = store().await;
    store.apply(&cx(), zoo_tables()).await.unwrap();
    store
}
