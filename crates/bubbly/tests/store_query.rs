mod support;

use bubbly::ErrorKind;
use support::*;

#[tokio::test]
async fn equality_argument_filters_rows() {
    let store = zoo_store().await;
    store.save(&cx(), boise_zoo()).await.unwrap();
    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [
                    {"name": "Name", "value": "Tulsa Zoo"},
                    {"name": "State", "value": "OK"}
                ]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(&cx(), r#"{ zoo(State: "ID") { Name State } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"zoo": [{"Name": "Boise Zoo", "State": "ID"}]})
    );
}

async fn capacity_fixture() -> bubbly::Store {
    let store = zoo_store().await;

    for capacity in 1..=10 {
        store
            .save(
                &cx(),
                blocks(serde_json::json!([{
                    "tableName": "zoo",
                    "fields": [{"name": "Name", "value": "Boise Zoo"}],
                    "childBlocks": [{
                        "tableName": "restaurants",
                        "fields": [
                            {"name": "Name", "value": format!("Cafe {capacity}")},
                            {"name": "Capacity", "value": capacity}
                        ]
                    }]
                }])),
            )
            .await
            .unwrap();
    }

    store
}

#[tokio::test]
async fn filter_operators_translate_to_comparisons() {
    let store = capacity_fixture().await;

    let result = store
        .query(
            &cx(),
            r#"{ restaurants(filter: {Capacity_gt: 5}) { Capacity } }"#,
        )
        .await
        .unwrap();

    // Rows 6..10, in ascending _id order.
    assert_eq!(
        result,
        serde_json::json!({
            "restaurants": [
                {"Capacity": 6}, {"Capacity": 7}, {"Capacity": 8},
                {"Capacity": 9}, {"Capacity": 10}
            ]
        })
    );
}

#[tokio::test]
async fn in_and_not_in_filters() {
    let store = capacity_fixture().await;

    let result = store
        .query(
            &cx(),
            r#"{ restaurants(filter: {Capacity_in: [2, 4]}) { Capacity } }"#,
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"restaurants": [{"Capacity": 2}, {"Capacity": 4}]})
    );

    let result = store
        .query(
            &cx(),
            r#"{ restaurants(filter: {Capacity_not_in: [1, 2, 3, 4, 5, 6, 7, 8]}) { Capacity } }"#,
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"restaurants": [{"Capacity": 9}, {"Capacity": 10}]})
    );
}

#[tokio::test]
async fn order_by_and_pagination() {
    let store = capacity_fixture().await;

    let result = store
        .query(
            &cx(),
            r#"{ restaurants(order_by: {Capacity: desc}, first: 3) { Capacity } }"#,
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({
            "restaurants": [{"Capacity": 10}, {"Capacity": 9}, {"Capacity": 8}]
        })
    );

    // `last` returns the final rows in their natural order.
    let result = store
        .query(&cx(), r#"{ restaurants(last: 2) { Capacity } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"restaurants": [{"Capacity": 9}, {"Capacity": 10}]})
    );
}

#[tokio::test]
async fn filter_on_keeps_only_parents_with_matching_children() {
    let store = zoo_store().await;

    store
        .save(
            &cx(),
            blocks(serde_json::json!([
                {
                    "tableName": "zoo",
                    "fields": [{"name": "Name", "value": "Boise Zoo"}],
                    "childBlocks": [{
                        "tableName": "shops",
                        "fields": [
                            {"name": "Name", "value": "Gift"},
                            {"name": "Open", "value": true}
                        ]
                    }]
                },
                {
                    "tableName": "zoo",
                    "fields": [{"name": "Name", "value": "Tulsa Zoo"}],
                    "childBlocks": [{
                        "tableName": "shops",
                        "fields": [
                            {"name": "Name", "value": "Kiosk"},
                            {"name": "Open", "value": false}
                        ]
                    }]
                }
            ])),
        )
        .await
        .unwrap();

    // Without filter_on, both zoos come back, one with an empty list.
    let result = store
        .query(&cx(), r#"{ zoo { Name shops(Open: true) { Name } } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({
            "zoo": [
                {"Name": "Boise Zoo", "shops": [{"Name": "Gift"}]},
                {"Name": "Tulsa Zoo", "shops": []}
            ]
        })
    );

    // With filter_on, the childless parent is dropped.
    let result = store
        .query(
            &cx(),
            r#"{ zoo { Name shops(Open: true, filter_on: true) { Name } } }"#,
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({
            "zoo": [{"Name": "Boise Zoo", "shops": [{"Name": "Gift"}]}]
        })
    );
}

#[tokio::test]
async fn round_trips_a_saved_tree() {
    let store = zoo_store().await;
    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [
                    {"name": "Name", "value": "Boise Zoo"},
                    {"name": "State", "value": "ID"}
                ],
                "childBlocks": [{
                    "tableName": "shops",
                    "fields": [
                        {"name": "Name", "value": "Gift"},
                        {"name": "Open", "value": true}
                    ]
                }]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(
            &cx(),
            r#"{ zoo { _id Name State shops { _id Name Open } } }"#,
        )
        .await
        .unwrap();

    // Structurally equal to the input tree, modulo `_id` (exposed as a
    // string) on every row.
    assert_eq!(
        result,
        serde_json::json!({
            "zoo": [{
                "_id": "1",
                "Name": "Boise Zoo",
                "State": "ID",
                "shops": [{"_id": "1", "Name": "Gift", "Open": true}]
            }]
        })
    );
}

#[tokio::test]
async fn one_to_one_edges_are_scalar() {
    let store = zoo_store().await;
    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [{"name": "Name", "value": "Boise Zoo"}],
                "childBlocks": [{
                    "tableName": "office",
                    "fields": [{"name": "Phone", "value": "208-555-0100"}]
                }]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(&cx(), r#"{ zoo { office { Phone } } }"#)
        .await
        .unwrap();

    // OneToOne: an object, not a one-element list.
    assert_eq!(
        result,
        serde_json::json!({"zoo": [{"office": {"Phone": "208-555-0100"}}]})
    );
}

#[tokio::test]
async fn unknown_table_and_field_are_typed_errors() {
    let store = zoo_store().await;

    let err = store
        .query(&cx(), r#"{ aquarium { Name } }"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTable);

    let err = store
        .query(&cx(), r#"{ zoo { Altitude } }"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownField);
}

#[tokio::test]
async fn filter_value_type_mismatch_is_rejected() {
    let store = zoo_store().await;

    let err = store
        .query(&cx(), r#"{ zoo(_id: "not-a-row-id") { Name } }"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[tokio::test]
async fn query_by_id_argument() {
    let store = zoo_store().await;
    store.save(&cx(), boise_zoo()).await.unwrap();
    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [{"name": "Name", "value": "Tulsa Zoo"}]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(&cx(), r#"{ zoo(_id: "2") { Name } }"#)
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!({"zoo": [{"Name": "Tulsa Zoo"}]}));
}
