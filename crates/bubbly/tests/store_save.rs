mod support;

use bubbly::ErrorKind;
use support::*;

#[tokio::test]
async fn save_returns_root_row_ids() {
    let store = zoo_store().await;

    let ids = store.save(&cx(), boise_zoo()).await.unwrap();
    assert_eq!(ids, [1]);

    let ids = store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [{"name": "Name", "value": "Tulsa Zoo"}]
            }])),
        )
        .await
        .unwrap();
    assert_eq!(ids, [2]);
}

#[tokio::test]
async fn saving_twice_upserts_by_natural_key() {
    let store = zoo_store().await;

    store.save(&cx(), boise_zoo()).await.unwrap();
    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [
                    {"name": "Name", "value": "Boise Zoo"},
                    {"name": "State", "value": "Idaho"}
                ]
            }])),
        )
        .await
        .unwrap();

    // Exactly one row, carrying the latest State.
    let result = store
        .query(&cx(), r#"{ zoo { Name State } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"zoo": [{"Name": "Boise Zoo", "State": "Idaho"}]})
    );
}

#[tokio::test]
async fn nested_blocks_join_on_the_parent_row() {
    let store = zoo_store().await;

    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [{"name": "Name", "value": "Boise Zoo"}],
                "childBlocks": [
                    {
                        "tableName": "shops",
                        "fields": [
                            {"name": "Name", "value": "Gift"},
                            {"name": "Open", "value": true}
                        ]
                    }
                ]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(&cx(), r#"{ zoo { Name shops { Name Open } } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({
            "zoo": [{"Name": "Boise Zoo", "shops": [{"Name": "Gift", "Open": true}]}]
        })
    );

    // The belongs-to direction is traversable too.
    let result = store
        .query(&cx(), r#"{ shops { Name zoo { Name } } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({
            "shops": [{"Name": "Gift", "zoo": {"Name": "Boise Zoo"}}]
        })
    );
}

#[tokio::test]
async fn child_block_may_reference_its_parent_by_natural_key() {
    let store = zoo_store().await;
    store.save(&cx(), boise_zoo()).await.unwrap();

    store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "shops",
                "fields": [
                    {"name": "Name", "value": "Gift"},
                    {"name": "zoo", "value": {"Name": "Boise Zoo"}}
                ]
            }])),
        )
        .await
        .unwrap();

    let result = store
        .query(&cx(), r#"{ zoo { Name shops { Name } } }"#)
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
async fn unresolved_parent_fails_the_batch() {
    let store = zoo_store().await;

    let err = store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "shops",
                "fields": [
                    {"name": "Name", "value": "Gift"},
                    {"name": "zoo", "value": {"Name": "No Such Zoo"}}
                ]
            }])),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedParent);

    // The batch rolled back: no shop row was created.
    let result = store.query(&cx(), r#"{ shops { Name } }"#).await.unwrap();
    assert_eq!(result, serde_json::json!({"shops": []}));
}

#[tokio::test]
async fn type_mismatch_names_the_offending_field() {
    let store = zoo_store().await;

    let err = store
        .save(
            &cx(),
            blocks(serde_json::json!([{
                "tableName": "shops",
                "fields": [{"name": "Open", "value": "definitely"}]
            }])),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(err.to_string().contains("`shops`"));
    assert!(err.to_string().contains("`Open`"));
}

#[tokio::test]
async fn unknown_table_in_data_is_rejected() {
    let store = zoo_store().await;

    let err = store
        .save(
            &cx(),
            blocks(serde_json::json!([{"tableName": "aquarium"}])),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTable);
}

#[tokio::test]
async fn single_child_upserts_through_its_parent() {
    let store = zoo_store().await;

    for phone in ["208-555-0100", "208-555-0199"] {
        store
            .save(
                &cx(),
                blocks(serde_json::json!([{
                    "tableName": "zoo",
                    "fields": [{"name": "Name", "value": "Boise Zoo"}],
                    "childBlocks": [{
                        "tableName": "office",
                        "fields": [{"name": "Phone", "value": phone}]
                    }]
                }])),
            )
            .await
            .unwrap();
    }

    // `single = true`: the office's identity is its parent, so the second
    // save updated the same row.
    let result = store
        .query(&cx(), r#"{ zoo { office { Phone } } }"#)
        .await
        .unwrap();
    assert_eq!(
        result,
        serde_json::json!({"zoo": [{"office": {"Phone": "208-555-0199"}}]})
    );
}
