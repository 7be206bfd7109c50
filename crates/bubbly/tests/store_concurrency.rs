mod support;

use bubbly::{Cx, ErrorKind};
use support::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn queries_after_save_observe_its_effects() {
    let store = Arc::new(zoo_store().await);

    for round in 1..=20 {
        store
            .save(
                &cx(),
                blocks(serde_json::json!([{
                    "tableName": "zoo",
                    "fields": [
                        {"name": "Name", "value": "Boise Zoo"},
                        {"name": "State", "value": format!("round-{round}")}
                    ]
                }])),
            )
            .await
            .unwrap();

        let result = store.query(&cx(), r#"{ zoo { State } }"#).await.unwrap();
        assert_eq!(
            result,
            serde_json::json!({"zoo": [{"State": format!("round-{round}")}]})
        );
    }
}

#[tokio::test]
async fn readers_see_either_the_old_schema_or_the_new_one() {
    let store = Arc::new(zoo_store().await);
    store.save(&cx(), boise_zoo()).await.unwrap();

    let mut evolved = zoo_tables();
    evolved[0].fields.push(
        serde_json::from_value(serde_json::json!({"name": "Country", "type": "string"})).unwrap(),
    );

    let mut readers = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..25 {
                // Queries against the new column either fully succeed (new
                // schema) or fail as unknown (old schema), never anything
                // in between.
                match store.query(&cx(), r#"{ zoo { Name Country } }"#).await {
                    Ok(result) => {
                        let rows = result["zoo"].as_array().unwrap();
                        assert_eq!(rows.len(), 1);
                        assert!(rows[0].get("Country").is_some());
                    }
                    Err(err) => assert_eq!(err.kind(), ErrorKind::UnknownField),
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    store.apply(&cx(), evolved).await.unwrap();

    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn concurrent_saves_collapse_onto_one_natural_key() {
    let store = Arc::new(zoo_store().await);

    let mut writers = Vec::new();
    for index in 0..8 {
        let store = store.clone();
        writers.push(tokio::spawn(async move {
            store
                .save(
                    &cx(),
                    blocks(serde_json::json!([{
                        "tableName": "zoo",
                        "fields": [
                            {"name": "Name", "value": "Boise Zoo"},
                            {"name": "State", "value": format!("writer-{index}")}
                        ]
                    }])),
                )
                .await
        }));
    }

    for writer in writers {
        // A writer may lose the natural-key race and surface the collision;
        // the batch never half-applies.
        match writer.await.unwrap() {
            Ok(_) => {}
            Err(err) => assert_eq!(err.kind(), ErrorKind::UniqueViolation),
        }
    }

    let result = store.query(&cx(), r#"{ zoo { Name } }"#).await.unwrap();
    assert_eq!(result["zoo"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_aborts_between_statements() {
    let store = zoo_store().await;

    let cx = Cx::new();
    cx.cancellation().cancel();

    let err = store.save(&cx, boise_zoo()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Canceled);
}

#[tokio::test]
async fn passed_deadline_surfaces_as_deadline_exceeded() {
    let store = zoo_store().await;

    let cx = Cx::new().with_deadline(Instant::now() - Duration::from_millis(1));
    let err = store.query(&cx, r#"{ zoo { Name } }"#).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}
