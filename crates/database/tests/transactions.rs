mod common;

use common::TestDatabase;
use core_types::Value;
use database::{DbError, FutureExt, UpsertTarget};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Barrier};

const ITEMS: UpsertTarget<'static> = UpsertTarget::new("items", &["id", "label", "price"], &["id"]);

fn item(id: i64, label: &str, price: rust_decimal::Decimal) -> Vec<Value> {
    vec![Value::Int(id), Value::from(label), Value::Decimal(price)]
}

#[tokio::test]
async fn upsert_is_idempotent_and_last_write_wins() {
    let db = TestDatabase::new(2, Duration::from_secs(5)).await;

    for _ in 0..2 {
        let written: u64 = db
            .service
            .run_in_transaction(|tx| {
                async move { tx.upsert(&ITEMS, &[item(1, "widget", dec!(0.86))]).await }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(written, 1);
    }
    assert_eq!(db.count_items().await, 1);

    db.service
        .run_in_transaction(|tx| {
            async move { tx.upsert(&ITEMS, &[item(1, "widget v2", dec!(0.90))]).await }.boxed()
        })
        .await
        .unwrap();

    let rows = db
        .service
        .run_in_transaction(|tx| {
            async move { tx.execute("SELECT label, price FROM items WHERE id = ?", &[Value::Int(1)]).await }
                .boxed()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_string("label").unwrap(), "widget v2");
    assert_eq!(rows[0].get_decimal("price").unwrap(), dec!(0.90));
}

#[tokio::test]
async fn body_error_rolls_back_every_statement() {
    let db = TestDatabase::new(2, Duration::from_secs(5)).await;

    let result: Result<(), DbError> = db
        .service
        .run_in_transaction(|tx| {
            async move {
                tx.upsert(&ITEMS, &[item(1, "a", dec!(1)), item(2, "b", dec!(2))])
                    .await?;
                // Fails on the duplicate key after two rows were already written.
                tx.batch_insert("items", &["id", "label", "price"], &[item(1, "dup", dec!(3))])
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(DbError::Query(_))));
    assert_eq!(db.count_items().await, 0);
}

#[tokio::test]
async fn panic_mid_scope_leaves_no_rows_and_no_leaked_connections() {
    let capacity = 3;
    let db = TestDatabase::new(capacity, Duration::from_secs(2)).await;

    let service = db.service.clone();
    let crashed = tokio::spawn(async move {
        let _: Result<(), DbError> = service
            .run_in_transaction(|tx| {
                async move {
                    tx.upsert(&ITEMS, &[item(1, "lost", dec!(1))]).await?;
                    panic!("worker crashed mid-transaction");
                }
                .boxed()
            })
            .await;
    })
    .await;
    assert!(crashed.unwrap_err().is_panic());

    assert_eq!(db.count_items().await, 0);

    // Every connection must still be obtainable at the same time.
    let barrier = Arc::new(Barrier::new(capacity as usize));
    let mut tasks = Vec::new();
    for _ in 0..capacity {
        let service = db.service.clone();
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            service
                .run_in_transaction(move |tx| {
                    async move {
                        barrier.wait().await;
                        tx.execute("SELECT 1 AS one", &[]).await
                    }
                    .boxed()
                })
                .await
        }));
    }
    for task in tasks {
        let rows = task.await.unwrap().unwrap();
        assert_eq!(rows[0].get_i64("one").unwrap(), 1);
    }
}

#[tokio::test]
async fn concurrent_scopes_hold_distinct_connections() {
    let db = TestDatabase::new(2, Duration::from_secs(5)).await;
    let barrier = Arc::new(Barrier::new(2));

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let service = db.service.clone();
        let probe = db.service.clone();
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            service
                .run_in_transaction(move |_tx| {
                    async move {
                        barrier.wait().await;
                        Ok::<_, DbError>(probe.pool_status().in_use())
                    }
                    .boxed()
                })
                .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }
}

#[tokio::test]
async fn exhausted_pool_times_out_then_recovers() {
    let db = TestDatabase::new(1, Duration::from_millis(200)).await;
    let (held_tx, held_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let service = db.service.clone();
    let holder = tokio::spawn(async move {
        service
            .run_in_transaction(move |_tx| {
                async move {
                    let _ = held_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, DbError>(())
                }
                .boxed()
            })
            .await
    });
    held_rx.await.unwrap();

    let err = db
        .service
        .run_in_transaction(|tx| async move { tx.execute("SELECT 1", &[]).await }.boxed())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::PoolExhausted { .. }), "{err}");
    assert!(err.is_retryable());

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();
    assert_eq!(db.count_items().await, 0);
}

#[tokio::test]
async fn excess_acquirer_blocks_until_release() {
    let db = TestDatabase::new(1, Duration::from_secs(5)).await;
    let (held_tx, held_rx) = oneshot::channel::<()>();

    let service = db.service.clone();
    let holder = tokio::spawn(async move {
        service
            .run_in_transaction(move |tx| {
                async move {
                    tx.upsert(&ITEMS, &[item(1, "first", dec!(1))]).await?;
                    let _ = held_tx.send(());
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok::<_, DbError>(())
                }
                .boxed()
            })
            .await
    });
    held_rx.await.unwrap();

    let started = Instant::now();
    assert_eq!(db.count_items().await, 1);
    assert!(started.elapsed() >= Duration::from_millis(100));
    holder.await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_ddl_does_not_disturb_open_transactions() {
    let db = TestDatabase::new(2, Duration::from_secs(5)).await;
    let (written_tx, written_rx) = oneshot::channel::<()>();
    let (ddl_done_tx, ddl_done_rx) = oneshot::channel::<()>();

    let service = db.service.clone();
    let writer = tokio::spawn(async move {
        service
            .run_in_transaction(move |tx| {
                async move {
                    tx.upsert(&ITEMS, &[item(7, "kept", dec!(7))]).await?;
                    let _ = written_tx.send(());
                    let _ = ddl_done_rx.await;
                    Ok::<_, DbError>(())
                }
                .boxed()
            })
            .await
    });
    written_rx.await.unwrap();

    let err = db
        .service
        .execute_ddl("CREATE TABLE broken (id INTEGER,")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Ddl { .. }));

    ddl_done_tx.send(()).unwrap();
    writer.await.unwrap().unwrap();
    assert_eq!(db.count_items().await, 1);
}

#[tokio::test]
async fn statements_run_in_issue_order_with_portable_placeholders() {
    let db = TestDatabase::new(2, Duration::from_secs(5)).await;

    let rows = db
        .service
        .run_in_transaction(|tx| {
            async move {
                let insert = format!(
                    "INSERT INTO items (id, label) VALUES ({}, {})",
                    tx.placeholder(1),
                    tx.placeholder(2)
                );
                let inserted = tx
                    .execute_many(
                        &insert,
                        &[
                            vec![Value::Int(1), Value::from("one")],
                            vec![Value::Int(2), Value::from("two")],
                        ],
                    )
                    .await?;
                assert_eq!(inserted, 2);
                tx.execute("UPDATE items SET label = 'uno' WHERE id = 1", &[])
                    .await?;
                tx.execute("SELECT id, label, price FROM items ORDER BY id", &[])
                    .await
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_string("label").unwrap(), "uno");
    assert_eq!(rows[1].get_i64("id").unwrap(), 2);
    assert!(rows[1].get("price").unwrap().is_null());
}

#[tokio::test]
async fn unsupported_urls_are_rejected() {
    let err = database::connect("mysql://root@localhost/usage", &Default::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DbError::UnsupportedUrl(_)));
}

#[tokio::test]
async fn in_memory_database_is_pinned_to_one_connection() {
    let service = database::connect("sqlite::memory:", &Default::default())
        .await
        .unwrap();
    service.execute_ddl(common::ITEMS_DDL).await.unwrap();
    service
        .run_in_transaction(|tx| async move { tx.upsert(&ITEMS, &[item(1, "m", dec!(1))]).await }.boxed())
        .await
        .unwrap();

    let status = service.pool_status();
    assert_eq!(status.capacity, 1);
    assert_eq!(service.backend_kind(), database::BackendKind::Sqlite);
    service.close().await;
}
