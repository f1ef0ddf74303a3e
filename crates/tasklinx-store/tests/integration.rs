//! Integration tests for the tasklinx-store crate.
//!
//! These run against a real SQLite database on disk (via tempfile) and
//! cover the history retention cap, ordering, reopen durability, and
//! concurrent appends.

use std::collections::BTreeMap;

use serde_json::json;
use tasklinx_store::{
    ActionType, CredentialStore, Database, ExecutionResult, FailureKind, HISTORY_RETENTION,
    HistoryStore, Interpretation, TaskRecord, TaskStatus, UserCredentials,
};

fn email_record(n: usize) -> TaskRecord {
    let interpretation = Interpretation {
        action_type: ActionType::Email,
        parameters: BTreeMap::from([
            ("to".to_string(), "alice@example.com".to_string()),
            ("subject".to_string(), format!("note {n}")),
            ("body".to_string(), "hello".to_string()),
        ]),
        confidence: 0.95,
        reasoning: "explicit email request".into(),
        raw_response: None,
        failure: None,
    };
    let result = if n % 2 == 0 {
        ExecutionResult::ok(json!({"message_id": format!("m{n}")}))
    } else {
        ExecutionResult::failure(FailureKind::Retryable, "Failed to send email: timeout")
    };
    TaskRecord::stamp(&format!("task number {n}"), interpretation, result)
}

// ═══════════════════════════════════════════════════════════════════════
//  History
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn append_then_list_returns_new_record_first() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let history = HistoryStore::new(db);

    for n in 0..5 {
        history.append("u1", &email_record(n)).await.unwrap();
    }
    let latest = email_record(99);
    history.append("u1", &latest).await.unwrap();

    let listed = history.list("u1", 20).await.unwrap();
    assert_eq!(listed.len(), 6);
    assert_eq!(listed[0].id, latest.id);
}

#[tokio::test]
async fn history_is_capped_at_most_recent_hundred() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let history = HistoryStore::new(db);

    let mut appended = Vec::new();
    for n in 0..105 {
        let record = email_record(n);
        appended.push(record.id.clone());
        history.append("u1", &record).await.unwrap();
    }

    let listed = history.list("u1", 1_000).await.unwrap();
    assert_eq!(listed.len(), HISTORY_RETENTION);

    let expected: Vec<String> = appended.iter().rev().take(100).cloned().collect();
    let got: Vec<String> = listed.iter().map(|r| r.id.clone()).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn status_stays_consistent_with_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let history = HistoryStore::new(db);

    for n in 0..4 {
        history.append("u1", &email_record(n)).await.unwrap();
    }

    for record in history.list("u1", 20).await.unwrap() {
        let expected = if record.result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        assert_eq!(record.status, expected);
    }
}

#[tokio::test]
async fn concurrent_appends_for_same_user_all_survive() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let history = HistoryStore::new(db);

    let first = email_record(1);
    let second = email_record(2);
    let (a, b) = tokio::join!(history.append("u1", &first), history.append("u1", &second));
    a.unwrap();
    b.unwrap();

    let ids: Vec<String> = history
        .list("u1", 20)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&second.id));
}

#[tokio::test]
async fn many_concurrent_appends_respect_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("tasklinx.db"))
        .await
        .unwrap();
    let history = HistoryStore::new(db);

    let mut handles = Vec::new();
    for n in 0..120 {
        let history = history.clone();
        handles.push(tokio::spawn(async move {
            let record = email_record(n);
            history.append("u1", &record).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(history.count("u1").await.unwrap(), HISTORY_RETENTION);
}

// ═══════════════════════════════════════════════════════════════════════
//  Durability
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tasklinx.db");

    let record = email_record(0);
    {
        let db = Database::open_and_migrate(db_path.clone()).await.unwrap();
        HistoryStore::new(db.clone())
            .append("u1", &record)
            .await
            .unwrap();
        CredentialStore::new(db)
            .put(&UserCredentials {
                user_id: "u1".into(),
                access_token: "at".into(),
                refresh_token: Some("rt".into()),
                token_uri: "https://oauth2.googleapis.com/token".into(),
                client_id: "cid".into(),
                client_secret: "cs".into(),
                scopes: ["openid".to_string()].into_iter().collect(),
                expiry: None,
            })
            .await
            .unwrap();
    }

    let db = Database::open_and_migrate(db_path).await.unwrap();
    let listed = HistoryStore::new(db.clone()).list("u1", 5).await.unwrap();
    assert_eq!(listed, vec![record]);

    let creds = CredentialStore::new(db).get("u1").await.unwrap().unwrap();
    assert_eq!(creds.access_token, "at");
    assert_eq!(creds.refresh_token.as_deref(), Some("rt"));
}
