use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();

    conn.execute(
        r#"
        CREATE TABLE action_log (
            action_id TEXT PRIMARY KEY,
            position_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        )
        "#,
        [],
    )
    .unwrap();

    Arc::new(Mutex::new(conn))
}

fn make_test_log(action_id: &str, position_id: &str, actor: &str) -> ActionLog {
    ActionLog {
        action_id: action_id.to_string(),
        position_id: Some(position_id.to_string()),
        action_type: ActionType::Place.as_str().to_string(),
        action_ts: Utc::now().naive_utc(),
        actor: actor.to_string(),
        payload_json: None,
        detail: Some("Test log".to_string()),
    }
}

#[test]
fn test_insert_and_find_by_id() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let log = make_test_log("log1", "P001", "user1");
    let result = repo.insert(&log);

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "log1");

    let found = repo.find_by_id("log1").unwrap();
    assert!(found.is_some());

    let found_log = found.unwrap();
    assert_eq!(found_log.action_id, "log1");
    assert_eq!(found_log.position_id, Some("P001".to_string()));
    assert_eq!(found_log.actor, "user1");
}

#[test]
fn test_insert_without_position() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    // 导入等系统级操作不关联点位
    let mut log = make_test_log("log1", "P001", "system");
    log.position_id = None;
    log.action_type = ActionType::Import.as_str().to_string();

    repo.insert(&log).unwrap();

    let found = repo.find_by_id("log1").unwrap().unwrap();
    assert!(found.position_id.is_none());
    assert_eq!(found.action_type, "Import");
}

#[test]
fn test_find_by_position_id() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let log1 = make_test_log("log1", "P001", "user1");
    let log2 = make_test_log("log2", "P001", "user2");
    let log3 = make_test_log("log3", "P002", "user1");

    repo.insert(&log1).unwrap();
    repo.insert(&log2).unwrap();
    repo.insert(&log3).unwrap();

    let logs = repo.find_by_position_id("P001").unwrap();

    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|l| l.action_id == "log1"));
    assert!(logs.iter().any(|l| l.action_id == "log2"));
}

#[test]
fn test_find_by_actor() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let log1 = make_test_log("log1", "P001", "user1");
    let log2 = make_test_log("log2", "P001", "user1");
    let log3 = make_test_log("log3", "P001", "user2");

    repo.insert(&log1).unwrap();
    repo.insert(&log2).unwrap();
    repo.insert(&log3).unwrap();

    let logs = repo.find_by_actor("user1", 10).unwrap();

    assert_eq!(logs.len(), 2);
}

#[test]
fn test_find_by_action_type() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let mut log1 = make_test_log("log1", "P001", "user1");
    log1.action_type = ActionType::Place.as_str().to_string();

    let mut log2 = make_test_log("log2", "P001", "user1");
    log2.action_type = ActionType::Withdraw.as_str().to_string();

    let mut log3 = make_test_log("log3", "P002", "user1");
    log3.action_type = ActionType::Place.as_str().to_string();

    repo.insert(&log1).unwrap();
    repo.insert(&log2).unwrap();
    repo.insert(&log3).unwrap();

    let logs = repo.find_by_action_type("Place", 10).unwrap();

    assert_eq!(logs.len(), 2);
}

#[test]
fn test_find_recent() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    for i in 1..=5 {
        let log = make_test_log(&format!("log{}", i), "P001", "user1");
        repo.insert(&log).unwrap();
    }

    let logs = repo.find_recent(3).unwrap();

    assert_eq!(logs.len(), 3);
}

#[test]
fn test_batch_insert() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let logs = vec![
        make_test_log("log1", "P001", "user1"),
        make_test_log("log2", "P001", "user1"),
        make_test_log("log3", "P001", "user1"),
    ];

    let result = repo.batch_insert(logs);

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 3);

    let all_logs = repo.find_by_position_id("P001").unwrap();
    assert_eq!(all_logs.len(), 3);
}

#[test]
fn test_count_by_position() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    repo.insert(&make_test_log("log1", "P001", "user1")).unwrap();
    repo.insert(&make_test_log("log2", "P001", "user1")).unwrap();
    repo.insert(&make_test_log("log3", "P002", "user1")).unwrap();

    let count = repo.count_by_position("P001").unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_find_by_time_range_and_payload_roundtrip() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let t1 = NaiveDateTime::parse_from_str("2026-02-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let t2 = NaiveDateTime::parse_from_str("2026-02-10 11:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let t3 = NaiveDateTime::parse_from_str("2026-02-11 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();

    let mut log1 = make_test_log("log1", "P001", "user1");
    log1.action_ts = t1;
    log1.payload_json = Some(serde_json::json!({"upline": "P000", "slot": "LEFT"}));
    repo.insert(&log1).unwrap();

    let mut log2 = make_test_log("log2", "P001", "user1");
    log2.action_ts = t2;
    repo.insert(&log2).unwrap();

    let mut log3 = make_test_log("log3", "P001", "user1");
    log3.action_ts = t3;
    repo.insert(&log3).unwrap();

    let start = NaiveDateTime::parse_from_str("2026-02-10 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let end = NaiveDateTime::parse_from_str("2026-02-10 23:59:59", "%Y-%m-%d %H:%M:%S").unwrap();

    let logs = repo.find_by_time_range(start, end).unwrap();
    assert_eq!(logs.len(), 2);

    // payload JSON 可完整读回
    let found = repo.find_by_id("log1").unwrap().unwrap();
    let payload = found.payload_json.unwrap();
    assert_eq!(payload["slot"], "LEFT");
}
