// ==========================================
// 双轨会员网络管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建库入口，新库一律经 init_schema 建表
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
///
/// 红线:
/// - network_position 行只增不删, 结构字段 (parent_id/position_type/level/hierarchy_path) 建库后不可变
/// - 槽位唯一性/根唯一性/在网会员唯一性由部分唯一索引兜底, 引擎层校验之外的最后一道防线
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS network_position (
          position_id TEXT PRIMARY KEY,
          parent_id TEXT REFERENCES network_position(position_id),
          position_type TEXT NOT NULL CHECK(position_type IN ('ROOT', 'LEFT', 'RIGHT')),
          level INTEGER NOT NULL CHECK(level >= 0),
          hierarchy_path TEXT NOT NULL UNIQUE,
          seq_no INTEGER NOT NULL UNIQUE,
          occupant_kind TEXT NOT NULL CHECK(occupant_kind IN ('MEMBER', 'WITHDRAWAL')),
          member_id TEXT,
          member_name TEXT,
          withdrawal_member_no TEXT,
          withdrawal_name TEXT,
          withdrawn_on TEXT,
          left_count INTEGER NOT NULL DEFAULT 0 CHECK(left_count >= 0),
          right_count INTEGER NOT NULL DEFAULT 0 CHECK(right_count >= 0),
          own_sales TEXT NOT NULL DEFAULT '0',
          left_sales TEXT NOT NULL DEFAULT '0',
          right_sales TEXT NOT NULL DEFAULT '0',
          created_at TEXT NOT NULL DEFAULT (datetime('now')),
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 每个父点位的 LEFT/RIGHT 槽位至多各落位一次
        CREATE UNIQUE INDEX IF NOT EXISTS idx_position_slot
          ON network_position(parent_id, position_type)
          WHERE position_type != 'ROOT';

        -- 全网唯一根点位
        CREATE UNIQUE INDEX IF NOT EXISTS idx_position_single_root
          ON network_position(position_type)
          WHERE position_type = 'ROOT';

        -- 同一会员同时至多占一个在网点位
        CREATE UNIQUE INDEX IF NOT EXISTS idx_position_active_member
          ON network_position(member_id)
          WHERE occupant_kind = 'MEMBER';

        CREATE INDEX IF NOT EXISTS idx_position_parent
          ON network_position(parent_id);

        CREATE INDEX IF NOT EXISTS idx_position_level_seq
          ON network_position(level, seq_no);

        CREATE INDEX IF NOT EXISTS idx_position_withdrawal_no
          ON network_position(withdrawal_member_no);

        CREATE TABLE IF NOT EXISTS action_log (
          action_id TEXT PRIMARY KEY,
          position_id TEXT REFERENCES network_position(position_id),
          action_type TEXT NOT NULL,
          action_ts TEXT NOT NULL,
          actor TEXT NOT NULL,
          payload_json TEXT,
          detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_ts
          ON action_log(action_ts);

        CREATE INDEX IF NOT EXISTS idx_action_log_position
          ON action_log(position_id, action_ts);

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(v)
}
