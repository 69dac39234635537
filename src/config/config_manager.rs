// ==========================================
// 双轨会员网络管理系统 - 配置管理器
// ==========================================
// 依据: Network_Master_Spec.md - PART C 策略配置全集
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::network_policy_trait::NetworkPolicyReader;
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 参数
    /// - key: 配置键
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(
        &self,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    ///
    /// # 参数
    /// - key: 配置键
    /// - default: 默认值
    fn get_config_or_default(
        &self,
        key: &str,
        default: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 的配置值（UPSERT）
    ///
    /// # 参数
    /// - key: 配置键
    /// - value: 配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 配置快照的JSON字符串
    /// - Err: 获取失败
    ///
    /// # 用途
    /// - 在存量导入/批量回放前记录策略快照
    /// - 审计时追溯当时生效的安置/汇总口径
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?;

        // 查询所有global scope的配置
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        // 序列化为JSON
        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 参数
    /// - snapshot_json: 配置快照的JSON字符串
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    /// - Err: 恢复失败
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    /// - 仅用于环境迁移/演练回退场景
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        // 解析JSON
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?;

        // 开启事务
        conn.execute("BEGIN TRANSACTION", [])?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            // 使用UPSERT语法（SQLite 3.24.0+）
            let affected = conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        // 提交事务
        conn.execute("COMMIT", [])?;

        Ok(count)
    }
}

// ==========================================
// NetworkPolicyReader Trait 实现
// ==========================================
impl NetworkPolicyReader for ConfigManager {
    // ===== 安置策略 =====

    fn max_spillover_depth(&self) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let value =
            self.get_config_or_default(config_keys::PLACEMENT_MAX_SPILLOVER_DEPTH, "16")?;
        let depth = value.trim().parse::<i64>().unwrap_or(16);
        // 深度下限为 1, 防止把搜索边界配置成 0 后所有安置都报容量不足
        Ok(depth.max(1))
    }

    // ===== 汇总口径 =====

    fn count_withdrawn_in_rollup(&self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let value = self.get_config_or_default(config_keys::ROLLUP_COUNT_WITHDRAWN, "1")?;
        match value.trim().to_lowercase().as_str() {
            "0" | "false" | "no" => Ok(false),
            _ => Ok(true), // 默认计入
        }
    }

    // ===== 存量导入 =====

    fn import_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let value = self.get_config_or_default(config_keys::IMPORT_BATCH_SIZE, "500")?;
        let size = value.trim().parse::<usize>().unwrap_or(500);
        Ok(size.max(1))
    }

    // ===== 对账 =====

    fn reconcile_scan_page_size(&self) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let value = self.get_config_or_default(config_keys::RECONCILE_SCAN_PAGE_SIZE, "1000")?;
        let size = value.trim().parse::<i64>().unwrap_or(1000);
        Ok(size.max(1))
    }

    // ===== 伞下查询 =====

    fn genealogy_page_size(&self) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let value = self.get_config_or_default(config_keys::GENEALOGY_PAGE_SIZE, "500")?;
        let size = value.trim().parse::<i64>().unwrap_or(500);
        Ok(size.max(1))
    }
}

// ==========================================
// 配置键常量 (依据 Network_Master_Spec PART C)
// ==========================================
pub mod config_keys {
    // 安置策略
    pub const PLACEMENT_MAX_SPILLOVER_DEPTH: &str = "placement/max_spillover_depth";

    // 汇总口径
    pub const ROLLUP_COUNT_WITHDRAWN: &str = "rollup/count_withdrawn";

    // 存量导入
    pub const IMPORT_BATCH_SIZE: &str = "import/batch_size";

    // 对账
    pub const RECONCILE_SCAN_PAGE_SIZE: &str = "reconcile/scan_page_size";

    // 伞下查询
    pub const GENEALOGY_PAGE_SIZE: &str = "genealogy/page_size";
}
