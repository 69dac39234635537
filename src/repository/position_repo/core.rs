use crate::domain::occupant::{Occupant, WithdrawalRef};
use crate::domain::position::{Position, RollupUpdate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// PositionRepository - 点位仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射与事务边界
pub struct PositionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PositionRepository {
    /// 创建新的点位仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入根点位
    ///
    /// # 事务内保证
    /// - 全网至多一个根点位
    /// - seq_no 原子分配 (MAX+1)
    ///
    /// # 返回
    /// - `Ok(seq_no)`: 分配到的落位序号
    pub fn insert_root(&self, position: &Position) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let root_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM network_position WHERE position_type = 'ROOT'",
            [],
            |row| row.get(0),
        )?;
        if root_count > 0 {
            return Err(RepositoryError::BusinessRuleViolation(
                "根点位已存在, 不允许重复创建".to_string(),
            ));
        }

        let seq_no = Self::next_seq_no(&tx)?;
        Self::insert_position_row(&tx, position, seq_no)?;

        tx.commit()?;
        Ok(seq_no)
    }

    /// 插入安置落位 (新点位 + 祖先链汇总更新, 单事务)
    ///
    /// # 事务内保证
    /// - 目标槽位复核: 父点位同侧已有子点位则整体回滚
    /// - 父点位存在性复核
    /// - seq_no 原子分配
    /// - 祖先链汇总与落位同时可见 (不存在半更新状态)
    ///
    /// # 返回
    /// - `Ok(seq_no)`: 分配到的落位序号
    /// - `Err(SlotOccupied)`: 槽位在读取与提交之间被占用
    pub fn insert_placement(
        &self,
        position: &Position,
        rollup_updates: &[RollupUpdate],
    ) -> RepositoryResult<i64> {
        let parent_id = position.parent_id.as_ref().ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "parent_id".to_string(),
                message: "安置落位必须有父点位".to_string(),
            }
        })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 1. 父点位存在性复核
        let parent_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM network_position WHERE position_id = ?",
            params![parent_id],
            |row| row.get(0),
        )?;
        if parent_exists == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Position".to_string(),
                id: parent_id.clone(),
            });
        }

        // 2. 槽位复核 (唯一索引之外的显式检查, 返回可判别错误)
        let slot_taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM network_position WHERE parent_id = ? AND position_type = ?",
            params![parent_id, position.position_type.to_db_str()],
            |row| row.get(0),
        )?;
        if slot_taken > 0 {
            return Err(RepositoryError::SlotOccupied {
                parent_id: parent_id.clone(),
                position_type: position.position_type.to_db_str().to_string(),
            });
        }

        // 3. 落位 + 祖先链汇总
        let seq_no = Self::next_seq_no(&tx)?;
        Self::insert_position_row(&tx, position, seq_no)?;
        Self::apply_rollup_updates_in_tx(&tx, rollup_updates)?;

        tx.commit()?;
        Ok(seq_no)
    }

    /// 退网占位替换 (只替换占位人, 不触碰结构与汇总字段)
    ///
    /// # 事务内保证
    /// - 仅当当前占位为 MEMBER 时生效 (条件更新)
    /// - 更新失败时区分 NotFound 与重复退网
    pub fn convert_to_withdrawal(
        &self,
        position_id: &str,
        withdrawal: &WithdrawalRef,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = chrono::Utc::now().naive_utc();

        let rows_affected = conn.execute(
            r#"UPDATE network_position
               SET occupant_kind = 'WITHDRAWAL',
                   withdrawal_member_no = ?,
                   withdrawal_name = ?,
                   withdrawn_on = ?,
                   member_id = NULL,
                   member_name = NULL,
                   updated_at = ?
               WHERE position_id = ? AND occupant_kind = 'MEMBER'"#,
            params![
                withdrawal.member_no,
                withdrawal.display_name,
                withdrawal.withdrawn_on.format("%Y-%m-%d").to_string(),
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                position_id,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是已经退网
            let kind: Result<String, _> = conn.query_row(
                "SELECT occupant_kind FROM network_position WHERE position_id = ?",
                params![position_id],
                |row| row.get(0),
            );
            return match kind {
                Ok(k) => Err(RepositoryError::InvalidStateTransition {
                    from: k,
                    to: "WITHDRAWAL".to_string(),
                }),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(RepositoryError::NotFound {
                    entity: "Position".to_string(),
                    id: position_id.to_string(),
                }),
                Err(e) => Err(e.into()),
            };
        }

        Ok(())
    }

    /// 更新自身业绩并连同祖先链汇总单事务提交
    pub fn update_own_sales(
        &self,
        position_id: &str,
        own_sales: rust_decimal::Decimal,
        rollup_updates: &[RollupUpdate],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        let rows_affected = tx.execute(
            "UPDATE network_position SET own_sales = ?, updated_at = ? WHERE position_id = ?",
            params![
                own_sales.to_string(),
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                position_id,
            ],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Position".to_string(),
                id: position_id.to_string(),
            });
        }

        Self::apply_rollup_updates_in_tx(&tx, rollup_updates)?;

        tx.commit()?;
        Ok(())
    }

    /// 单独提交一批汇总更新 (显式重算/校验重建路径)
    pub fn apply_rollup_updates(&self, rollup_updates: &[RollupUpdate]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::apply_rollup_updates_in_tx(&tx, rollup_updates)?;

        tx.commit()?;
        Ok(rollup_updates.len())
    }

    // ==========================================
    // 事务内辅助
    // ==========================================

    /// 事务内分配下一个 seq_no (保证全局落位顺序原子性)
    fn next_seq_no(tx: &Connection) -> RepositoryResult<i64> {
        let max_seq: Option<i64> = tx.query_row(
            "SELECT MAX(seq_no) FROM network_position",
            [],
            |row| row.get(0),
        )?;
        Ok(max_seq.unwrap_or(0) + 1)
    }

    /// 事务内插入点位行
    fn insert_position_row(
        tx: &Connection,
        position: &Position,
        seq_no: i64,
    ) -> RepositoryResult<()> {
        let (member_id, member_name, withdrawal_member_no, withdrawal_name, withdrawn_on) =
            match &position.occupant {
                Occupant::Member(m) => (
                    Some(m.member_id.clone()),
                    Some(m.display_name.clone()),
                    None,
                    None,
                    None,
                ),
                Occupant::Withdrawal(w) => (
                    None,
                    None,
                    Some(w.member_no.clone()),
                    Some(w.display_name.clone()),
                    Some(w.withdrawn_on.format("%Y-%m-%d").to_string()),
                ),
            };

        tx.execute(
            r#"INSERT INTO network_position (
                position_id, parent_id, position_type, level, hierarchy_path, seq_no,
                occupant_kind, member_id, member_name,
                withdrawal_member_no, withdrawal_name, withdrawn_on,
                left_count, right_count, own_sales, left_sales, right_sales,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                position.position_id,
                position.parent_id,
                position.position_type.to_db_str(),
                position.level,
                position.hierarchy_path,
                seq_no,
                position.occupant.kind().to_db_str(),
                member_id,
                member_name,
                withdrawal_member_no,
                withdrawal_name,
                withdrawn_on,
                position.left_count,
                position.right_count,
                position.own_sales.to_string(),
                position.left_sales.to_string(),
                position.right_sales.to_string(),
                position.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                position.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 事务内应用汇总更新集
    fn apply_rollup_updates_in_tx(
        tx: &Connection,
        rollup_updates: &[RollupUpdate],
    ) -> RepositoryResult<()> {
        let now = chrono::Utc::now().naive_utc();
        for update in rollup_updates {
            let rows_affected = tx.execute(
                r#"UPDATE network_position
                   SET left_count = ?, right_count = ?,
                       left_sales = ?, right_sales = ?,
                       updated_at = ?
                   WHERE position_id = ?"#,
                params![
                    update.left_count,
                    update.right_count,
                    update.left_sales.to_string(),
                    update.right_sales.to_string(),
                    now.format("%Y-%m-%d %H:%M:%S").to_string(),
                    update.position_id,
                ],
            )?;
            if rows_affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "Position".to_string(),
                    id: update.position_id.clone(),
                });
            }
        }
        Ok(())
    }
}
