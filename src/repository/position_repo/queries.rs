use super::core::PositionRepository;
use crate::domain::occupant::Occupant;
use crate::domain::position::Position;
use crate::domain::types::{OccupantKind, PositionType};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

impl PositionRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按点位ID查询单个点位
    pub fn find_by_id(&self, position_id: &str) -> RepositoryResult<Option<Position>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE position_id = ?
            "#,
        )?;

        match stmt.query_row(params![position_id], |row| self.map_row(row)) {
            Ok(position) => Ok(Some(position)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询根点位 (全网唯一)
    pub fn find_root(&self) -> RepositoryResult<Option<Position>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE position_type = 'ROOT'
            "#,
        )?;

        match stmt.query_row([], |row| self.map_row(row)) {
            Ok(position) => Ok(Some(position)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定点位的左右子点位
    ///
    /// # 返回
    /// - Ok((左子点位, 右子点位)): 任一槽位为空时对应 None
    /// - Err: 数据库错误
    pub fn find_children(
        &self,
        parent_id: &str,
    ) -> RepositoryResult<(Option<Position>, Option<Position>)> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE parent_id = ?
            ORDER BY seq_no
            "#,
        )?;

        let children = stmt
            .query_map(params![parent_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut left = None;
        let mut right = None;
        for child in children {
            match child.position_type {
                PositionType::Left => left = Some(child),
                PositionType::Right => right = Some(child),
                PositionType::Root => {}
            }
        }

        Ok((left, right))
    }

    /// 按会员ID查询在网占位点位
    ///
    /// 红线: 同一会员ID在网占位至多一个 (退网占位不计)
    pub fn find_active_by_member_id(
        &self,
        member_id: &str,
    ) -> RepositoryResult<Option<Position>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE member_id = ?
              AND occupant_kind = 'MEMBER'
            "#,
        )?;

        match stmt.query_row(params![member_id], |row| self.map_row(row)) {
            Ok(position) => Ok(Some(position)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按会员编号查询全部关联点位 (在网占位 + 退网占位)
    ///
    /// 说明:
    /// - 退网后重新加入的会员会同时命中历史退网占位与新的在网占位, 因此返回列表。
    pub fn find_by_identity(&self, member_no: &str) -> RepositoryResult<Vec<Position>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE member_id = ?
               OR withdrawal_member_no = ?
            ORDER BY seq_no
            "#,
        )?;

        let positions = stmt
            .query_map(params![member_no, member_no], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(positions)
    }

    /// 按层级路径前缀分页查询伞下点位
    ///
    /// # 参数
    /// - path_pattern: LIKE 匹配模式 (由 hierarchy_path 模块生成, 含结尾通配符)
    /// - max_level: 绝对层级上限 (None 表示不限)
    /// - limit/offset: 分页参数
    ///
    /// # 返回
    /// - Ok(Vec<Position>): 按 (level, seq_no) 排序的伞下点位页
    pub fn find_descendants_page(
        &self,
        path_pattern: &str,
        max_level: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Position>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE hierarchy_path LIKE ?
            "#,
        );

        let mut params: Vec<Value> = vec![Value::from(path_pattern.to_string())];

        if let Some(max_level) = max_level {
            sql.push_str(" AND level <= ?");
            params.push(Value::from(max_level));
        }

        sql.push_str(" ORDER BY level, seq_no LIMIT ? OFFSET ?");
        params.push(Value::from(limit));
        params.push(Value::from(offset));

        let mut stmt = conn.prepare(&sql)?;
        let positions = stmt
            .query_map(params_from_iter(params.iter()), |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(positions)
    }

    /// 按点位ID集合批量查询
    pub fn find_by_ids(&self, position_ids: &[String]) -> RepositoryResult<Vec<Position>> {
        if position_ids.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.get_conn()?;
        let placeholders = position_ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            WHERE position_id IN ({})
            ORDER BY level, seq_no
            "#,
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<Value> = position_ids
            .iter()
            .map(|id| Value::from(id.clone()))
            .collect();

        let positions = stmt
            .query_map(params_from_iter(params.iter()), |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(positions)
    }

    /// 全网分页扫描 (对账用)
    ///
    /// 按 (level, seq_no) 排序, 保证父点位先于子点位出现。
    pub fn scan_page(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Position>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT position_id, parent_id, position_type, level, hierarchy_path,
                   seq_no, occupant_kind, member_id, member_name, withdrawal_member_no,
                   withdrawal_name, withdrawn_on, left_count, right_count, own_sales,
                   left_sales, right_sales, created_at, updated_at
            FROM network_position
            ORDER BY level, seq_no
            LIMIT ?
            OFFSET ?
            "#,
        )?;

        let positions = stmt
            .query_map(params![limit, offset], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(positions)
    }

    /// 统计全网点位总数
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM network_position", [], |row| row.get(0))?;

        Ok(count)
    }

    /// 统计指定占位形态的点位数
    pub fn count_by_occupant_kind(&self, kind: OccupantKind) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM network_position WHERE occupant_kind = ?",
            params![kind.to_db_str()],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 查询全网最大层级 (空网络返回 None)
    pub fn max_level(&self) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;

        let max: Option<i64> =
            conn.query_row("SELECT MAX(level) FROM network_position", [], |row| {
                row.get(0)
            })?;

        Ok(max)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 Position 实体
    ///
    /// 红线: 占位形态列组与 occupant_kind 必须匹配, 否则视为数据损坏并报错。
    fn map_row(&self, row: &Row) -> SqliteResult<Position> {
        let position_id: String = row.get(0)?;
        let parent_id: Option<String> = row.get(1)?;
        let position_type_str: String = row.get(2)?;
        let level: i64 = row.get(3)?;
        let hierarchy_path: String = row.get(4)?;
        let seq_no: i64 = row.get(5)?;
        let occupant_kind_str: String = row.get(6)?;
        let member_id: Option<String> = row.get(7)?;
        let member_name: Option<String> = row.get(8)?;
        let withdrawal_member_no: Option<String> = row.get(9)?;
        let withdrawal_name: Option<String> = row.get(10)?;
        let withdrawn_on_str: Option<String> = row.get(11)?;
        let left_count: i64 = row.get(12)?;
        let right_count: i64 = row.get(13)?;
        let own_sales_str: String = row.get(14)?;
        let left_sales_str: String = row.get(15)?;
        let right_sales_str: String = row.get(16)?;
        let created_at_str: String = row.get(17)?;
        let updated_at_str: String = row.get(18)?;

        let position_type = PositionType::from_str(&position_type_str)
            .ok_or_else(|| column_error(2, format!("非法点位类型: {}", position_type_str)))?;

        let occupant = match OccupantKind::from_str(&occupant_kind_str) {
            Some(OccupantKind::Member) => {
                let id = member_id
                    .ok_or_else(|| column_error(7, "MEMBER 占位缺少 member_id".to_string()))?;
                let name = member_name
                    .ok_or_else(|| column_error(8, "MEMBER 占位缺少 member_name".to_string()))?;
                Occupant::member(id, name)
            }
            Some(OccupantKind::Withdrawal) => {
                let member_no = withdrawal_member_no.ok_or_else(|| {
                    column_error(9, "WITHDRAWAL 占位缺少 withdrawal_member_no".to_string())
                })?;
                let name = withdrawal_name.ok_or_else(|| {
                    column_error(10, "WITHDRAWAL 占位缺少 withdrawal_name".to_string())
                })?;
                let withdrawn_on_str = withdrawn_on_str.ok_or_else(|| {
                    column_error(11, "WITHDRAWAL 占位缺少 withdrawn_on".to_string())
                })?;
                let withdrawn_on = NaiveDate::parse_from_str(&withdrawn_on_str, "%Y-%m-%d")
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            11,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                Occupant::withdrawal(member_no, name, withdrawn_on)
            }
            None => {
                return Err(column_error(
                    6,
                    format!("非法占位形态: {}", occupant_kind_str),
                ))
            }
        };

        let own_sales = Decimal::from_str(&own_sales_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let left_sales = Decimal::from_str(&left_sales_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let right_sales = Decimal::from_str(&right_sales_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(16, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    17,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
        let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    18,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Position {
            position_id,
            parent_id,
            position_type,
            level,
            hierarchy_path,
            seq_no,
            occupant,
            left_count,
            right_count,
            own_sales,
            left_sales,
            right_sales,
            created_at,
            updated_at,
        })
    }
}

/// 构造行映射阶段的列值错误
fn column_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}
