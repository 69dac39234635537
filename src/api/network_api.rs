// ==========================================
// 双轨会员网络管理系统 - 网络操作 API
// ==========================================
// 职责: 安置/退网/业绩/谱系的操作员入口, 入参校验与错误翻译
// 依据: Network_Master_Spec.md - PART B 核心操作
// 红线: API 不含业务规则, 不变式全部由引擎与仓储层守卫
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::error::{
    validate_member_no, validate_position_id, validate_sales_amount, ApiError, ApiResult,
};
use crate::domain::action_log::ActionLog;
use crate::domain::occupant::Occupant;
use crate::domain::types::PositionType;
use crate::engine::genealogy::{GenealogyService, NetworkStats, PositionView};
use crate::engine::placement::{PlacementEngine, PlacementResult};
use crate::engine::sales::{RollupRepairResult, SalesEngine, SalesUpdateResult};
use crate::engine::withdrawal::{WithdrawalEngine, WithdrawalRequest, WithdrawalResult};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::position_repo::PositionRepository;

// ==========================================
// NetworkApi - 网络操作 API
// ==========================================

/// 网络操作API
///
/// 职责：
/// 1. 安置操作（根点位、常规滑落安置、定向安置）
/// 2. 退网占位替换
/// 3. 业绩录入与汇总链修复
/// 4. 谱系查询（伞下、祖先链、全网统计）
/// 5. 操作日志查询（审计追溯）
pub struct NetworkApi {
    placement: Arc<PlacementEngine>,
    withdrawal: Arc<WithdrawalEngine>,
    sales: Arc<SalesEngine>,
    genealogy: Arc<GenealogyService>,
    position_repo: Arc<PositionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl NetworkApi {
    pub fn new(
        placement: Arc<PlacementEngine>,
        withdrawal: Arc<WithdrawalEngine>,
        sales: Arc<SalesEngine>,
        genealogy: Arc<GenealogyService>,
        position_repo: Arc<PositionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            placement,
            withdrawal,
            sales,
            genealogy,
            position_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 安置接口
    // ==========================================

    /// 创建根点位
    ///
    /// # 参数
    /// - member_no: 会员编号
    /// - member_name: 会员姓名
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(PlacementResult): 落位信息 (level=0, spillover_depth=0)
    /// - Err(ApiError): 网络已有根点位 / 入参非法
    pub fn place_root(
        &self,
        member_no: &str,
        member_name: &str,
        operator: &str,
    ) -> ApiResult<PlacementResult> {
        validate_member_no(member_no)?;
        Self::verify_member_name(member_name)?;
        Self::verify_operator(operator)?;

        let occupant = Occupant::member(member_no, member_name);
        Ok(self.placement.place_root(occupant, operator)?)
    }

    /// 常规安置: 先左后右, 满则广度优先左优先滑落
    ///
    /// # 参数
    /// - member_no: 新会员编号
    /// - member_name: 新会员姓名
    /// - upline_id: 安置上级点位ID (滑落搜索起点)
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(PlacementResult): 实际落位信息 (父点位可能深于安置上级)
    /// - Err(ApiError): 容量不足 / 编号重复 / 入参非法
    pub fn place_member(
        &self,
        member_no: &str,
        member_name: &str,
        upline_id: &str,
        operator: &str,
    ) -> ApiResult<PlacementResult> {
        validate_member_no(member_no)?;
        Self::verify_member_name(member_name)?;
        validate_position_id(upline_id)?;
        Self::verify_operator(operator)?;

        let occupant = Occupant::member(member_no, member_name);
        Ok(self.placement.place(occupant, upline_id, operator)?)
    }

    /// 定向安置: 指定父点位与槽位, 不做滑落搜索
    ///
    /// # 参数
    /// - side: 槽位 ("LEFT" / "RIGHT", 大小写不敏感)
    pub fn place_member_directed(
        &self,
        member_no: &str,
        member_name: &str,
        parent_id: &str,
        side: &str,
        operator: &str,
    ) -> ApiResult<PlacementResult> {
        validate_member_no(member_no)?;
        Self::verify_member_name(member_name)?;
        validate_position_id(parent_id)?;
        Self::verify_operator(operator)?;

        let position_type = PositionType::from_str(side).ok_or_else(|| {
            ApiError::InvalidInput(format!("无效的槽位类型: {}，应为 LEFT/RIGHT", side))
        })?;

        let occupant = Occupant::member(member_no, member_name);
        Ok(self
            .placement
            .place_directed(occupant, parent_id, position_type, operator)?)
    }

    // ==========================================
    // 退网接口
    // ==========================================

    /// 退网占位替换
    ///
    /// # 参数
    /// - position_id: 目标点位
    /// - member_no: 退网会员编号 (必须与当前占位人一致)
    /// - withdrawn_on: 退网生效日 (YYYY-MM-DD 或 YYYYMMDD)
    /// - reason: 审计备注 (可选)
    /// - operator: 操作人
    ///
    /// # 红线
    /// - 点位本身与伞下结构原位保留, 仅占位人被替换为退网占位
    pub fn withdraw_member(
        &self,
        position_id: &str,
        member_no: &str,
        withdrawn_on: &str,
        reason: Option<&str>,
        operator: &str,
    ) -> ApiResult<WithdrawalResult> {
        validate_position_id(position_id)?;
        validate_member_no(member_no)?;
        Self::verify_operator(operator)?;

        let effective_date = Self::parse_date_input(withdrawn_on)?;
        let mut request = WithdrawalRequest::new(member_no, effective_date);
        if let Some(note) = reason {
            if !note.trim().is_empty() {
                request = request.with_reason(note.trim());
            }
        }

        Ok(self.withdrawal.withdraw(position_id, request, operator)?)
    }

    // ==========================================
    // 业绩接口
    // ==========================================

    /// 覆写点位个人业绩并向上递推
    ///
    /// # 参数
    /// - amount: 文本金额 (精确定点解析, 非负)
    pub fn record_sales(
        &self,
        position_id: &str,
        amount: &str,
        operator: &str,
    ) -> ApiResult<SalesUpdateResult> {
        validate_position_id(position_id)?;
        Self::verify_operator(operator)?;

        let value = validate_sales_amount(amount)?;
        Ok(self.sales.record_sales(position_id, value, operator)?)
    }

    /// 重算指定点位汇总并修复到根
    ///
    /// # 用途
    /// - 对账检出 ROLLUP_MISMATCH 后的修复入口
    pub fn recompute_rollups(
        &self,
        position_id: &str,
        operator: &str,
    ) -> ApiResult<RollupRepairResult> {
        validate_position_id(position_id)?;
        Self::verify_operator(operator)?;

        Ok(self.sales.recompute_rollups(position_id, operator)?)
    }

    // ==========================================
    // 谱系查询接口
    // ==========================================

    /// 查询点位详情
    ///
    /// # 返回
    /// - Ok(Some(PositionView)): 点位视图
    /// - Ok(None): 点位不存在
    pub fn get_position_detail(&self, position_id: &str) -> ApiResult<Option<PositionView>> {
        validate_position_id(position_id)?;

        let position = self.position_repo.find_by_id(position_id)?;
        Ok(position.as_ref().map(PositionView::from))
    }

    /// 按会员编号查点位 (含退网前占用的点位)
    ///
    /// # 返回
    /// - 匹配点位按落位先后排列; 编号从未入网时为空集
    pub fn find_member_positions(&self, member_no: &str) -> ApiResult<Vec<PositionView>> {
        validate_member_no(member_no)?;

        let positions = self.position_repo.find_by_identity(member_no)?;
        Ok(positions.iter().map(PositionView::from).collect())
    }

    /// 查询伞下网络 (排除自身, 按插入序排列)
    ///
    /// # 参数
    /// - max_depth: 相对层深窗口; None 为整棵子树
    pub fn get_descendants(
        &self,
        position_id: &str,
        max_depth: Option<i64>,
    ) -> ApiResult<Vec<PositionView>> {
        let _perf = crate::perf::PerfGuard::new("api.get_descendants");
        validate_position_id(position_id)?;

        Ok(self.genealogy.descendants(position_id, max_depth)?)
    }

    /// 查询祖先链 (根在前, 不含自身)
    pub fn get_ancestors(&self, position_id: &str) -> ApiResult<Vec<PositionView>> {
        let _perf = crate::perf::PerfGuard::new("api.get_ancestors");
        validate_position_id(position_id)?;

        Ok(self.genealogy.ancestors(position_id)?)
    }

    /// 全网统计 (在网/退网拆分)
    pub fn get_network_stats(&self) -> ApiResult<NetworkStats> {
        let _perf = crate::perf::PerfGuard::new("api.get_network_stats");
        Ok(self.genealogy.stats()?)
    }

    // ==========================================
    // 操作日志查询接口
    // ==========================================

    /// 查询单个点位的操作历史 (时间倒序)
    pub fn get_position_history(&self, position_id: &str) -> ApiResult<Vec<ActionLog>> {
        validate_position_id(position_id)?;

        Ok(self.action_log_repo.find_by_position_id(position_id)?)
    }

    /// 查询最近的全局操作记录
    pub fn get_recent_actions(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        if limit <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "查询条数必须为正数: {}",
                limit
            )));
        }

        Ok(self.action_log_repo.find_recent(limit)?)
    }

    // ==========================================
    // 入参辅助
    // ==========================================

    fn verify_member_name(member_name: &str) -> ApiResult<()> {
        if member_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("会员姓名不能为空".to_string()));
        }
        Ok(())
    }

    fn verify_operator(operator: &str) -> ApiResult<()> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "操作人不能为空（可审计性要求）".to_string(),
            ));
        }
        Ok(())
    }

    /// 解析日期入参, 兼容存量导出的两种写法
    fn parse_date_input(value: &str) -> ApiResult<NaiveDate> {
        let trimmed = value.trim();
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
            .map_err(|_| {
                ApiError::InvalidInput(format!(
                    "日期格式错误: {}，应为 YYYY-MM-DD 或 YYYYMMDD",
                    value
                ))
            })
    }
}
