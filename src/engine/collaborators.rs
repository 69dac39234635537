// ==========================================
// 双轨会员网络管理系统 - 外部上下文端口
// ==========================================
// 依据: Network_Master_Spec.md - PART B 消费侧契约
// 职责: 定义会员注册表/业绩台账的只读端口 trait
// 说明: Engine 层定义 trait, 宿主应用提供适配器实现
// 红线: 网络引擎只消费身份与业绩数据, 不拥有、不回写
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

// ==========================================
// 会员注册表端口
// ==========================================

/// 会员档案 (注册表返回的最小身份视图)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    /// 会员编号
    pub member_id: String,
    /// 展示姓名
    pub display_name: String,
    /// 推荐人编号 (对账时用于推导推荐树)
    pub sponsor_id: Option<String>,
    /// 是否在册有效
    pub active: bool,
}

/// 会员注册表只读端口
///
/// 网络引擎通过此 trait 查询会员身份, 不持有会员主数据。
///
/// # 返回
/// - `Ok(Some(profile))`: 会员在册
/// - `Ok(None)`: 注册表中无此会员
/// - `Err`: 注册表访问失败
pub trait MemberRegistry: Send + Sync {
    fn lookup(&self, member_id: &str) -> Result<Option<MemberProfile>, Box<dyn Error + Send + Sync>>;
}

/// 可选的注册表包装
///
/// 简化 Option<Arc<dyn MemberRegistry>> 的使用:
/// 未配置时查询返回 Ok(None), 引擎按"无法核验"处理。
pub struct OptionalMemberRegistry {
    inner: Option<Arc<dyn MemberRegistry>>,
}

impl OptionalMemberRegistry {
    /// 创建带注册表的实例
    pub fn with_registry(registry: Arc<dyn MemberRegistry>) -> Self {
        Self {
            inner: Some(registry),
        }
    }

    /// 创建空实例 (不核验会员身份)
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 查询会员档案 (未配置时返回 Ok(None))
    pub fn lookup(
        &self,
        member_id: &str,
    ) -> Result<Option<MemberProfile>, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(registry) => registry.lookup(member_id),
            None => {
                tracing::debug!("OptionalMemberRegistry: 未配置注册表, 跳过核验 - member_id={}", member_id);
                Ok(None)
            }
        }
    }

    /// 检查是否配置了注册表
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalMemberRegistry {
    fn default() -> Self {
        Self::none()
    }
}

// ==========================================
// 业绩台账端口
// ==========================================

/// 业绩结算周期 (闭区间)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SalesPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// 自然月周期
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            from,
            to: next.pred_opt()?,
        })
    }

    /// 判断日期是否落在周期内
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

impl fmt::Display for SalesPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.from, self.to)
    }
}

/// 业绩台账只读端口
///
/// 按占位人编号与周期查询累计业绩, 台账由结算系统拥有。
///
/// # 返回
/// - `Ok(Some(amount))`: 周期内有业绩记录
/// - `Ok(None)`: 周期内无记录
/// - `Err`: 台账访问失败
pub trait SalesLedger: Send + Sync {
    fn sales_for(
        &self,
        occupant_id: &str,
        period: &SalesPeriod,
    ) -> Result<Option<Decimal>, Box<dyn Error + Send + Sync>>;
}

/// 可选的台账包装
pub struct OptionalSalesLedger {
    inner: Option<Arc<dyn SalesLedger>>,
}

impl OptionalSalesLedger {
    /// 创建带台账的实例
    pub fn with_ledger(ledger: Arc<dyn SalesLedger>) -> Self {
        Self {
            inner: Some(ledger),
        }
    }

    /// 创建空实例 (无台账同步能力)
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 查询周期业绩 (未配置时返回 Ok(None))
    pub fn sales_for(
        &self,
        occupant_id: &str,
        period: &SalesPeriod,
    ) -> Result<Option<Decimal>, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(ledger) => ledger.sales_for(occupant_id, period),
            None => {
                tracing::debug!(
                    "OptionalSalesLedger: 未配置台账, 跳过查询 - occupant_id={}, period={}",
                    occupant_id,
                    period
                );
                Ok(None)
            }
        }
    }

    /// 检查是否配置了台账
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalSalesLedger {
    fn default() -> Self {
        Self::none()
    }
}

// ==========================================
// 内存实现 (测试/演示播种用)
// ==========================================

/// 内存会员注册表
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberRegistry {
    members: HashMap<String, MemberProfile>,
}

impl InMemoryMemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: Vec<MemberProfile>) -> Self {
        let members = profiles
            .into_iter()
            .map(|p| (p.member_id.clone(), p))
            .collect();
        Self { members }
    }

    pub fn insert(&mut self, profile: MemberProfile) {
        self.members.insert(profile.member_id.clone(), profile);
    }
}

impl MemberRegistry for InMemoryMemberRegistry {
    fn lookup(&self, member_id: &str) -> Result<Option<MemberProfile>, Box<dyn Error + Send + Sync>> {
        Ok(self.members.get(member_id).cloned())
    }
}

/// 内存业绩台账 (带日期的流水记录, 查询时按周期汇总)
#[derive(Debug, Clone, Default)]
pub struct InMemorySalesLedger {
    entries: HashMap<String, Vec<(NaiveDate, Decimal)>>,
}

impl InMemorySalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一笔业绩流水
    pub fn record(&mut self, occupant_id: impl Into<String>, date: NaiveDate, amount: Decimal) {
        self.entries
            .entry(occupant_id.into())
            .or_default()
            .push((date, amount));
    }
}

impl SalesLedger for InMemorySalesLedger {
    fn sales_for(
        &self,
        occupant_id: &str,
        period: &SalesPeriod,
    ) -> Result<Option<Decimal>, Box<dyn Error + Send + Sync>> {
        let Some(entries) = self.entries.get(occupant_id) else {
            return Ok(None);
        };
        let mut total = Decimal::ZERO;
        let mut hit = false;
        for (date, amount) in entries {
            if period.contains(*date) {
                total += *amount;
                hit = true;
            }
        }
        if hit {
            Ok(Some(total))
        } else {
            Ok(None)
        }
    }
}
