// ==========================================
// 双轨会员网络管理系统 - 演示网络播种
// ==========================================
// 用法: seed_demo_network [db路径] [会员数]
// 红线: 播种必须经安置/退网/业绩引擎逐一落位,
//       不得绕过引擎直写点位表
// ==========================================

use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::Local;
use serde_json::json;
use uuid::Uuid;

use member_network_engine::app::{get_default_db_path, AppState};
use member_network_engine::domain::action_log::{ActionLog, ActionType};

const DEFAULT_MEMBER_COUNT: usize = 30;
const SEED_OPERATOR: &str = "system.seed";

/// 演示会员姓名池 (循环取用)
const DEMO_NAMES: [&str; 10] = [
    "张伟", "王芳", "李娜", "刘洋", "陈静", "刘强", "陈洁", "赵敏", "孙丽", "周杰",
];

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    let member_count = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MEMBER_COUNT)
        .max(3);

    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    seed_demo_network(&state, member_count)?;
    print_quick_counts(&state)?;

    eprintln!("演示网络就绪: {}", db_path);
    Ok(())
}

/// 旧库先备份再清空, 保证播种从空网络开始
fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("已备份 {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_demo_network(state: &AppState, member_count: usize) -> Result<(), Box<dyn Error>> {
    let api = &state.network_api;

    // 根点位
    let root = api.place_root("M000001", DEMO_NAMES[0], SEED_OPERATOR)?;
    let mut placed_ids = vec![root.position_id.clone()];

    // 其余会员: 安置上级按确定性散列选取, 满槽自动滑落
    for index in 2..=member_count {
        let member_no = format!("M{:06}", index);
        let member_name = DEMO_NAMES[(index - 1) % DEMO_NAMES.len()];
        let upline_id = &placed_ids[(index * 7 + 3) % placed_ids.len()];

        let placed = api.place_member(&member_no, member_name, upline_id, SEED_OPERATOR)?;
        placed_ids.push(placed.position_id);
    }

    // 隔行录入业绩, 金额确定性生成
    for (offset, position_id) in placed_ids.iter().enumerate().skip(1) {
        if offset % 2 == 1 {
            let amount = format!("{}.{:02}", 80 + (offset % 40) * 5, (offset * 13) % 100);
            api.record_sales(position_id, &amount, SEED_OPERATOR)?;
        }
    }

    // 每 11 个退网一个 (跳过根), 展示退网占位语义
    let mut withdrawn = 0usize;
    for index in (11..=member_count).step_by(11) {
        let member_no = format!("M{:06}", index);
        let position_id = &placed_ids[index - 1];
        api.withdraw_member(
            position_id,
            &member_no,
            "2025-06-01",
            Some("演示退网"),
            SEED_OPERATOR,
        )?;
        withdrawn += 1;
    }

    // 播种批次留痕
    let log = ActionLog::new(
        Uuid::new_v4().to_string(),
        None,
        ActionType::Seed,
        SEED_OPERATOR.to_string(),
    )
    .with_payload(&json!({
        "member_count": member_count,
        "withdrawn": withdrawn,
    }))
    .with_detail(format!("演示网络播种: {} 个会员, {} 个退网占位", member_count, withdrawn));
    state.action_log_repo.insert(&log)?;

    Ok(())
}

fn print_quick_counts(state: &AppState) -> Result<(), Box<dyn Error>> {
    let stats = state.network_api.get_network_stats()?;

    eprintln!("==================================================");
    eprintln!("点位总数: {}", stats.total_positions);
    eprintln!("在网会员: {}", stats.active_members);
    eprintln!("退网占位: {}", stats.withdrawn_positions);
    if let Some(level) = stats.max_level {
        eprintln!("最深层级: {}", level);
    }
    eprintln!("在网业绩合计: {}", stats.active_sales_total);
    eprintln!("==================================================");
    Ok(())
}
