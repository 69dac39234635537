// ==========================================
// 测试数据生成器
// ==========================================
// 用途: 生成7个会员网络导入数据集CSV文件
// 输出: tests/fixtures/datasets/*.csv
// 用法: generate_test_data [大数据集行数]
// ==========================================

use csv::Writer;
use std::error::Error;
use std::fs::{self, File};

// CSV 表头（中文列名, 与字段映射表一致）
const CSV_HEADER: &[&str] = &[
    "会员编号",
    "会员姓名",
    "层级",
    "点位类型",
    "安置上级编号",
    "是否退网",
    "退网日期",
    "个人业绩",
    "左区人数",
    "右区人数",
    "左区业绩",
    "右区业绩",
];

const DEFAULT_LARGE_COUNT: usize = 500;

// 会员姓名池（循环取用）
const MEMBER_NAMES: [&str; 10] = [
    "张伟", "王芳", "李娜", "刘洋", "陈静", "刘强", "陈洁", "赵敏", "孙丽", "周杰",
];

// 会员网络行记录
#[derive(Clone, Default)]
struct NetworkRecord {
    member_no: String,
    member_name: String,
    level: String,
    position_type: String,
    upline_member_no: String,
    withdrawn: String,
    withdrawn_on: String,
    own_sales: String,
    decl_left_count: String,
    decl_right_count: String,
    decl_left_sales: String,
    decl_right_sales: String,
}

impl NetworkRecord {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.member_no.clone(),
            self.member_name.clone(),
            self.level.clone(),
            self.position_type.clone(),
            self.upline_member_no.clone(),
            self.withdrawn.clone(),
            self.withdrawn_on.clone(),
            self.own_sales.clone(),
            self.decl_left_count.clone(),
            self.decl_right_count.clone(),
            self.decl_left_sales.clone(),
            self.decl_right_sales.clone(),
        ]
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("开始生成测试数据集...");

    let large_count = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LARGE_COUNT)
        .max(3);

    fs::create_dir_all("tests/fixtures/datasets")?;

    // 1. 小型标准网络 (8条, 申报汇总与重建结果一致)
    generate_small_network()?;

    // 2. 大型完全二叉网络 (可配置行数, 含退网占位)
    generate_large_network(large_count)?;

    // 3. 缺失必填字段
    generate_missing_required_fields()?;

    // 4. 非法取值
    generate_invalid_values()?;

    // 5. 批次内会员编号重复
    generate_duplicate_member_no()?;

    // 6. 未指定槽位 (自动滑落安置)
    generate_auto_side_spillover()?;

    // 7. 申报汇总与实际不符
    generate_declared_mismatch()?;

    println!("✓ 所有测试数据集生成完成！");
    Ok(())
}

fn write_dataset(path: &str, records: &[NetworkRecord]) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.write_record(&record.to_row())?;
    }
    wtr.flush()?;
    Ok(())
}

// ==========================================
// 01: 小型标准网络
// ==========================================
// 结构: 根 M000001, 左右各一条两层支线, M000008 为退网占位
// 申报汇总按 退网计数=1 的口径手工核算, 导入核对应零差异
fn generate_small_network() -> Result<(), Box<dyn Error>> {
    let rows: [[&str; 12]; 8] = [
        ["M000001", "张伟", "0", "ROOT", "", "否", "", "0", "4", "3", "230.75", "150.00"],
        ["M000002", "王芳", "1", "LEFT", "M000001", "否", "", "100.50", "2", "1", "70.25", "60.00"],
        ["M000003", "李娜", "1", "RIGHT", "M000001", "否", "", "80.00", "1", "1", "40.00", "30.00"],
        ["M000004", "刘洋", "2", "LEFT", "M000002", "否", "", "50.25", "1", "0", "20.00", "0"],
        ["M000005", "陈静", "2", "RIGHT", "M000002", "否", "", "60.00", "0", "0", "0", "0"],
        ["M000006", "刘强", "2", "LEFT", "M000003", "否", "", "40.00", "0", "0", "0", "0"],
        ["M000007", "陈洁", "2", "RIGHT", "M000003", "否", "", "30.00", "0", "0", "0", "0"],
        ["M000008", "赵敏", "3", "LEFT", "M000004", "是", "20250410", "20.00", "0", "0", "0", "0"],
    ];

    let records: Vec<NetworkRecord> = rows
        .iter()
        .map(|r| NetworkRecord {
            member_no: r[0].to_string(),
            member_name: r[1].to_string(),
            level: r[2].to_string(),
            position_type: r[3].to_string(),
            upline_member_no: r[4].to_string(),
            withdrawn: r[5].to_string(),
            withdrawn_on: r[6].to_string(),
            own_sales: r[7].to_string(),
            decl_left_count: r[8].to_string(),
            decl_right_count: r[9].to_string(),
            decl_left_sales: r[10].to_string(),
            decl_right_sales: r[11].to_string(),
        })
        .collect();

    write_dataset("tests/fixtures/datasets/01_small_network.csv", &records)?;
    println!("✓ 生成 01_small_network.csv (8条)");
    Ok(())
}

// ==========================================
// 02: 大型完全二叉网络
// ==========================================
// 采用堆编号: 成员 i 的父为 i/2, 偶数落左侧, 奇数落右侧,
// 申报汇总用子树求和精确核算 (分单位), 每13个退网一个
fn own_cents(index: usize) -> i64 {
    if index == 1 {
        0
    } else {
        5000 + ((index * 37) % 20000) as i64
    }
}

fn subtree_count(index: usize, total: usize) -> i64 {
    if index > total {
        return 0;
    }
    1 + subtree_count(index * 2, total) + subtree_count(index * 2 + 1, total)
}

fn subtree_cents(index: usize, total: usize) -> i64 {
    if index > total {
        return 0;
    }
    own_cents(index) + subtree_cents(index * 2, total) + subtree_cents(index * 2 + 1, total)
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn generate_large_network(total: usize) -> Result<(), Box<dyn Error>> {
    let mut records = Vec::with_capacity(total);

    for i in 1..=total {
        let withdrawn = i > 1 && i % 13 == 0;
        records.push(NetworkRecord {
            member_no: format!("M{:06}", i),
            member_name: MEMBER_NAMES[(i - 1) % MEMBER_NAMES.len()].to_string(),
            level: format!("{}", usize::ilog2(i)),
            position_type: if i == 1 {
                "ROOT".to_string()
            } else if i % 2 == 0 {
                "LEFT".to_string()
            } else {
                "RIGHT".to_string()
            },
            upline_member_no: if i == 1 {
                String::new()
            } else {
                format!("M{:06}", i / 2)
            },
            withdrawn: if withdrawn { "是" } else { "否" }.to_string(),
            withdrawn_on: if withdrawn {
                format!("2025{:02}{:02}", (i % 12) + 1, (i % 28) + 1)
            } else {
                String::new()
            },
            own_sales: format_cents(own_cents(i)),
            decl_left_count: format!("{}", subtree_count(i * 2, total)),
            decl_right_count: format!("{}", subtree_count(i * 2 + 1, total)),
            decl_left_sales: format_cents(subtree_cents(i * 2, total)),
            decl_right_sales: format_cents(subtree_cents(i * 2 + 1, total)),
        });
    }

    write_dataset("tests/fixtures/datasets/02_large_network.csv", &records)?;
    println!("✓ 生成 02_large_network.csv ({}条)", total);
    Ok(())
}

// ==========================================
// 03: 缺失必填字段
// ==========================================
// 前2行有效, 后4行分别缺编号/缺层级/缺安置上级/退网缺日期
fn generate_missing_required_fields() -> Result<(), Box<dyn Error>> {
    let records = vec![
        NetworkRecord {
            member_no: "M000001".to_string(),
            member_name: "张伟".to_string(),
            level: "0".to_string(),
            position_type: "ROOT".to_string(),
            own_sales: "0".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000002".to_string(),
            member_name: "王芳".to_string(),
            level: "1".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "100.00".to_string(),
            ..Default::default()
        },
        // 缺会员编号
        NetworkRecord {
            member_name: "李娜".to_string(),
            level: "1".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000001".to_string(),
            ..Default::default()
        },
        // 缺层级
        NetworkRecord {
            member_no: "M000004".to_string(),
            member_name: "刘洋".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000002".to_string(),
            ..Default::default()
        },
        // 非根缺安置上级
        NetworkRecord {
            member_no: "M000005".to_string(),
            member_name: "陈静".to_string(),
            level: "2".to_string(),
            position_type: "RIGHT".to_string(),
            ..Default::default()
        },
        // 退网缺退网日期
        NetworkRecord {
            member_no: "M000006".to_string(),
            member_name: "刘强".to_string(),
            level: "2".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000002".to_string(),
            withdrawn: "是".to_string(),
            ..Default::default()
        },
    ];

    write_dataset(
        "tests/fixtures/datasets/03_missing_required_fields.csv",
        &records,
    )?;
    println!("✓ 生成 03_missing_required_fields.csv (6条, 4条应被阻断)");
    Ok(())
}

// ==========================================
// 04: 非法取值
// ==========================================
// 负层级/非法点位类型/负业绩/层级非数字/退网标记非法
fn generate_invalid_values() -> Result<(), Box<dyn Error>> {
    let records = vec![
        NetworkRecord {
            member_no: "M000001".to_string(),
            member_name: "张伟".to_string(),
            level: "0".to_string(),
            position_type: "ROOT".to_string(),
            own_sales: "0".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000002".to_string(),
            member_name: "王芳".to_string(),
            level: "-1".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000001".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000003".to_string(),
            member_name: "李娜".to_string(),
            level: "1".to_string(),
            position_type: "MIDDLE".to_string(),
            upline_member_no: "M000001".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000004".to_string(),
            member_name: "刘洋".to_string(),
            level: "1".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "-50.00".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000005".to_string(),
            member_name: "陈静".to_string(),
            level: "abc".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000002".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000006".to_string(),
            member_name: "刘强".to_string(),
            level: "2".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000002".to_string(),
            withdrawn: "也许".to_string(),
            ..Default::default()
        },
    ];

    write_dataset("tests/fixtures/datasets/04_invalid_values.csv", &records)?;
    println!("✓ 生成 04_invalid_values.csv (6条, 5条应被阻断)");
    Ok(())
}

// ==========================================
// 05: 批次内会员编号重复
// ==========================================
fn generate_duplicate_member_no() -> Result<(), Box<dyn Error>> {
    let records = vec![
        NetworkRecord {
            member_no: "M000001".to_string(),
            member_name: "张伟".to_string(),
            level: "0".to_string(),
            position_type: "ROOT".to_string(),
            own_sales: "0".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000002".to_string(),
            member_name: "王芳".to_string(),
            level: "1".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "100.00".to_string(),
            ..Default::default()
        },
        // 与上一行编号重复
        NetworkRecord {
            member_no: "M000002".to_string(),
            member_name: "李娜".to_string(),
            level: "1".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "80.00".to_string(),
            ..Default::default()
        },
    ];

    write_dataset("tests/fixtures/datasets/05_duplicate_member_no.csv", &records)?;
    println!("✓ 生成 05_duplicate_member_no.csv (3条, 1条应被阻断)");
    Ok(())
}

// ==========================================
// 06: 未指定槽位 (自动滑落安置)
// ==========================================
// 除根外不带点位类型, 全部挂在根下, 由引擎广度优先滑落
fn generate_auto_side_spillover() -> Result<(), Box<dyn Error>> {
    let mut records = vec![NetworkRecord {
        member_no: "M000001".to_string(),
        member_name: "张伟".to_string(),
        level: "0".to_string(),
        position_type: "ROOT".to_string(),
        own_sales: "0".to_string(),
        ..Default::default()
    }];

    for i in 2..=8usize {
        records.push(NetworkRecord {
            member_no: format!("M{:06}", i),
            member_name: MEMBER_NAMES[(i - 1) % MEMBER_NAMES.len()].to_string(),
            level: format!("{}", usize::ilog2(i)),
            upline_member_no: "M000001".to_string(),
            withdrawn: "否".to_string(),
            own_sales: format!("{}.00", i * 10),
            ..Default::default()
        });
    }

    write_dataset(
        "tests/fixtures/datasets/06_auto_side_spillover.csv",
        &records,
    )?;
    println!("✓ 生成 06_auto_side_spillover.csv (8条)");
    Ok(())
}

// ==========================================
// 07: 申报汇总与实际不符
// ==========================================
// 拓扑合法但根的申报人数/业绩故意写错, 导入后核对应检出差异
fn generate_declared_mismatch() -> Result<(), Box<dyn Error>> {
    let records = vec![
        NetworkRecord {
            member_no: "M000001".to_string(),
            member_name: "张伟".to_string(),
            level: "0".to_string(),
            position_type: "ROOT".to_string(),
            own_sales: "0".to_string(),
            decl_left_count: "5".to_string(),
            decl_right_count: "1".to_string(),
            decl_left_sales: "999.99".to_string(),
            decl_right_sales: "80.00".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000002".to_string(),
            member_name: "王芳".to_string(),
            level: "1".to_string(),
            position_type: "LEFT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "100.00".to_string(),
            ..Default::default()
        },
        NetworkRecord {
            member_no: "M000003".to_string(),
            member_name: "李娜".to_string(),
            level: "1".to_string(),
            position_type: "RIGHT".to_string(),
            upline_member_no: "M000001".to_string(),
            own_sales: "80.00".to_string(),
            ..Default::default()
        },
    ];

    write_dataset("tests/fixtures/datasets/07_declared_mismatch.csv", &records)?;
    println!("✓ 生成 07_declared_mismatch.csv (3条, 核对应报根点位差异)");
    Ok(())
}
