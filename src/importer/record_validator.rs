// ==========================================
// 双轨会员网络管理系统 - 数据质量校验器实现
// ==========================================
// 依据: Field_Mapping_Spec_v0.2_Network.md - 6. 数据质量规则
// 职责: 编号/必填/拓扑三级校验
// 红线: ERROR 级违规行必须阻断重放, 不得带病落位
// ==========================================

use crate::domain::import::{DqLevel, DqViolation, RawNetworkRecord};
use crate::domain::types::PositionType;
use crate::importer::network_importer_trait::RecordValidator as RecordValidatorTrait;
use std::collections::{HashMap, HashSet};

pub struct RecordValidator;

impl RecordValidatorTrait for RecordValidator {
    /// 校验会员编号（非空且同批次内唯一）
    fn validate_member_keys(&self, records: &[RawNetworkRecord]) -> Vec<DqViolation> {
        let mut violations = Vec::new();
        let mut seen_nos = HashSet::new();

        for record in records {
            let member_no = match &record.member_no {
                Some(no) => no,
                None => {
                    violations.push(DqViolation {
                        row_number: record.row_number,
                        member_no: None,
                        level: DqLevel::Error,
                        field: "member_no".to_string(),
                        message: "会员编号缺失".to_string(),
                    });
                    continue;
                }
            };

            if !seen_nos.insert(member_no.clone()) {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    member_no: Some(member_no.clone()),
                    level: DqLevel::Error,
                    field: "member_no".to_string(),
                    message: format!("重复会员编号（同批次内）: {}", member_no),
                });
            }
        }

        violations
    }

    /// 校验单条记录的必填字段与字段取值
    fn validate_required_fields(&self, record: &RawNetworkRecord) -> Vec<DqViolation> {
        let mut violations = Vec::new();
        let push = |violations: &mut Vec<DqViolation>, level, field: &str, message: String| {
            violations.push(DqViolation {
                row_number: record.row_number,
                member_no: record.member_no.clone(),
                level,
                field: field.to_string(),
                message,
            });
        };

        // 层级是排序与父子核对的基础
        match record.level {
            None => push(
                &mut violations,
                DqLevel::Error,
                "level",
                "层级缺失".to_string(),
            ),
            Some(level) if level < 0 => push(
                &mut violations,
                DqLevel::Error,
                "level",
                format!("层级为负数: {}", level),
            ),
            _ => {}
        }

        // 点位类型取值
        let parsed_type = record
            .position_type
            .as_deref()
            .map(|raw| (raw, PositionType::from_str(raw)));
        if let Some((raw, None)) = parsed_type {
            push(
                &mut violations,
                DqLevel::Error,
                "position_type",
                format!("点位类型无效: {}", raw),
            );
        }
        let is_root = matches!(parsed_type, Some((_, Some(PositionType::Root))))
            || record.level == Some(0);

        if is_root {
            if record.level.is_some() && record.level != Some(0) {
                push(
                    &mut violations,
                    DqLevel::Error,
                    "level",
                    "根点位层级必须为 0".to_string(),
                );
            }
        } else if record.upline_member_no.is_none() {
            push(
                &mut violations,
                DqLevel::Error,
                "upline_member_no",
                "非根点位缺少安置上级编号".to_string(),
            );
        }

        // 姓名缺失不阻断, 重放时以编号代用
        if record.member_name.is_none() {
            push(
                &mut violations,
                DqLevel::Warning,
                "member_name",
                "会员姓名缺失, 以编号代用".to_string(),
            );
        }

        // 退网行必须带日期
        if record.withdrawn && record.withdrawn_on.is_none() {
            push(
                &mut violations,
                DqLevel::Error,
                "withdrawn_on",
                "退网行缺少退网日期".to_string(),
            );
        }
        if !record.withdrawn && record.withdrawn_on.is_some() {
            push(
                &mut violations,
                DqLevel::Warning,
                "withdrawn_on",
                "未退网却带退网日期, 忽略该日期".to_string(),
            );
        }

        // 业绩不可为负
        if let Some(sales) = record.own_sales {
            if sales.is_sign_negative() {
                push(
                    &mut violations,
                    DqLevel::Error,
                    "own_sales",
                    format!("个人业绩为负数: {}", sales),
                );
            }
        }

        // 申报汇总仅用于核对, 异常降级为警告
        for (field, value) in [
            ("decl_left_count", record.decl_left_count),
            ("decl_right_count", record.decl_right_count),
        ] {
            if let Some(v) = value {
                if v < 0 {
                    push(
                        &mut violations,
                        DqLevel::Warning,
                        field,
                        format!("申报人数为负数: {}", v),
                    );
                }
            }
        }

        violations
    }

    /// 校验批次内拓扑（根唯一、层级连续、同侧不重复）
    fn validate_topology(&self, records: &[RawNetworkRecord]) -> Vec<DqViolation> {
        let mut violations = Vec::new();

        let by_member_no: HashMap<&str, &RawNetworkRecord> = records
            .iter()
            .filter_map(|r| r.member_no.as_deref().map(|no| (no, r)))
            .collect();

        // 根点位唯一性（批次内）
        let roots: Vec<&RawNetworkRecord> = records
            .iter()
            .filter(|r| r.level == Some(0))
            .collect();
        for extra_root in roots.iter().skip(1) {
            violations.push(DqViolation {
                row_number: extra_root.row_number,
                member_no: extra_root.member_no.clone(),
                level: DqLevel::Error,
                field: "level".to_string(),
                message: "批次内根点位重复".to_string(),
            });
        }
        if roots.is_empty() {
            violations.push(DqViolation {
                row_number: 0,
                member_no: None,
                level: DqLevel::Info,
                field: "level".to_string(),
                message: "批次内无根点位, 需网络已有根".to_string(),
            });
        }

        // 父子引用与层级连续性
        let mut occupied_slots: HashSet<(String, String)> = HashSet::new();
        for record in records {
            let upline = match &record.upline_member_no {
                Some(upline) => upline,
                None => continue,
            };

            if record.member_no.as_deref() == Some(upline.as_str()) {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    member_no: record.member_no.clone(),
                    level: DqLevel::Error,
                    field: "upline_member_no".to_string(),
                    message: "安置上级不能是自己".to_string(),
                });
                continue;
            }

            // 带侧别的行, 安置上级即直接父级; 未带侧别按滑落处理,
            // 落点深度由引擎决定, 不做连续性核对
            let directed = matches!(
                record.position_type.as_deref().map(PositionType::from_str),
                Some(Some(PositionType::Left)) | Some(Some(PositionType::Right))
            );
            match by_member_no.get(upline.as_str()) {
                Some(parent) if directed => {
                    if let (Some(level), Some(parent_level)) = (record.level, parent.level) {
                        if level != parent_level + 1 {
                            violations.push(DqViolation {
                                row_number: record.row_number,
                                member_no: record.member_no.clone(),
                                level: DqLevel::Error,
                                field: "level".to_string(),
                                message: format!(
                                    "层级 {} 与安置上级层级 {} 不连续",
                                    level, parent_level
                                ),
                            });
                        }
                    }
                }
                Some(_) => {}
                None => {
                    violations.push(DqViolation {
                        row_number: record.row_number,
                        member_no: record.member_no.clone(),
                        level: DqLevel::Info,
                        field: "upline_member_no".to_string(),
                        message: format!("安置上级 {} 不在本批次, 需已在网内", upline),
                    });
                }
            }

            // 同一安置上级同侧至多一行
            if let Some(position_type) = &record.position_type {
                let slot = (upline.clone(), position_type.to_uppercase());
                if !occupied_slots.insert(slot) {
                    violations.push(DqViolation {
                        row_number: record.row_number,
                        member_no: record.member_no.clone(),
                        level: DqLevel::Error,
                        field: "position_type".to_string(),
                        message: format!("安置上级 {} 的 {} 侧重复落位", upline, position_type),
                    });
                }
            }
        }

        violations
    }
}
