// ==========================================
// 双轨会员网络管理系统 - 字段映射器实现
// ==========================================
// 依据: Field_Mapping_Spec_v0.2_Network.md - 标准字段映射表
// 职责: 源字段 → 标准字段映射 + 类型转换
// ==========================================

use crate::domain::import::RawNetworkRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::network_importer_trait::FieldMapper as FieldMapperTrait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_to_raw_network(
        &self,
        row: HashMap<String, String>,
        row_number: usize,
    ) -> Result<RawNetworkRecord, Box<dyn std::error::Error>> {
        Ok(RawNetworkRecord {
            // 身份
            member_no: self.get_string(&row, "会员编号"),
            member_name: self.get_string(&row, "会员姓名"),

            // 结构
            level: self.parse_i64(&row, "层级", row_number)?,
            position_type: self.get_string(&row, "点位类型"),
            upline_member_no: self.get_string(&row, "安置上级编号"),

            // 退网
            withdrawn: self.parse_flag(&row, "是否退网", row_number)?,
            withdrawn_on: self.parse_date(&row, "退网日期", row_number)?,

            // 业绩
            own_sales: self.parse_decimal(&row, "个人业绩", row_number)?,

            // 申报汇总（仅用于重建后核对）
            decl_left_count: self.parse_i64(&row, "左区人数", row_number)?,
            decl_right_count: self.parse_i64(&row, "右区人数", row_number)?,
            decl_left_sales: self.parse_decimal(&row, "左区业绩", row_number)?,
            decl_right_sales: self.parse_decimal(&row, "右区业绩", row_number)?,

            // 元信息
            row_number,
        })
    }
}

impl FieldMapper {
    /// 提取字符串字段（返回 Option），支持多个可能的列名（别名）
    fn get_string(&self, row: &HashMap<String, String>, key: &str) -> Option<String> {
        // 定义列名别名映射
        let aliases: Vec<&str> = match key {
            "会员编号" => vec!["会员编号", "编号"],
            "会员姓名" => vec!["会员姓名", "姓名"],
            "层级" => vec!["层级", "网络层级"],
            "点位类型" => vec!["点位类型", "位置类型"],
            "安置上级编号" => vec!["安置上级编号", "上级编号"],
            "是否退网" => vec!["是否退网", "退网标志"],
            "个人业绩" => vec!["个人业绩", "自身业绩"],
            _ => vec![key],
        };

        // 尝试所有可能的列名
        for alias in aliases {
            if let Some(v) = row.get(alias) {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }

    /// 解析整数
    fn parse_i64(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<Option<i64>> {
        match self.get_string(row, key) {
            None => Ok(None),
            Some(value) => {
                value
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| ImportError::TypeConversionError {
                        row: row_number,
                        field: key.to_string(),
                        message: format!("无法解析为整数: {}", value),
                    })
            }
        }
    }

    /// 解析定点小数（业绩金额）
    fn parse_decimal(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<Option<Decimal>> {
        match self.get_string(row, key) {
            None => Ok(None),
            Some(value) => {
                Decimal::from_str(&value)
                    .map(Some)
                    .map_err(|_| ImportError::TypeConversionError {
                        row: row_number,
                        field: key.to_string(),
                        message: format!("无法解析为金额: {}", value),
                    })
            }
        }
    }

    /// 解析日期（YYYYMMDD → NaiveDate）
    fn parse_date(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<Option<NaiveDate>> {
        match self.get_string(row, key) {
            None => Ok(None),
            Some(value) => {
                // 尝试解析 YYYYMMDD 格式
                NaiveDate::parse_from_str(&value, "%Y%m%d")
                    .map(Some)
                    .or_else(|_| {
                        // 尝试解析 YYYY-MM-DD 格式（兼容）
                        NaiveDate::parse_from_str(&value, "%Y-%m-%d").map(Some)
                    })
                    .map_err(|_| ImportError::DateFormatError {
                        row: row_number,
                        field: key.to_string(),
                        value: value.clone(),
                    })
            }
        }
    }

    /// 解析布尔标记（1/0、Y/N、是/否、TRUE/FALSE; 空视为否）
    fn parse_flag(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<bool> {
        match self.get_string(row, key) {
            None => Ok(false),
            Some(value) => match value.to_uppercase().as_str() {
                "1" | "Y" | "是" | "TRUE" | "YES" => Ok(true),
                "0" | "N" | "否" | "FALSE" | "NO" => Ok(false),
                other => Err(ImportError::TypeConversionError {
                    row: row_number,
                    field: key.to_string(),
                    message: format!("无法解析为是/否标记: {}", other),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_field_mapper_basic() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("会员姓名".to_string(), "张伟".to_string());
        row.insert("层级".to_string(), "2".to_string());
        row.insert("点位类型".to_string(), "LEFT".to_string());
        row.insert("安置上级编号".to_string(), "M000009".to_string());
        row.insert("个人业绩".to_string(), "1250.50".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert_eq!(record.member_no, Some("M000001".to_string()));
        assert_eq!(record.member_name, Some("张伟".to_string()));
        assert_eq!(record.level, Some(2));
        assert_eq!(record.position_type, Some("LEFT".to_string()));
        assert_eq!(record.upline_member_no, Some("M000009".to_string()));
        assert!(!record.withdrawn);
        assert_eq!(record.own_sales, Some(dec("1250.50")));
    }

    #[test]
    fn test_field_mapper_aliases_and_trim() {
        let mut row = HashMap::new();
        row.insert("编号".to_string(), "  M000001  ".to_string());
        row.insert("自身业绩".to_string(), "10".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert_eq!(record.member_no, Some("M000001".to_string()));
        assert_eq!(record.own_sales, Some(dec("10")));
    }

    #[test]
    fn test_field_mapper_empty_as_none() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("安置上级编号".to_string(), "".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert_eq!(record.upline_member_no, None);
    }

    #[test]
    fn test_field_mapper_withdrawn_flag_and_date() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("是否退网".to_string(), "是".to_string());
        row.insert("退网日期".to_string(), "20250120".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert!(record.withdrawn);
        assert_eq!(
            record.withdrawn_on,
            Some(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
        );
    }

    #[test]
    fn test_field_mapper_date_dash_format() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("退网日期".to_string(), "2025-01-20".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert_eq!(
            record.withdrawn_on,
            Some(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
        );
    }

    #[test]
    fn test_field_mapper_declared_rollups() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("左区人数".to_string(), "3".to_string());
        row.insert("右区人数".to_string(), "2".to_string());
        row.insert("左区业绩".to_string(), "100.25".to_string());
        row.insert("右区业绩".to_string(), "88".to_string());

        let mapper = FieldMapper;
        let record = mapper.map_to_raw_network(row, 1).unwrap();

        assert_eq!(record.decl_left_count, Some(3));
        assert_eq!(record.decl_right_count, Some(2));
        assert_eq!(record.decl_left_sales, Some(dec("100.25")));
        assert_eq!(record.decl_right_sales, Some(dec("88")));
    }

    #[test]
    fn test_field_mapper_invalid_number() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("层级".to_string(), "abc".to_string());

        let mapper = FieldMapper;
        let result = mapper.map_to_raw_network(row, 1);

        assert!(result.is_err());
    }

    #[test]
    fn test_field_mapper_invalid_flag() {
        let mut row = HashMap::new();
        row.insert("会员编号".to_string(), "M000001".to_string());
        row.insert("是否退网".to_string(), "也许".to_string());

        let mapper = FieldMapper;
        let result = mapper.map_to_raw_network(row, 1);

        assert!(result.is_err());
    }
}
