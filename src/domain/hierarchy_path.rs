// ==========================================
// 双轨会员网络管理系统 - 层级路径编解码
// ==========================================
// 依据: Network_Master_Spec.md - PART B2 层级路径
// 红线: 路径只追加不改写; 分隔符禁止出现在点位ID内
// ==========================================
// 职责: 点位层级路径的编码/解码/前缀判定
// 说明: 路径 = 根到该点位的点位ID序列, 以 '/' 连接;
//       子点位路径由父路径 O(1) 追加得到, 不做全树遍历
// ==========================================

use thiserror::Error;

/// 路径分隔符
pub const PATH_DELIMITER: char = '/';

// 点位ID由系统生成 (UUID v4), 正常不含以下字符;
// 存量导入的历史ID也必须满足, 否则 LIKE 前缀查询会失真。
const FORBIDDEN_CHARS: [char; 3] = ['/', '%', '_'];

/// 路径编解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathCodecError {
    #[error("路径段非法: '{segment}' (不允许包含 '/'、'%'、'_' 或为空)")]
    InvalidSegment { segment: String },

    #[error("层级路径为空或含空段: '{path}'")]
    MalformedPath { path: String },
}

/// 校验单个路径段 (点位ID)
///
/// # 红线
/// 分隔符绝不允许出现在点位ID内 (强制校验, 不做假设)
pub fn validate_segment(segment: &str) -> Result<(), PathCodecError> {
    if segment.is_empty() || segment.chars().any(|c| FORBIDDEN_CHARS.contains(&c)) {
        return Err(PathCodecError::InvalidSegment {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// 编码根点位路径 (路径 = 自身点位ID)
pub fn encode_root(position_id: &str) -> Result<String, PathCodecError> {
    validate_segment(position_id)?;
    Ok(position_id.to_string())
}

/// 编码子点位路径 (父路径 + '/' + 自身点位ID)
///
/// # 参数
/// - `parent_path`: 父点位的层级路径
/// - `position_id`: 新点位ID
///
/// # 返回
/// 子点位的完整层级路径 (O(1) 追加)
pub fn encode_child(parent_path: &str, position_id: &str) -> Result<String, PathCodecError> {
    validate_segment(position_id)?;
    decode(parent_path)?;
    Ok(format!("{}{}{}", parent_path, PATH_DELIMITER, position_id))
}

/// 解码层级路径为祖先点位ID序列 (根在前, 自身在末)
pub fn decode(path: &str) -> Result<Vec<&str>, PathCodecError> {
    if path.is_empty() {
        return Err(PathCodecError::MalformedPath {
            path: path.to_string(),
        });
    }
    let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PathCodecError::MalformedPath {
            path: path.to_string(),
        });
    }
    Ok(segments)
}

/// 由路径推导层级 (根 = 0)
pub fn level_of(path: &str) -> Result<i64, PathCodecError> {
    Ok(decode(path)?.len() as i64 - 1)
}

/// 路径末段 (即该点位自身的ID)
pub fn last_segment(path: &str) -> Option<&str> {
    path.rsplit(PATH_DELIMITER).next()
}

/// 父路径 (根点位返回 None)
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind(PATH_DELIMITER).map(|idx| &path[..idx])
}

/// 判断 candidate 是否为 ancestor_path 的严格扩展
/// (即 candidate 位于 ancestor 的伞下, 不含 ancestor 自身)
pub fn is_strict_extension(ancestor_path: &str, candidate: &str) -> bool {
    candidate.len() > ancestor_path.len() + 1
        && candidate.starts_with(ancestor_path)
        && candidate.as_bytes()[ancestor_path.len()] == PATH_DELIMITER as u8
}

/// 伞下查询的 SQL LIKE 模式 (严格前缀扩展)
///
/// 路径段经 `validate_segment` 排除了 '%' 与 '_',
/// 因此该模式可直接用于 LIKE 而无需 ESCAPE。
pub fn descendant_like_pattern(path: &str) -> String {
    format!("{}{}%", path, PATH_DELIMITER)
}
