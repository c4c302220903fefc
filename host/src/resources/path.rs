//! # 路径规范化模块
//!
//! 场景正文使用**相对于资源根目录的逻辑路径**：
//!
//! - 使用 `/` 作为路径分隔符（跨平台统一）
//! - 不包含开头的 `./` 或 `/`
//! - `..` 不会越过资源根目录

/// 规范化逻辑路径
///
/// 处理路径组件，包括：
/// - 统一使用 `/` 分隔符
/// - 移除开头的 `./`
/// - 处理 `..` 组件（向上级目录）
/// - 处理 `.` 组件（当前目录）
pub fn normalize_logical_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    let mut components = Vec::new();
    for component in normalized.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    components.join("/")
}

/// 解析相对路径
///
/// 把记录中的正文路径（相对于记录所在目录）解析为逻辑路径。
/// 以 `/` 开头的路径视为相对于资源根目录。
pub fn resolve_relative_path(base_dir: &str, relative_path: &str) -> String {
    if relative_path.starts_with('/') {
        return normalize_logical_path(relative_path);
    }

    let base = normalize_logical_path(base_dir);
    if base.is_empty() {
        return normalize_logical_path(relative_path);
    }

    normalize_logical_path(&format!("{}/{}", base, relative_path))
}

/// 提取逻辑路径的目录部分
pub fn extract_base_dir(path: &str) -> String {
    let normalized = normalize_logical_path(path);

    match normalized.rfind('/') {
        Some(last_slash) => normalized[..last_slash].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_logical_path("a/start.txt"), "a/start.txt");
        assert_eq!(normalize_logical_path("./a/start.txt"), "a/start.txt");
        assert_eq!(normalize_logical_path("a\\start.txt"), "a/start.txt");
        assert_eq!(normalize_logical_path("a//b/./c.txt"), "a/b/c.txt");
    }

    #[test]
    fn test_normalize_with_dotdot() {
        assert_eq!(normalize_logical_path("a/../b/end.txt"), "b/end.txt");
        assert_eq!(normalize_logical_path("a/b/../../c/d.txt"), "c/d.txt");
        assert_eq!(normalize_logical_path("../../escape.txt"), "escape.txt");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative_path("stories/a/start", "body.txt"),
            "stories/a/start/body.txt"
        );
        assert_eq!(
            resolve_relative_path("stories/a/start", "../shared/intro.txt"),
            "stories/a/shared/intro.txt"
        );
        assert_eq!(resolve_relative_path("", "body.txt"), "body.txt");
        assert_eq!(
            resolve_relative_path("stories/a", "/common/body.txt"),
            "common/body.txt"
        );
    }

    #[test]
    fn test_extract_base_dir() {
        assert_eq!(extract_base_dir("stories/a/resource.json"), "stories/a");
        assert_eq!(extract_base_dir("resource.json"), "");
    }
}
