//! 服务查找引用解析
//!
//! 引用格式为 `name[@scope][:param]`：`name` 是服务名，`scope`
//! 选择在哪个容器的服务表中查找，`param` 使查找变为一次带参调用。
//! 解析是宽松的：格式不合法返回 `None` 而不是错误。

use once_cell::sync::Lazy;
use regex::Regex;

static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9_/@]+?)(?:@([a-z0-9_\-]+))?(?::([a-z0-9_.]+))?$")
        .expect("引用模式为常量，必定合法")
});

/// 解析后的服务查找引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReference {
    name: String,
    scope: Option<String>,
    param: Option<String>,
}

impl ServiceReference {
    /// 解析引用字符串
    ///
    /// 不符合引用格式时返回 `None`
    pub fn parse(reference: &str) -> Option<Self> {
        let captures = REFERENCE_PATTERN.captures(reference)?;

        Some(Self {
            name: captures.get(1)?.as_str().to_string(),
            scope: captures.get(2).map(|m| m.as_str().to_string()),
            param: captures.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// 服务名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 作用域（容器名）段
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// 调用参数段
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}
