use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 有序Cookie表
///
/// 只保存 name/value,不建模 Domain/Path 作用域。
/// 同名cookie后写覆盖先写,但保留首次出现的位置,
/// 因此序列化结果对同一输入是确定的。
///
/// 该表只服务于单个登录会话的cookie透传,不要把它当作通用的 cookie jar。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieMap {
    entries: IndexMap<String, String>,
}

impl CookieMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 `Set-Cookie` 响应头
    ///
    /// 多条 `Set-Cookie` 以逗号拼接在一起时,`Expires` 日期中的逗号会与分隔符冲突。
    /// 处理规则:
    /// 1. 按逗号切分
    /// 2. 含 `Expires=` 的片段与紧邻的前一个片段重新拼接
    /// 3. 丢弃完全重复的片段
    /// 4. 每个片段取 `;` 之前的 `name=value`,后出现的同名值覆盖先前的值
    ///
    /// 属性 (Path, Domain, Expires...) 全部丢弃,因此解析与序列化并不互逆。
    ///
    /// # 示例
    /// ```
    /// use qr_login_bridge::models::CookieMap;
    /// let cookies = CookieMap::parse_set_cookie("a=1; Expires=Wed, 09 Jun 2025 10:18:14 GMT, b=2");
    /// assert_eq!(cookies.to_cookie_header(), "a=1; b=2");
    /// ```
    pub fn parse_set_cookie(header: &str) -> Self {
        let fragments: Vec<&str> = header.split(',').collect();

        let mut merged: Vec<String> = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.iter().enumerate() {
            let entry = if index > 0 && fragment.contains("Expires=") {
                format!("{},{}", fragments[index - 1], fragment)
            } else {
                (*fragment).to_string()
            };

            if !merged.contains(&entry) {
                merged.push(entry);
            }
        }

        let mut cookies = Self::new();
        for entry in &merged {
            let key_value = entry.split(';').next().unwrap_or_default();
            if let Some((name, value)) = key_value.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name, value.trim());
                }
            }
        }

        cookies
    }

    /// 解析请求用的 `Cookie` 头 (`a=1; b=2`)
    ///
    /// 不含 `=` 的片段会被忽略。
    pub fn parse_cookie_header(header: &str) -> Self {
        let mut cookies = Self::new();
        for pair in header.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name, value.trim());
                }
            }
        }
        cookies
    }

    /// 插入或覆盖
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// 获取指定cookie的值
    ///
    /// 注意: 仅在内部使用,不应记录到日志。
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 将 `uin` 复制为 `p_uin`
    ///
    /// 部分站点接口只认 `p_uin`。`uin` 不存在时写入空字符串。
    pub fn alias_primary_uin(&mut self) {
        let uin = self.get("uin").unwrap_or_default().to_string();
        self.insert("p_uin", uin);
    }

    /// 转换为cookie header格式
    ///
    /// 按插入顺序以 `"; "` 拼接,不做任何转义。
    pub fn to_cookie_header(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 获取cookies的样本 (用于日志,不记录值)
    pub fn sample_for_logging(&self) -> String {
        self.entries
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 将 `Set-Cookie` 响应头直接转换为 `Cookie` 请求头
pub fn transform_set_cookie(header: &str) -> String {
    CookieMap::parse_set_cookie(header).to_cookie_header()
}
