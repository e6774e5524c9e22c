// 从登录页源码中提取 randnumber
use crate::models::Challenge;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

lazy_static! {
    // 按顺序尝试, 登录页历史上出现过这三种写法, 缺一不可
    static ref RANDNUMBER_PATTERNS: [Regex; 3] = [
        Regex::new(r#"var\s+_randnumber\s*=\s*"([^"]+)"\s*;"#).expect("randnumber 正则必定合法"),
        Regex::new(r#"var\s+randnumber\s*=\s*"([^"]+)"\s*;"#).expect("randnumber 正则必定合法"),
        Regex::new(r#"id="randnumber"[^>]*value="([^"]+)""#).expect("randnumber 正则必定合法"),
    ];
}

/// 第一个命中的模式胜出, 全部未命中时返回空的 randnumber
pub fn extract(login_page: &str) -> Challenge {
    for (index, pattern) in RANDNUMBER_PATTERNS.iter().enumerate() {
        if let Some(token) = pattern.captures(login_page).and_then(|caps| caps.get(1)) {
            debug!("第{}种模式命中 randnumber", index + 1);
            return Challenge::new(token.as_str())
        }
    }

    warn!("未提取到randnumber，使用空字符串");
    Challenge::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_variable() {
        let page = r#"<script>var _randnumber = "abcd";</script>"#;
        assert_eq!(extract(page).token, "abcd");
    }

    #[test]
    fn plain_variable() {
        let page = r#"<script>var schoolcode = "10001"; var randnumber = "x9Y2";</script>"#;
        assert_eq!(extract(page).token, "x9Y2");
    }

    #[test]
    fn element_attribute() {
        let page = r#"<input type="hidden" id="randnumber" name="randnumber" value="7788"/>"#;
        assert_eq!(extract(page).token, "7788");
    }

    #[test]
    fn first_pattern_wins_over_later_ones() {
        let page = r#"
            <input id="randnumber" value="from-attr"/>
            <script>
                var randnumber = "from-plain";
                var _randnumber = "from-underscore";
            </script>"#;
        assert_eq!(extract(page).token, "from-underscore");

        let without_underscore = r#"<input id="randnumber" value="from-attr"/><script>var randnumber = "from-plain";</script>"#;
        assert_eq!(extract(without_underscore).token, "from-plain");
    }

    #[test]
    fn missing_token_is_empty_not_error() {
        assert!(extract("<html><body>登录</body></html>").is_empty());
        // 空值不算命中
        assert!(extract(r#"var _randnumber = "";"#).is_empty());
    }
}
