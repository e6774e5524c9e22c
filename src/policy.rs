// 密码策略检查, 对应登录页 checkpwd() 写入的 txt_mm_* 隐藏域
use crate::{
    models::PasswordPolicyFlags,
    utils::{trim, TrimPattern}
};

const DIGIT: u8 = 8;
const LOWERCASE: u8 = 4;
const UPPERCASE: u8 = 2;
const OTHER: u8 = 1;

// 按 UTF-16 码元分类, 与浏览器里 charCodeAt 的结果一致
fn char_type(unit: u16) -> u8 {
    match unit {
        0x30..=0x39 => DIGIT,
        0x61..=0x7A => LOWERCASE,
        0x41..=0x5A => UPPERCASE,
        _ => OTHER
    }
}

/// 计算密码的字符类别掩码、长度以及是否包含账号
///
/// 长度同样按 UTF-16 码元计算, 也就是浏览器中 `String.length` 的值.
/// 是否包含账号: 双方都转小写并去掉首尾空白后做子串判断.
pub fn evaluate(password: &str, account_id: &str) -> PasswordPolicyFlags {
    let mut char_class_mask = 0;
    let mut length = 0;

    for unit in password.encode_utf16() {
        char_class_mask |= char_type(unit);
        length += 1;
    }

    let whitespace = TrimPattern::whitespace();
    let normalized_password = trim(&password.to_lowercase(), whitespace);
    let normalized_account = trim(&account_id.to_lowercase(), whitespace);

    PasswordPolicyFlags {
        char_class_mask,
        length,
        contains_account_id: normalized_password.contains(&normalized_account)
    }
}
