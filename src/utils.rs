// 小工具库
use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;

lazy_static! {
    // 默认去除空白字符, 与登录页脚本里 trim() 不带参数时一致
    static ref WHITESPACE: TrimPattern = TrimPattern::new(r"\s+").expect("空白字符正则必定合法");
}

/// 提供当前时间
pub fn current_time() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// 格式化信息, 形如 `[时间][级别] 内容`
pub fn format_log_msg(level: &str, msg: &str) -> String {
    format!("[{}][{}] {}", current_time(), level, msg)
}

/// 初始化日志, 默认 info 级别, 可通过 RUST_LOG 覆盖
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "{}", format_log_msg(record.level().as_str(), &record.args().to_string()))
        })
        .init();
}

/// 首尾裁剪模式: 同一段正则分别锚定在开头和结尾
#[derive(Debug, Clone)]
pub struct TrimPattern {
    start: Regex,
    end: Regex
}

impl TrimPattern {
    // pattern 会被包进分组并允许重复出现, `ab` 可以裁掉 `ababX` 开头的 `abab`
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            start: Regex::new(&format!("^(?:{})+", pattern))?,
            end: Regex::new(&format!("(?:{})+$", pattern))?
        })
    }

    pub fn whitespace() -> &'static TrimPattern {
        &WHITESPACE
    }
}

/// 去掉开头匹配的部分
pub fn trim_start(input: &str, pattern: &TrimPattern) -> String {
    pattern.start.replace(input, "").into_owned()
}

/// 去掉结尾匹配的部分
pub fn trim_end(input: &str, pattern: &TrimPattern) -> String {
    pattern.end.replace(input, "").into_owned()
}

/// 去掉首尾匹配的部分
pub fn trim(input: &str, pattern: &TrimPattern) -> String {
    trim_end(&trim_start(input, pattern), pattern)
}
