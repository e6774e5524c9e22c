// 启动配置, 命令行参数优先, 其次环境变量, 最后是默认值
use clap::Parser;
use std::{net::SocketAddr, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "教务系统登录与数据中转服务", long_about = None)]
pub struct Config {
    /// 中转服务监听地址
    #[arg(long, env = "JW_RELAY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// 教务系统根地址
    #[arg(long, env = "JW_PORTAL_BASE", default_value = "http://jwgl.rzvtc.cn:8081/rzzyjw")]
    pub portal_base: String,

    /// 每次请求教务系统的超时时间(秒)
    #[arg(long, env = "JW_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// 查询结果缓存时间(秒)
    #[arg(long, env = "JW_CACHE_TTL_SECS", default_value_t = 600)]
    pub cache_ttl_secs: u64
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
