// 业务逻辑层 - 校验输入、查缓存、登录、抓取、写缓存
use crate::{
    auth::SessionAuthenticator,
    cache::ResponseCache,
    config::Config,
    crypto::hash_password,
    models::{Credential, DataKind, PortalData, WebError},
    scraping
};

use anyhow::Result;
use log::{debug, info, warn};
use std::time::Duration;

/// 缓存键: 学号 + 数据种类, 不同账号的数据不会互相命中
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub account_id: String,
    pub kind: DataKind
}

// 缓存值附带凭据校验串, 只有同一密码的请求才能命中
#[derive(Debug, Clone)]
struct CachedData {
    verifier: String,
    data: PortalData
}

fn credential_verifier(credential: &Credential) -> String {
    hash_password(credential.raw_password(), credential.student_id())
}

/// 一次查询请求
#[derive(Debug)]
pub struct DataRequest {
    pub credential: Credential,
    pub kind: DataKind,
    pub randnumber: Option<String>
}

impl DataRequest {
    pub fn new(student_id: &str, password: &str, kind: DataKind, randnumber: Option<String>) -> Result<Self, WebError> {
        Ok(Self {
            credential: Credential::new(student_id, password)?,
            kind,
            randnumber
        })
    }
}

pub struct PortalService {
    authenticator: SessionAuthenticator,
    cache: ResponseCache<CacheKey, CachedData>
}

impl PortalService {
    pub fn new(portal_base: &str, timeout: Duration, cache_ttl: Duration) -> Result<Self> {
        let authenticator = SessionAuthenticator::new(portal_base, timeout)?;
        info!("教务系统地址：{}", authenticator.endpoints().base_url());

        Ok(Self { authenticator, cache: ResponseCache::new(cache_ttl) })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.portal_base, config.timeout(), config.cache_ttl())
    }

    /// 登录并获取指定类型的数据, 每次最多登录一次, 不重试
    pub async fn fetch_data(&self, request: &DataRequest) -> Result<PortalData, WebError> {
        let account_id = request.credential.student_id();
        let key = CacheKey { account_id: account_id.to_string(), kind: request.kind };
        let verifier = credential_verifier(&request.credential);

        if let Some(cached) = self.cache.get(&key) {
            if cached.verifier == verifier {
                info!("缓存命中，直接返回{}数据：学号={}", request.kind.label(), account_id);
                return Ok(cached.data)
            }
        }

        let session = self.authenticator
            .login(&request.credential, request.randnumber.as_deref())
            .await
            .into_result()?;

        let fetched = scraping::fetch(&session, request.kind).await;
        if !fetched.is_success() {
            warn!("{}数据获取失败，不写入缓存：学号={}", request.kind.label(), account_id);
        }
        let data = fetched.into_result()?;
        info!("成功获取 {} 条{}数据：学号={}", data.len(), request.kind.label(), account_id);

        self.cache.set(key, CachedData { verifier, data: data.clone() });
        Ok(data)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn purge_cache(&self) -> usize {
        let purged = self.cache.purge_expired();
        if !self.cache.is_empty() {
            debug!("缓存中仍有 {} 条有效数据", self.cache.len());
        }
        purged
    }
}
