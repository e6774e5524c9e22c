// 登录握手层: 获取登录页 -> 提取 randnumber -> 计算密码与策略 -> 提交表单 -> 根据最终 URL 判定
use crate::{
    challenge,
    crypto::CredentialHasher,
    models::{Challenge, Credential, HandshakeStage, LoginFailure, NetworkCause, PasswordPolicyFlags, WebScrapingError},
    policy
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use reqwest::{
    cookie::{CookieStore, Jar},
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER, USER_AGENT},
    Client, Url
};
use std::{fmt, sync::Arc, time::Duration};

// 桌面浏览器 UA 池, 每个会话随机取一个并沿用到底
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15"
];

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// 最终 URL 仍包含该片段即视为被打回登录页
pub const LOGIN_PATH_MARKER: &str = "cas/login";

/// 教务系统各页面地址
#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    base_url: String,
    origin: Url
}

impl PortalEndpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let origin = Url::parse(&base_url).with_context(|| format!("教务系统地址无效: {}", base_url))?;

        Ok(Self { base_url, origin })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_page(&self) -> String {
        format!("{}/cas/login.action", self.base_url)
    }

    pub fn login_submit(&self) -> String {
        format!("{}/cas/login.action.html", self.base_url)
    }

    pub fn exam_arrangement(&self) -> String {
        format!("{}/student/examarrange/examarrange_query.jsp", self.base_url)
    }

    pub fn grade_list(&self) -> String {
        format!("{}/student/score/all/list.action", self.base_url)
    }

    pub fn schedule_list(&self) -> String {
        format!("{}/student/schedule/list.action", self.base_url)
    }
}

/// 登录表单字段, 顺序与登录页一致, 每个字段都必须出现
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    fields: Vec<(&'static str, String)>
}

impl LoginForm {
    pub fn build(account_id: &str, hashed_password: String, challenge: &Challenge, flags: &PasswordPolicyFlags) -> Self {
        let fields = vec![
            ("username", account_id.to_string()),
            ("password", hashed_password),
            ("randnumber", challenge.token.clone()),
            ("isPasswordPolicy", "1".to_string()),
            ("txt_mm_expression", flags.char_class_mask.to_string()),
            ("txt_mm_length", flags.length.to_string()),
            ("txt_mm_userzh", if flags.contains_account_id { "1" } else { "0" }.to_string()),
            ("hid_flag", "1".to_string()),  // 走免验证码流程
            ("hid_dxyzm", String::new()),
            ("hid_sjhm", String::new())
        ];

        Self { fields }
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }
}

/// 登录成功后的会话, 持有独立的 Cookie 存储和请求头配置
pub struct AuthenticatedSession {
    client: Client,
    jar: Arc<Jar>,
    endpoints: PortalEndpoints,
    user_agent: &'static str,
    account_id: String
}

impl AuthenticatedSession {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn user_agent(&self) -> &'static str {
        self.user_agent
    }

    pub fn endpoints(&self) -> &PortalEndpoints {
        &self.endpoints
    }

    /// 发往教务系统的 Cookie 请求头, 内容不得写入日志
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        self.jar.cookies(&self.endpoints.origin)
    }

    pub fn has_cookies(&self) -> bool {
        self.cookie_header().is_some_and(|value| !value.is_empty())
    }

    /// 带着会话 Cookie 获取数据页面, Referer 固定为登录页
    pub async fn fetch_page(&self, url: &str) -> Result<String, WebScrapingError> {
        debug!("发送GET请求到：{}", url);

        let response = self.client.get(url)
            .header(REFERER, self.endpoints.login_page())
            .send().await
            .map_err(|e| WebScrapingError::Network(NetworkCause::from(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebScrapingError::Network(NetworkCause::ServerError(status.as_u16())))
        }

        response.text().await.map_err(|e| WebScrapingError::Network(NetworkCause::from(&e)))
    }
}

// Cookie 只输出是否存在
impl fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("account_id", &self.account_id)
            .field("base_url", &self.endpoints.base_url())
            .field("user_agent", &self.user_agent())
            .field("has_cookies", &self.has_cookies())
            .finish()
    }
}

/// 单次登录的结果, 不会自动重试
#[derive(Debug)]
pub enum LoginOutcome {
    Success(AuthenticatedSession),
    Failure(LoginFailure)
}

impl LoginOutcome {
    pub fn into_result(self) -> Result<AuthenticatedSession, LoginFailure> {
        match self {
            LoginOutcome::Success(session) => Ok(session),
            LoginOutcome::Failure(failure) => Err(failure)
        }
    }
}

/// 登录握手, 每次调用都新建独立的 Cookie 存储
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    endpoints: PortalEndpoints,
    timeout: Duration,
    hasher: CredentialHasher
}

impl SessionAuthenticator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoints: PortalEndpoints::new(base_url)?,
            timeout,
            hasher: CredentialHasher::new()
        })
    }

    pub fn endpoints(&self) -> &PortalEndpoints {
        &self.endpoints
    }

    /// 执行一次完整登录
    ///
    /// `challenge_override` 非空时优先于登录页中提取到的 randnumber.
    pub async fn login(&self, credential: &Credential, challenge_override: Option<&str>) -> LoginOutcome {
        match self.handshake(credential, challenge_override).await {
            Ok(session) => LoginOutcome::Success(session),
            Err(failure) => LoginOutcome::Failure(failure)
        }
    }

    async fn handshake(&self, credential: &Credential, challenge_override: Option<&str>) -> Result<AuthenticatedSession, LoginFailure> {
        let account_id = credential.student_id();
        info!("接收到登录请求：学号={}", account_id);

        let user_agent = pick_user_agent();
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .default_headers(base_headers(user_agent))
            .cookie_provider(Arc::clone(&jar))
            .timeout(self.timeout)
            .build()
            .map_err(|e| LoginFailure::Internal(e.to_string()))?;

        let login_page_url = self.endpoints.login_page();

        // Init -> PageFetched
        let mut stage = HandshakeStage::Init;
        debug!("访问登录页获取Cookie和randnumber：{}", login_page_url);

        let response = client.get(&login_page_url)
            .header(REFERER, login_page_url.as_str())
            .send().await
            .map_err(|e| network_failure(stage, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoginFailure::Network { stage, cause: NetworkCause::ServerError(status.as_u16()) })
        }

        let markup = response.text().await.map_err(|e| network_failure(stage, &e))?;
        stage = HandshakeStage::PageFetched;
        debug!("{}：登录页状态码 {}", stage, status);

        // PageFetched -> ChallengeResolved
        let challenge = match challenge_override.filter(|token| !token.is_empty()) {
            Some(token) => {
                debug!("使用调用方传入的randnumber");
                Challenge::new(token)
            }
            None => challenge::extract(&markup)
        };
        if challenge.is_empty() {
            debug!("randnumber为空，第二段摘要拼接空串");
        }
        stage = HandshakeStage::ChallengeResolved;

        // ChallengeResolved -> FormSubmitted
        let flags = policy::evaluate(credential.raw_password(), account_id);
        let hashed_password = self.hasher.hash(credential.raw_password(), &challenge.token);
        let form = LoginForm::build(account_id, hashed_password, &challenge, &flags);
        debug!(
            "密码策略：expression={} length={} userzh={}",
            flags.char_class_mask, flags.length, flags.contains_account_id
        );

        let response = client.post(self.endpoints.login_submit())
            .header(REFERER, login_page_url.as_str())
            .form(form.fields())
            .send().await
            .map_err(|e| network_failure(stage, &e))?;
        stage = HandshakeStage::FormSubmitted;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(LoginFailure::Network { stage, cause: NetworkCause::ServerError(status.as_u16()) })
        }

        // 教务系统不返回结构化结果, 只能看重定向后的地址
        let final_url = response.url().clone();
        debug!("登录请求最终URL：{}", final_url);

        if final_url.as_str().contains(LOGIN_PATH_MARKER) {
            warn!("{}：学号={} 被重定向回登录页", HandshakeStage::Rejected, account_id);
            return Err(LoginFailure::Rejected)
        }

        info!("{}：学号={}", HandshakeStage::Authenticated, account_id);

        Ok(AuthenticatedSession {
            client,
            jar,
            endpoints: self.endpoints.clone(),
            user_agent,
            account_id: account_id.to_string()
        })
    }
}

fn pick_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

fn base_headers(user_agent: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

fn network_failure(stage: HandshakeStage, err: &reqwest::Error) -> LoginFailure {
    let cause = NetworkCause::from(err);
    warn!("{}阶段网络错误：{}", stage, cause);
    LoginFailure::Network { stage, cause }
}
