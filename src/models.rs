// 结构体与自定义异常
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{error::Error as _, fmt, io, str::FromStr};
use thiserror::Error;

/// 学号与明文密码, 只在单次请求内存活, 不持久化也不打印
#[derive(Clone)]
pub struct Credential {
    student_id: String,
    raw_password: String
}

impl Credential {
    /// 缺少学号或密码时直接拒绝, 不会发起任何网络请求
    pub fn new(student_id: impl Into<String>, raw_password: impl Into<String>) -> Result<Self, LoginFailure> {
        let student_id = student_id.into();
        let raw_password = raw_password.into();

        if student_id.trim().is_empty() || raw_password.is_empty() {
            return Err(LoginFailure::MissingCredential)
        }

        Ok(Self { student_id, raw_password })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn raw_password(&self) -> &str {
        &self.raw_password
    }
}

// 手动实现 Debug, 密码一律打码
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("student_id", &self.student_id)
            .field("raw_password", &"******")
            .finish()
    }
}

/// 登录页下发的一次性随机数(randnumber), 允许为空
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    pub token: String
}

impl Challenge {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

/// 登录表单需要附带的密码策略信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicyFlags {
    pub char_class_mask: u8,    // 数字 8 | 小写 4 | 大写 2 | 其他 1
    pub length: usize,
    pub contains_account_id: bool
}

/// 可查询的数据种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Exam,
    Grade,
    Schedule
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Exam => "exam",
            DataKind::Grade => "grade",
            DataKind::Schedule => "schedule"
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataKind::Exam => "考试",
            DataKind::Grade => "成绩",
            DataKind::Schedule => "课表"
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = WebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "exam" => Ok(DataKind::Exam),
            "grade" => Ok(DataKind::Grade),
            "schedule" => Ok(DataKind::Schedule),
            _ => Err(WebError::InvalidRequest("无效的数据类型，支持：exam, grade, schedule".to_string()))
        }
    }
}

// 考试安排
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub course_name: String,
    pub exam_time: String,
    pub exam_location: String,
    pub seat_number: String,
    pub credit: String,
    pub exam_method: String,
    pub status: String
}

// 成绩, 学分按页面原样保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub course_name: String,
    pub course_type: String,
    pub credit: String,
    pub grade: String,
    pub semester: String,
    pub exam_date: String,
    pub status: String
}

// 课表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub course_name: String,
    pub teacher: String,
    pub classroom: String,
    pub day_of_week: String,
    pub time_slot: String,
    pub semester: String,
    pub status: String
}

/// 已爬取的数据, 序列化时直接输出列表
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortalData {
    Exams(Vec<ExamRecord>),
    Grades(Vec<GradeRecord>),
    Schedule(Vec<ScheduleRecord>)
}

impl PortalData {
    pub fn kind(&self) -> DataKind {
        match self {
            PortalData::Exams(_) => DataKind::Exam,
            PortalData::Grades(_) => DataKind::Grade,
            PortalData::Schedule(_) => DataKind::Schedule
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PortalData::Exams(list) => list.len(),
            PortalData::Grades(list) => list.len(),
            PortalData::Schedule(list) => list.len()
        }
    }
}

/// 握手所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Init,
    PageFetched,
    ChallengeResolved,
    FormSubmitted,
    Authenticated,
    Rejected
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStage::Init => "获取登录页",
            HandshakeStage::PageFetched => "解析登录页",
            HandshakeStage::ChallengeResolved => "提交登录表单",
            HandshakeStage::FormSubmitted => "判定登录结果",
            HandshakeStage::Authenticated => "已登录",
            HandshakeStage::Rejected => "登录被拒绝"
        };
        f.write_str(name)
    }
}

/// 网络层错误分类
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkCause {
    #[error("网络连接失败，请检查网络连接或目标网站是否可访问")]
    ConnectionRefused,

    #[error("请求超时，目标网站响应过慢")]
    Timeout,

    #[error("服务器返回错误：状态码 {0}")]
    ServerError(u16),

    #[error("未收到服务器响应，请检查网络连接或目标网站状态")]
    NoResponse,

    #[error("{0}")]
    Other(String)
}

impl From<&reqwest::Error> for NetworkCause {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return NetworkCause::Timeout
        }

        // 只有对方明确拒绝连接才算连接失败, DNS/TLS 等建连错误归为无响应
        if caused_by_refusal(err) {
            return NetworkCause::ConnectionRefused
        }

        if err.is_connect() {
            return NetworkCause::NoResponse
        }

        if let Some(status) = err.status() {
            return NetworkCause::ServerError(status.as_u16())
        }

        if err.is_request() || err.is_body() || err.is_decode() {
            return NetworkCause::NoResponse
        }

        NetworkCause::Other(err.to_string())
    }
}

impl From<reqwest::Error> for NetworkCause {
    fn from(err: reqwest::Error) -> Self {
        NetworkCause::from(&err)
    }
}

// 沿着 source 链查找底层的 io 错误
fn caused_by_refusal(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true
            }
        }
        source = inner.source();
    }
    false
}

/// 登录失败原因, 消息内不包含任何凭据
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("请提供学号和密码")]
    MissingCredential,

    #[error("登录失败：{stage}时{cause}")]
    Network { stage: HandshakeStage, cause: NetworkCause },

    #[error("登录失败：账号密码错误/参数不匹配/需要验证码")]
    Rejected,

    #[error("登录失败：{0}")]
    Internal(String)
}

// 网页爬取异常
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebScrapingError {
    #[error("爬取数据失败：{0}")]
    Network(NetworkCause),

    #[error("未爬取到{}数据，可能是页面结构变化或登录状态失效", .0.label())]
    NoData(DataKind)
}

/// 爬取结果, 调用方必须显式处理成功与失败
#[derive(Debug)]
pub enum FetchResult<T> {
    Success(T),
    Failure(WebScrapingError)
}

impl<T> FetchResult<T> {
    pub fn into_result(self) -> Result<T, WebScrapingError> {
        match self {
            FetchResult::Success(value) => Ok(value),
            FetchResult::Failure(err) => Err(err)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }
}

impl<T> From<Result<T, WebScrapingError>> for FetchResult<T> {
    fn from(result: Result<T, WebScrapingError>) -> Self {
        match result {
            Ok(value) => FetchResult::Success(value),
            Err(err) => FetchResult::Failure(err)
        }
    }
}

// 网页服务异常
#[derive(Debug, Error)]
pub enum WebError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Login(#[from] LoginFailure),

    #[error("{0}")]
    WebScrapingError(#[from] WebScrapingError),

    #[error("内部错误: {0}")]
    InternalError(String)
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Login(failure) => match failure {
                LoginFailure::MissingCredential => StatusCode::BAD_REQUEST,
                LoginFailure::Rejected => StatusCode::UNAUTHORIZED,
                LoginFailure::Network { .. } => StatusCode::BAD_GATEWAY,
                LoginFailure::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR
            },
            // 教务系统不可达或页面里没有数据, 都算上游问题
            WebError::WebScrapingError(_) => StatusCode::BAD_GATEWAY,
            WebError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// 根据 Axum 库的要求, 需要实现 IntoResponse
// 任何失败都包装成 {"success": false, "message": ...}
impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({"success": false, "message": self.to_string()}));

        (status, body).into_response()
    }
}
