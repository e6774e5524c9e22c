// 路由控制器, 所有响应都是 {"success": ..., ...} 信封
use crate::{
    business::{DataRequest, PortalService},
    models::{DataKind, PortalData, WebError}
};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub type AppState = Arc<PortalService>;

// 旧版接口字段: studentId / password / randnumber
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataForm {
    student_id: String,
    password: String,
    data_type: String,
    randnumber: String
}

// 新版考试查询接口字段: username / password / randnumber
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExamQueryForm {
    username: String,
    password: String,
    randnumber: String
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

// JSON 解析失败也要返回信封
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, WebError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| WebError::InvalidRequest(format!("请求格式错误: {}", e.body_text())))
}

/// `{success, <kind>Count, <kind>List}`
pub fn data_envelope(data: &PortalData) -> Result<Value, WebError> {
    let kind = data.kind().as_str();
    let list = serde_json::to_value(data).map_err(|e| WebError::InternalError(e.to_string()))?;

    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(format!("{}Count", kind), json!(data.len()));
    body.insert(format!("{}List", kind), list);

    Ok(Value::Object(body))
}

async fn serve_kind(service: &PortalService, form: DataForm, kind: DataKind) -> Result<Json<Value>, WebError> {
    info!("收到{}数据请求", kind.label());

    let request = DataRequest::new(&form.student_id, &form.password, kind, non_empty(form.randnumber))
        .inspect_err(|e| warn!("请求参数不完整：{}", e))?;
    let data = service.fetch_data(&request).await?;

    info!("请求处理完成，返回 {} 条{}数据", data.len(), kind.label());
    Ok(Json(data_envelope(&data)?))
}

pub async fn exam_handler(State(service): State<AppState>, payload: Result<Json<DataForm>, JsonRejection>) -> Result<Json<Value>, WebError> {
    serve_kind(&service, parse_body(payload)?, DataKind::Exam).await
}

pub async fn grade_handler(State(service): State<AppState>, payload: Result<Json<DataForm>, JsonRejection>) -> Result<Json<Value>, WebError> {
    serve_kind(&service, parse_body(payload)?, DataKind::Grade).await
}

pub async fn schedule_handler(State(service): State<AppState>, payload: Result<Json<DataForm>, JsonRejection>) -> Result<Json<Value>, WebError> {
    serve_kind(&service, parse_body(payload)?, DataKind::Schedule).await
}

// 通用接口, 额外需要 dataType
pub async fn data_handler(State(service): State<AppState>, payload: Result<Json<DataForm>, JsonRejection>) -> Result<Json<Value>, WebError> {
    let form = parse_body(payload)?;

    if form.student_id.is_empty() || form.password.is_empty() || form.data_type.is_empty() {
        return Err(WebError::InvalidRequest("请提供学号、密码和数据类型（exam, grade, schedule）".to_string()))
    }

    let kind = form.data_type.parse::<DataKind>()?;
    serve_kind(&service, form, kind).await
}

// 新版考试查询, 返回 {success, data: {exams}}
pub async fn query_exam_handler(State(service): State<AppState>, payload: Result<Json<ExamQueryForm>, JsonRejection>) -> Result<Json<Value>, WebError> {
    let form = parse_body(payload)?;
    info!("收到考试数据请求（新版接口）");

    let request = DataRequest::new(&form.username, &form.password, DataKind::Exam, non_empty(form.randnumber))?;
    let data = service.fetch_data(&request).await?;

    info!("请求处理完成，返回 {} 条考试数据", data.len());
    Ok(Json(json!({"success": true, "data": {"exams": data}})))
}

pub async fn fallback_handler(uri: Uri) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"success": false, "message": format!("接口不存在: {}", uri.path())}))).into_response()
}
