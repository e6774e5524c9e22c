// 纯路由层
use crate::handler::{
    data_handler, exam_handler, fallback_handler, grade_handler,
    query_exam_handler, schedule_handler, AppState
};

use axum::{routing::post, Router};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/queryExam", post(query_exam_handler))  // 新版考试查询
        .route("/api/exam", post(exam_handler))     // 旧版考试数据
        .route("/api/grade", post(grade_handler))
        .route("/api/schedule", post(schedule_handler))
        .route("/api/data", post(data_handler))     // 通用接口, 需要 dataType
        .fallback(fallback_handler)
        .with_state(state)
}
