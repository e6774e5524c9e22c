// 测试用的教务系统桩服务
use crate::crypto::hash_password;

use axum::{
    extract::{Form, State},
    http::{header::{COOKIE, SET_COOKIE}, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router
};
use std::{
    collections::HashMap,
    net::TcpListener as StdTcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex
    },
    time::Duration
};
use tokio::net::TcpListener;

const PREFIX: &str = "/rzzyjw";

#[derive(Debug, Clone)]
pub struct StubOptions {
    pub challenge: Option<String>,
    pub accounts: Vec<(String, String)>,
    pub page_status: StatusCode,
    pub submit_status: StatusCode,
    pub page_delay: Duration,
    pub empty_tables: bool
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            challenge: Some("abcd".to_string()),
            accounts: vec![
                ("2021001".to_string(), "secret".to_string()),
                ("alice".to_string(), "secret".to_string()),
                ("bob".to_string(), "hunter2".to_string())
            ],
            page_status: StatusCode::OK,
            submit_status: StatusCode::OK,
            page_delay: Duration::ZERO,
            empty_tables: false
        }
    }
}

struct StubState {
    options: StubOptions,
    page_hits: AtomicUsize,
    data_hits: AtomicUsize,
    page_headers: Mutex<Vec<HeaderMap>>,
    submissions: Mutex<Vec<HashMap<String, String>>>
}

pub struct StubPortal {
    pub base_url: String,
    state: Arc<StubState>
}

impl StubPortal {
    pub fn submissions(&self) -> Vec<HashMap<String, String>> {
        self.state.submissions.lock().unwrap().clone()
    }

    pub fn last_submission(&self) -> Option<HashMap<String, String>> {
        self.submissions().pop()
    }

    pub fn first_page_headers(&self) -> Option<HeaderMap> {
        self.state.page_headers.lock().unwrap().first().cloned()
    }

    pub fn data_hits(&self) -> usize {
        self.state.data_hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_portal(options: StubOptions) -> StubPortal {
    let state = Arc::new(StubState {
        options,
        page_hits: AtomicUsize::new(0),
        data_hits: AtomicUsize::new(0),
        page_headers: Mutex::new(Vec::new()),
        submissions: Mutex::new(Vec::new())
    });

    let app = Router::new()
        .route(&format!("{PREFIX}/cas/login.action"), get(login_page))
        .route(&format!("{PREFIX}/cas/login.action.html"), axum::routing::post(login_submit))
        .route(&format!("{PREFIX}/frame/home.action"), get(|| async { Html("<html><body>首页</body></html>") }))
        .route(&format!("{PREFIX}/student/examarrange/examarrange_query.jsp"), get(exam_page))
        .route(&format!("{PREFIX}/student/score/all/list.action"), get(grade_page))
        .route(&format!("{PREFIX}/student/schedule/list.action"), get(schedule_page))
        .with_state(Arc::clone(&state));

    let base_url = serve(app).await;
    StubPortal { base_url: format!("{}{}", base_url, PREFIX), state }
}

/// 在随机端口上启动路由, 返回 `http://127.0.0.1:端口`
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 一个刚释放、无人监听的端口
pub fn refused_base_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, PREFIX)
}

/// 接受连接后立即断开, 不返回任何响应
pub async fn dropping_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    format!("http://{}{}", addr, PREFIX)
}

async fn login_page(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let hit = state.page_hits.fetch_add(1, Ordering::SeqCst);
    state.page_headers.lock().unwrap().push(headers);

    if !state.options.page_delay.is_zero() {
        tokio::time::sleep(state.options.page_delay).await;
    }

    if state.options.page_status != StatusCode::OK {
        return (state.options.page_status, Html("<html>维护中</html>")).into_response()
    }

    let script = match &state.options.challenge {
        Some(token) => format!(r#"var _randnumber = "{}";"#, token),
        None => String::new()
    };
    let page = format!(
        r#"<html><head><script>var _webRootPath = "{PREFIX}/"; {script}</script></head>
        <body><form id="dosub"><input id="username"/><input id="password" type="password"/></form></body></html>"#
    );

    ([(SET_COOKIE, format!("JSESSIONID=page{}; Path=/", hit))], Html(page)).into_response()
}

async fn login_submit(State(state): State<Arc<StubState>>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.submissions.lock().unwrap().push(form.clone());

    if state.options.submit_status != StatusCode::OK {
        return (state.options.submit_status, Html("<html>服务器内部错误</html>")).into_response()
    }

    let username = form.get("username").cloned().unwrap_or_default();
    let randnumber = form.get("randnumber").cloned().unwrap_or_default();
    let submitted = form.get("password").cloned().unwrap_or_default();

    let accepted = state.options.accounts.iter()
        .find(|(account, _)| *account == username)
        .is_some_and(|(_, password)| hash_password(password, &randnumber) == submitted);

    if accepted {
        (
            [(SET_COOKIE, format!("CASTGC={}; Path=/", username))],
            Redirect::to(&format!("{PREFIX}/frame/home.action"))
        ).into_response()
    } else {
        Redirect::to(&format!("{PREFIX}/cas/login.action?error=1")).into_response()
    }
}

// 未登录访问数据页会被打回登录页
fn require_login(headers: &HeaderMap) -> Option<Response> {
    let logged_in = headers.get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.contains("CASTGC="));

    if logged_in {
        None
    } else {
        Some(Redirect::to(&format!("{PREFIX}/cas/login.action")).into_response())
    }
}

async fn exam_page(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.data_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(redirect) = require_login(&headers) {
        return redirect
    }
    if state.options.empty_tables {
        return Html("<html><table><tr><th>序号</th></tr></table></html>").into_response()
    }

    Html(r#"<html><body>
        <table>
            <tr><td>序号</td><td>课程</td><td>时间</td><td>地点</td><td>座位</td><td>学分</td><td>方式</td><td>状态</td></tr>
            <tr><td>1</td><td> 高等数学 </td><td>2025-01-06 09:00</td><td>A101</td><td>12</td><td>4</td><td>闭卷</td><td>正常</td></tr>
            <tr><td>2</td><td>大学英语</td><td>2025-01-07 14:00</td><td></td></tr>
            <tr><td>说明</td></tr>
        </table>
        <table>
            <tr><td>表头</td></tr>
            <tr><td>3</td><td>线性代数</td><td>2025-01-08 09:00</td></tr>
        </table>
    </body></html>"#).into_response()
}

async fn grade_page(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.data_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(redirect) = require_login(&headers) {
        return redirect
    }
    if state.options.empty_tables {
        return Html("<html><table><tbody></tbody></table></html>").into_response()
    }

    Html(r#"<html><body><table>
        <thead><tr><th>序号</th><th>课程</th></tr></thead>
        <tbody>
            <tr><td>1</td><td>高等数学</td><td>必修</td><td>4.0</td><td>92</td><td>-</td><td>-</td><td>2024-2025-1</td><td>2025-01-06</td><td>正常</td></tr>
            <tr><td>2</td><td>体育</td><td>必修</td><td>一</td><td>优</td><td>-</td><td>-</td><td>2024-2025-1</td><td>2025-01-07</td><td>正常</td></tr>
            <tr><td>3</td><td>不完整</td><td>选修</td></tr>
        </tbody>
    </table></body></html>"#).into_response()
}

async fn schedule_page(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.data_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(redirect) = require_login(&headers) {
        return redirect
    }
    if state.options.empty_tables {
        return Html("<html><p>暂无课表</p></html>").into_response()
    }

    Html(r#"<html><body><table><tbody>
        <tr><td>1</td><td>高等数学</td><td>王老师</td><td>A101</td><td>星期一</td><td>1-2节</td><td>2024-2025-1</td><td>正常</td></tr>
        <tr><td>2</td><td>大学物理</td><td>李老师</td><td>B203</td><td>星期三</td><td>3-4节</td><td>2024-2025-1</td><td>调课</td></tr>
    </tbody></table></body></html>"#).into_response()
}
