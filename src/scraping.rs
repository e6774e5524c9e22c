// 获取数据层: 登录后抓取考试、成绩、课表表格
use crate::{
    auth::AuthenticatedSession,
    models::{DataKind, ExamRecord, FetchResult, GradeRecord, PortalData, ScheduleRecord, WebScrapingError}
};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};

lazy_static! {
    static ref TABLE: Selector = Selector::parse("table").expect("选择器必定合法");
    static ref TR: Selector = Selector::parse("tr").expect("选择器必定合法");
    static ref TD: Selector = Selector::parse("td").expect("选择器必定合法");
    static ref TBODY_TR: Selector = Selector::parse("table tbody tr").expect("选择器必定合法");
}

const UNKNOWN: &str = "未知";

// 单元格文本, 去掉首尾空白
fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

// 取第 n 个单元格, 缺失或为空时用 "未知" 代替
fn cell_or_unknown(tds: &[ElementRef], index: usize) -> String {
    tds.get(index)
        .map(cell_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// 解析考试安排: 每张表跳过首行, 至少 3 个单元格的行才算有效
pub fn parse_exam_table(html: &str) -> Vec<ExamRecord> {
    let document = Html::parse_document(html);
    let mut exams = Vec::new();

    for table in document.select(&TABLE) {
        for (row_index, tr) in table.select(&TR).enumerate().skip(1) {
            let tds: Vec<_> = tr.select(&TD).collect();
            if tds.len() < 3 {
                debug!("第 {} 行数据字段不足，跳过", row_index + 1);
                continue
            }

            exams.push(ExamRecord {
                course_name: cell_or_unknown(&tds, 1),
                exam_time: cell_or_unknown(&tds, 2),
                exam_location: cell_or_unknown(&tds, 3),
                seat_number: cell_or_unknown(&tds, 4),
                credit: cell_or_unknown(&tds, 5),
                exam_method: cell_or_unknown(&tds, 6),
                status: cell_or_unknown(&tds, 7)
            });
        }
    }

    exams
}

/// 解析成绩: tbody 中至少 10 个单元格的行
pub fn parse_grade_table(html: &str) -> Vec<GradeRecord> {
    let document = Html::parse_document(html);

    document.select(&TBODY_TR)
        .filter_map(|tr| {
            let tds: Vec<_> = tr.select(&TD).collect();
            if tds.len() < 10 { return None }

            Some(GradeRecord {
                course_name: cell_text(&tds[1]),
                course_type: cell_text(&tds[2]),
                credit: cell_text(&tds[3]),
                grade: cell_text(&tds[4]),
                semester: cell_text(&tds[7]),
                exam_date: cell_text(&tds[8]),
                status: cell_text(&tds[9])
            })
        })
        .collect()
}

/// 解析课表: tbody 中至少 8 个单元格的行
pub fn parse_schedule_table(html: &str) -> Vec<ScheduleRecord> {
    let document = Html::parse_document(html);

    document.select(&TBODY_TR)
        .filter_map(|tr| {
            let tds: Vec<_> = tr.select(&TD).collect();
            if tds.len() < 8 { return None }

            Some(ScheduleRecord {
                course_name: cell_text(&tds[1]),
                teacher: cell_text(&tds[2]),
                classroom: cell_text(&tds[3]),
                day_of_week: cell_text(&tds[4]),
                time_slot: cell_text(&tds[5]),
                semester: cell_text(&tds[6]),
                status: cell_text(&tds[7])
            })
        })
        .collect()
}

// 空列表视为抓取失败, 多半是页面结构变了或者会话失效
fn non_empty<T>(kind: DataKind, records: Vec<T>) -> Result<Vec<T>, WebScrapingError> {
    if records.is_empty() {
        warn!("爬取到的{}数据为空，检查页面结构是否变化", kind.label());
        return Err(WebScrapingError::NoData(kind))
    }

    info!("成功爬取 {} 条{}数据", records.len(), kind.label());
    Ok(records)
}

pub async fn fetch_exams(session: &AuthenticatedSession) -> FetchResult<Vec<ExamRecord>> {
    let url = session.endpoints().exam_arrangement();
    let result = match session.fetch_page(&url).await {
        Ok(html) => non_empty(DataKind::Exam, parse_exam_table(&html)),
        Err(err) => Err(err)
    };
    result.into()
}

pub async fn fetch_grades(session: &AuthenticatedSession) -> FetchResult<Vec<GradeRecord>> {
    let url = session.endpoints().grade_list();
    let result = match session.fetch_page(&url).await {
        Ok(html) => non_empty(DataKind::Grade, parse_grade_table(&html)),
        Err(err) => Err(err)
    };
    result.into()
}

pub async fn fetch_schedule(session: &AuthenticatedSession) -> FetchResult<Vec<ScheduleRecord>> {
    let url = session.endpoints().schedule_list();
    let result = match session.fetch_page(&url).await {
        Ok(html) => non_empty(DataKind::Schedule, parse_schedule_table(&html)),
        Err(err) => Err(err)
    };
    result.into()
}

/// 按数据种类抓取
pub async fn fetch(session: &AuthenticatedSession, kind: DataKind) -> FetchResult<PortalData> {
    info!("爬取{}数据：学号={}", kind.label(), session.account_id());

    let result = match kind {
        DataKind::Exam => fetch_exams(session).await.into_result().map(PortalData::Exams),
        DataKind::Grade => fetch_grades(session).await.into_result().map(PortalData::Grades),
        DataKind::Schedule => fetch_schedule(session).await.into_result().map(PortalData::Schedule)
    };
    result.into()
}
