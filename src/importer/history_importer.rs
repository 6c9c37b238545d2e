// ==========================================
// 生产排程引擎 - 完工历史导入器
// ==========================================
// 流程: 读取 CSV → 逐行校验 → 有效行批量写入 completion_history
// 无效行不阻断导入,随结果返回拒绝原因
// ==========================================

use crate::db::TS_FORMAT;
use crate::domain::history::CompletionRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::history_repo::CompletionHistoryRepository;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// CSV 行 (表头与字段名一致)
#[derive(Debug, Deserialize)]
struct HistoryCsvRow {
    #[serde(default)]
    record_id: Option<String>,
    #[serde(default)]
    plan_id: Option<String>,
    product_code: String,
    resource_id: String,
    quantity: f64,
    duration_minutes: i64,
    completed_at: String,
}

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    /// 数据行号 (表头后从 1 开始)
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RowRejection>,
}

// ==========================================
// HistoryImporter - 完工历史导入器
// ==========================================
pub struct HistoryImporter {
    history_repo: Arc<CompletionHistoryRepository>,
}

impl HistoryImporter {
    pub fn new(history_repo: Arc<CompletionHistoryRepository>) -> Self {
        Self { history_repo }
    }

    /// 从文件导入
    pub fn import_file(&self, path: &Path) -> ImportResult<HistoryImportSummary> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }
        let file = std::fs::File::open(path)?;
        self.import_reader(file)
    }

    /// 从任意读取源导入
    pub fn import_reader<R: Read>(&self, source: R) -> ImportResult<HistoryImportSummary> {
        let (records, mut summary) = parse_rows(source)?;
        if !records.is_empty() {
            summary.imported = self.history_repo.insert_batch(&records)?;
        }
        for r in &summary.rejected {
            warn!(row = r.row, reason = %r.reason, "完工记录被拒绝");
        }
        info!(
            total = summary.total_rows,
            imported = summary.imported,
            rejected = summary.rejected.len(),
            "完工历史导入完成"
        );
        Ok(summary)
    }
}

fn parse_rows<R: Read>(source: R) -> ImportResult<(Vec<CompletionRecord>, HistoryImportSummary)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut records = Vec::new();
    let mut summary = HistoryImportSummary::default();
    for (idx, result) in reader.deserialize::<HistoryCsvRow>().enumerate() {
        let row = idx + 1;
        summary.total_rows += 1;
        let parsed = result
            .map_err(|e| ImportError::CsvParseError(e.to_string()))
            .and_then(|raw| to_record(row, raw));
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => summary.rejected.push(RowRejection {
                row,
                reason: e.to_string(),
            }),
        }
    }
    Ok((records, summary))
}

fn to_record(row: usize, raw: HistoryCsvRow) -> ImportResult<CompletionRecord> {
    if raw.product_code.is_empty() {
        return Err(range_error(row, "product_code", "不能为空"));
    }
    if raw.resource_id.is_empty() {
        return Err(range_error(row, "resource_id", "不能为空"));
    }
    if raw.quantity <= 0.0 || !raw.quantity.is_finite() {
        return Err(range_error(row, "quantity", "必须为正数"));
    }
    if raw.duration_minutes <= 0 {
        return Err(range_error(row, "duration_minutes", "必须为正数"));
    }
    let completed_at = NaiveDateTime::parse_from_str(&raw.completed_at, TS_FORMAT).map_err(|_| {
        ImportError::DateFormatError {
            row,
            field: "completed_at".to_string(),
            value: raw.completed_at.clone(),
        }
    })?;

    Ok(CompletionRecord {
        record_id: raw
            .record_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        plan_id: raw.plan_id.filter(|s| !s.is_empty()),
        product_code: raw.product_code,
        resource_id: raw.resource_id,
        quantity: raw.quantity,
        duration_minutes: raw.duration_minutes,
        completed_at,
    })
}

fn range_error(row: usize, field: &str, message: &str) -> ImportError {
    ImportError::ValueRangeError {
        row,
        field: field.to_string(),
        message: message.to_string(),
    }
}
