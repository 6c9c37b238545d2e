// ==========================================
// 生产排程引擎 - 请求分发
// ==========================================
// 职责: JSON 请求 → ScheduleApi 调用 → JSON 响应
// 格式: {"id": ..., "command": "auto_schedule", ...参数}
// ==========================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ApiError, ApiResult, ErrorResponse, ScheduleApi};
use crate::config::CustomStrategyProfile;
use crate::domain::resource::Resource;
use crate::engine::orchestrator::{
    AutoScheduleRequest, ManualScheduleRequest, NewPlanRequest, RescheduleRequest, ScheduleScope,
    DEFAULT_ACTOR,
};

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_limit() -> usize {
    20
}

/// 单条请求
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    // ===== 排程 =====
    AutoSchedule(AutoScheduleRequest),
    ManualSchedule(ManualScheduleRequest),
    Reschedule(RescheduleRequest),

    // ===== 查询 =====
    Conflicts(ScheduleScope),
    Gantt(ScheduleScope),
    GetPlan {
        plan_id: String,
    },
    ListPlans,
    ListScheduleRuns {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    GetScheduleRun {
        run_id: String,
    },

    // ===== 计划生命周期 =====
    SubmitPlan(NewPlanRequest),
    StartPlan {
        plan_id: String,
        #[serde(default = "default_actor")]
        actor: String,
    },
    ReportProgress {
        plan_id: String,
        completed_quantity: f64,
        #[serde(default = "default_actor")]
        actor: String,
    },
    CompletePlan {
        plan_id: String,
        #[serde(default)]
        completed_quantity: Option<f64>,
        #[serde(default = "default_actor")]
        actor: String,
    },
    CancelPlan {
        plan_id: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default = "default_actor")]
        actor: String,
    },

    // ===== 资源/历史/配置 =====
    UpsertResource(Resource),
    ListResources,
    ImportHistory {
        path: PathBuf,
    },
    GetConfig,
    SetConfig {
        key: String,
        value: String,
    },
    SaveCustomStrategy(CustomStrategyProfile),
    ListCustomStrategies,
}

impl Request {
    pub fn command(&self) -> &'static str {
        match self {
            Request::AutoSchedule(_) => "auto_schedule",
            Request::ManualSchedule(_) => "manual_schedule",
            Request::Reschedule(_) => "reschedule",
            Request::Conflicts(_) => "conflicts",
            Request::Gantt(_) => "gantt",
            Request::GetPlan { .. } => "get_plan",
            Request::ListPlans => "list_plans",
            Request::ListScheduleRuns { .. } => "list_schedule_runs",
            Request::GetScheduleRun { .. } => "get_schedule_run",
            Request::SubmitPlan(_) => "submit_plan",
            Request::StartPlan { .. } => "start_plan",
            Request::ReportProgress { .. } => "report_progress",
            Request::CompletePlan { .. } => "complete_plan",
            Request::CancelPlan { .. } => "cancel_plan",
            Request::UpsertResource(_) => "upsert_resource",
            Request::ListResources => "list_resources",
            Request::ImportHistory { .. } => "import_history",
            Request::GetConfig => "get_config",
            Request::SetConfig { .. } => "set_config",
            Request::SaveCustomStrategy(_) => "save_custom_strategy",
            Request::ListCustomStrategies => "list_custom_strategies",
        }
    }
}

/// 带请求ID的信封
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub request: Request,
}

/// 单条响应
#[derive(Debug, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Response {
    pub fn success(id: Option<Value>, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, err: &ApiError) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(err.to_response()),
        }
    }
}

/// 解析并执行一行请求
pub async fn handle_line(api: &ScheduleApi, line: &str) -> Response {
    let envelope: RequestEnvelope = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(e) => {
            let err = ApiError::InvalidInput(format!("请求格式错误: {}", e));
            return Response::failure(None, &err);
        }
    };
    let command = envelope.request.command();
    match dispatch(api, envelope.request).await {
        Ok(data) => Response::success(envelope.id, data),
        Err(e) => {
            tracing::warn!(command, code = e.code(), error = %e, "请求失败");
            Response::failure(envelope.id, &e)
        }
    }
}

/// 执行请求
pub async fn dispatch(api: &ScheduleApi, request: Request) -> ApiResult<Value> {
    match request {
        Request::AutoSchedule(req) => to_json(api.auto_schedule(req).await?),
        Request::ManualSchedule(req) => to_json(api.manual_schedule(req).await?),
        Request::Reschedule(req) => to_json(api.reschedule(req).await?),
        Request::Conflicts(scope) => to_json(api.conflicts(scope).await?),
        Request::Gantt(scope) => to_json(api.gantt(scope).await?),
        Request::GetPlan { plan_id } => to_json(api.get_plan(&plan_id)?),
        Request::ListPlans => to_json(api.list_plans()?),
        Request::ListScheduleRuns { limit } => to_json(api.list_schedule_runs(limit)?),
        Request::GetScheduleRun { run_id } => to_json(api.get_schedule_run(&run_id)?),
        Request::SubmitPlan(req) => to_json(api.submit_plan(req)?),
        Request::StartPlan { plan_id, actor } => to_json(api.start_plan(&plan_id, &actor).await?),
        Request::ReportProgress {
            plan_id,
            completed_quantity,
            actor,
        } => to_json(api.report_progress(&plan_id, completed_quantity, &actor).await?),
        Request::CompletePlan {
            plan_id,
            completed_quantity,
            actor,
        } => to_json(api.complete_plan(&plan_id, completed_quantity, &actor).await?),
        Request::CancelPlan {
            plan_id,
            reason,
            actor,
        } => to_json(api.cancel_plan(&plan_id, reason, &actor).await?),
        Request::UpsertResource(resource) => to_json(api.upsert_resource(resource)?),
        Request::ListResources => to_json(api.list_resources()?),
        Request::ImportHistory { path } => to_json(api.import_history(&path)?),
        Request::GetConfig => to_json(api.get_config()?),
        Request::SetConfig { key, value } => {
            api.set_config_value(&key, &value)?;
            Ok(Value::Null)
        }
        Request::SaveCustomStrategy(profile) => {
            api.save_custom_strategy(profile)?;
            Ok(Value::Null)
        }
        Request::ListCustomStrategies => to_json(api.list_custom_strategies()?),
    }
}

fn to_json<T: Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::InternalError(format!("序列化失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{AppOptions, AppState};

    #[test]
    fn test_parse_envelope() {
        let env: RequestEnvelope = serde_json::from_str(
            r#"{"id": 7, "command": "start_plan", "plan_id": "P1"}"#,
        )
        .unwrap();
        assert_eq!(env.id, Some(serde_json::json!(7)));
        match env.request {
            Request::StartPlan { plan_id, actor } => {
                assert_eq!(plan_id, "P1");
                assert_eq!(actor, DEFAULT_ACTOR);
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let env: RequestEnvelope =
            serde_json::from_str(r#"{"command": "conflicts", "resource_id": "R1"}"#).unwrap();
        assert_eq!(env.request.command(), "conflicts");
    }

    #[tokio::test]
    async fn test_handle_line_round_trip() {
        let state = AppState::in_memory(AppOptions::default()).unwrap();
        let api = state.schedule_api.as_ref();

        let resp = handle_line(
            api,
            r#"{"id":"a","command":"upsert_resource","resource_id":"R1","resource_name":"一号线",
               "kind":"LINE","capacity_unit":"pcs","daily_capacity_minutes":480,
               "nominal_rate_per_hour":10.0,"active":true}"#,
        )
        .await;
        assert!(resp.ok, "{:?}", resp.error);

        let resp = handle_line(api, r#"{"id":"b","command":"list_resources"}"#).await;
        assert_eq!(resp.data.unwrap().as_array().unwrap().len(), 1);

        let resp = handle_line(api, r#"{"id":"c","command":"get_plan","plan_id":"nope"}"#).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, "NOT_FOUND");

        let resp = handle_line(api, "not json").await;
        assert_eq!(resp.error.unwrap().code, "INVALID_INPUT");
    }
}
