//! 自由编辑的任务定义（JSON文本），在发出请求之前完成校验

use serde_json::{Map, Value};

use crate::entities::Job;
use crate::value_objects::Concurrency;
use console_errors::{ConsoleError, ConsoleResult};

/// 通过校验的任务定义，保留用户写入的全部字段
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    name: String,
    body: Map<String, Value>,
}

impl JobDraft {
    pub fn parse(raw: &str) -> ConsoleResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ConsoleError::validation_error(format!("任务定义不是有效的JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_job(job: &Job) -> ConsoleResult<Self> {
        let value = serde_json::to_value(job)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> ConsoleResult<Self> {
        let Value::Object(body) = value else {
            return Err(ConsoleError::validation_error("任务定义必须是JSON对象"));
        };

        let name = match body.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(ConsoleError::validation_error("name 必须是字符串")),
            None => String::new(),
        };
        validate_name(&name)?;

        let parent_job = string_field(&body, "parent_job")?;
        if parent_job.as_deref() == Some(name.as_str()) {
            return Err(ConsoleError::validation_error("任务不能以自身作为父任务"));
        }

        // 设置了父任务时允许空调度
        let schedule = string_field(&body, "schedule")?.unwrap_or_default();
        if schedule.trim().is_empty() && parent_job.map_or(true, |p| p.is_empty()) {
            return Err(ConsoleError::validation_error("schedule 不能为空"));
        }

        if let Some(concurrency) = string_field(&body, "concurrency")? {
            concurrency
                .parse::<Concurrency>()
                .map_err(ConsoleError::validation_error)?;
        }

        match body.get("retries") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.is_u64() => {}
            Some(_) => return Err(ConsoleError::validation_error("retries 必须是非负整数")),
        }

        for key in ["executor_config", "processors", "tags", "metadata"] {
            match body.get(key) {
                None | Some(Value::Null) | Some(Value::Object(_)) => {}
                Some(_) => {
                    return Err(ConsoleError::validation_error(format!(
                        "{key} 必须是JSON对象"
                    )))
                }
            }
        }

        Ok(Self { name, body })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_body(self) -> Value {
        Value::Object(self.body)
    }
}

/// 任务名只允许小写字母、数字、下划线和短横线
pub fn validate_name(name: &str) -> ConsoleResult<()> {
    if name.is_empty() {
        return Err(ConsoleError::validation_error("name 不能为空"));
    }
    if let Some(illegal) = name
        .chars()
        .find(|c| !(c.is_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
    {
        return Err(ConsoleError::validation_error(format!(
            "name 包含非法字符 '{illegal}'"
        )));
    }
    Ok(())
}

fn string_field(body: &Map<String, Value>, key: &str) -> ConsoleResult<Option<String>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConsoleError::validation_error(format!("{key} 必须是字符串"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_draft_keeps_unknown_fields() {
        let draft = JobDraft::parse(
            r#"{"name":"nightly-backup","schedule":"@daily","executor":"shell",
                "executor_config":{"command":"backup.sh"},"owner":"ops"}"#,
        )
        .unwrap();
        assert_eq!(draft.name(), "nightly-backup");
        let body = draft.into_body();
        assert_eq!(body["owner"], "ops");
        assert_eq!(body["executor_config"]["command"], "backup.sh");
    }

    #[test]
    fn test_invalid_json_is_validation_error() {
        let err = JobDraft::parse(r#"{"name": "a", "schedule": "#).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(JobDraft::parse("[1,2]").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(JobDraft::parse(r#"{"schedule":"@daily"}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"Upper","schedule":"@daily"}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"has space","schedule":"@daily"}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"ok_name-1","schedule":"@daily"}"#).is_ok());
    }

    #[test]
    fn test_schedule_required_without_parent() {
        assert!(JobDraft::parse(r#"{"name":"child","schedule":""}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"child","parent_job":"parent"}"#).is_ok());
        assert!(JobDraft::parse(r#"{"name":"loop","parent_job":"loop"}"#).is_err());
    }

    #[test]
    fn test_concurrency_and_config_shapes() {
        assert!(JobDraft::parse(r#"{"name":"a","schedule":"@daily","concurrency":"maybe"}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"a","schedule":"@daily","concurrency":"forbid"}"#).is_ok());
        assert!(JobDraft::parse(r#"{"name":"a","schedule":"@daily","executor_config":"cmd"}"#).is_err());
        assert!(JobDraft::parse(r#"{"name":"a","schedule":"@daily","retries":-1}"#).is_err());
    }

    #[test]
    fn test_from_job() {
        let job = Job::new("from-job", "@hourly");
        let draft = JobDraft::from_job(&job).unwrap();
        assert_eq!(draft.into_body()["schedule"], "@hourly");
    }
}
