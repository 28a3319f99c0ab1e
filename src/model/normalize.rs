//! Normalization of loosely-typed producer input into strict records
//!
//! Producers emit JSON with inconsistent conventions: camelCase or
//! snake_case keys, free-form status strings, timestamps as RFC 3339
//! strings or epoch milliseconds. Everything is coerced here so the rest
//! of the crate only ever sees validated [`Session`] and [`Activity`] values.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{
    Activity, ActivityStatus, AgentType, FileOperation, FileOperationType, Session,
    ValidationError,
};

type Object = Map<String, Value>;

/// Build a validated session from arbitrary JSON
pub fn session_from_value(value: &Value) -> Result<Session, ValidationError> {
    let obj = as_object(value, "session")?;

    let id = required_str(obj, "id", "id")?;
    let start_time = required_time(obj, "startTime", "start_time")?;
    let end_time = optional_time(obj, "endTime", "end_time")?;
    let context = optional_str(obj, "context", "context")
        .or_else(|| optional_str(obj, "projectPath", "project_path"))
        .unwrap_or_default();

    let activities = match lookup(obj, "activities", "activities") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(activity_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ValidationError::InvalidField("activities")),
    };

    let total_tasks = optional_count(obj, "totalTasks", "total_tasks")?
        .unwrap_or(activities.len() as u64);
    let completed_tasks = match optional_count(obj, "completedTasks", "completed_tasks")? {
        Some(count) => count,
        None => activities
            .iter()
            .filter(|a| a.status == ActivityStatus::Completed)
            .count() as u64,
    };

    let session = Session {
        id,
        start_time,
        end_time,
        context,
        total_tasks: u32::try_from(total_tasks)
            .map_err(|_| ValidationError::InvalidField("totalTasks"))?,
        completed_tasks: u32::try_from(completed_tasks)
            .map_err(|_| ValidationError::InvalidField("completedTasks"))?,
        activities,
    };
    session.validate()?;
    Ok(session)
}

/// Build a validated activity from arbitrary JSON
pub fn activity_from_value(value: &Value) -> Result<Activity, ValidationError> {
    let obj = as_object(value, "activity")?;

    let agent_id = required_str(obj, "agentId", "agent_id")?;
    let agent_type = optional_str(obj, "agentType", "agent_type")
        .map(|s| AgentType::parse_lenient(&s))
        .unwrap_or_default();
    let task_id = required_str(obj, "taskId", "task_id")?;
    let session_id = optional_str(obj, "sessionId", "session_id");
    let start_time = required_time(obj, "startTime", "start_time")?;
    let end_time = optional_time(obj, "endTime", "end_time")?;

    let status = match optional_str(obj, "status", "status") {
        Some(raw) => {
            ActivityStatus::parse(&raw).ok_or(ValidationError::InvalidField("status"))?
        }
        None if end_time.is_some() => ActivityStatus::Completed,
        None => ActivityStatus::Pending,
    };

    let success = match lookup(obj, "success", "success") {
        Some(Value::Bool(b)) => *b,
        None | Some(Value::Null) => status == ActivityStatus::Completed,
        Some(_) => return Err(ValidationError::InvalidField("success")),
    };

    let activity = Activity {
        agent_id,
        agent_type,
        task_id,
        session_id,
        start_time,
        end_time,
        status,
        input_tokens: optional_count(obj, "inputTokens", "input_tokens")?.unwrap_or(0),
        output_tokens: optional_count(obj, "outputTokens", "output_tokens")?.unwrap_or(0),
        tools_used: tools_from(obj)?,
        file_operations: file_operations_from(obj)?,
        success,
        error_message: optional_str(obj, "errorMessage", "error_message")
            .or_else(|| optional_str(obj, "error", "error")),
    };
    activity.validate()?;
    Ok(activity)
}

fn tools_from(obj: &Object) -> Result<BTreeSet<String>, ValidationError> {
    match lookup(obj, "toolsUsed", "tools_used").or_else(|| obj.get("tools")) {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or(ValidationError::InvalidField("toolsUsed"))
            })
            .filter(|name| !matches!(name, Ok(n) if n.is_empty()))
            .collect(),
        Some(_) => Err(ValidationError::InvalidField("toolsUsed")),
    }
}

fn file_operations_from(obj: &Object) -> Result<Vec<FileOperation>, ValidationError> {
    let items = match lookup(obj, "fileOperations", "file_operations") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ValidationError::InvalidField("fileOperations")),
    };

    items
        .iter()
        .map(|item| {
            let op = as_object(item, "fileOperations")?;
            let raw_type = required_str(op, "type", "type")?;
            Ok(FileOperation {
                op_type: FileOperationType::parse(&raw_type)
                    .ok_or(ValidationError::InvalidField("fileOperations.type"))?,
                path: required_str(op, "path", "path")?,
                timestamp: required_time(op, "timestamp", "timestamp")?,
                success: op.get("success").and_then(Value::as_bool).unwrap_or(true),
                size: optional_count(op, "size", "size")?.unwrap_or(0),
            })
        })
        .collect()
}

fn as_object<'a>(value: &'a Value, what: &'static str) -> Result<&'a Object, ValidationError> {
    value.as_object().ok_or(ValidationError::NotAnObject(what))
}

fn lookup<'a>(obj: &'a Object, camel: &str, snake: &str) -> Option<&'a Value> {
    obj.get(camel).or_else(|| obj.get(snake))
}

fn optional_str(obj: &Object, camel: &str, snake: &str) -> Option<String> {
    lookup(obj, camel, snake)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_str(obj: &Object, camel: &'static str, snake: &str) -> Result<String, ValidationError> {
    optional_str(obj, camel, snake).ok_or(ValidationError::MissingField(camel))
}

/// Counts must be non-negative integers; floats with a fractional part are rejected
fn optional_count(obj: &Object, camel: &'static str, snake: &str) -> Result<Option<u64>, ValidationError> {
    match lookup(obj, camel, snake) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(Some(v))
            } else {
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                        Ok(Some(f as u64))
                    }
                    _ => Err(ValidationError::InvalidField(camel)),
                }
            }
        }
        Some(_) => Err(ValidationError::InvalidField(camel)),
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn optional_time(
    obj: &Object,
    camel: &'static str,
    snake: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match lookup(obj, camel, snake) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_time(v)
            .map(Some)
            .ok_or(ValidationError::InvalidField(camel)),
    }
}

fn required_time(
    obj: &Object,
    camel: &'static str,
    snake: &str,
) -> Result<DateTime<Utc>, ValidationError> {
    optional_time(obj, camel, snake)?.ok_or(ValidationError::MissingField(camel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_accepts_snake_case_and_epoch_millis() {
        let value = json!({
            "id": "sess-1",
            "start_time": 1_700_000_000_000i64,
            "end_time": "2023-11-14T22:20:00Z",
            "project_path": "/work/api",
            "activities": [{
                "agent_id": "backend-developer",
                "agent_type": "Backend_Developer",
                "task_id": "t-1",
                "start_time": "2023-11-14T22:13:20Z",
                "status": "DONE",
                "input_tokens": 120,
                "tools": ["Edit", "Read", "Edit"]
            }]
        });

        let session = session_from_value(&value).unwrap();
        assert_eq!(session.id, "sess-1");
        assert_eq!(session.context, "/work/api");
        assert_eq!(session.total_tasks, 1);
        assert_eq!(session.completed_tasks, 1);

        let activity = &session.activities[0];
        assert_eq!(activity.agent_type, AgentType::BackendDeveloper);
        assert_eq!(activity.status, ActivityStatus::Completed);
        assert!(activity.success);
        assert_eq!(activity.tools_used.len(), 2);
    }

    #[test]
    fn test_negative_tokens_rejected() {
        let value = json!({
            "agentId": "a",
            "taskId": "t",
            "startTime": "2024-01-01T00:00:00Z",
            "inputTokens": -5
        });
        assert!(matches!(
            activity_from_value(&value),
            Err(ValidationError::InvalidField("inputTokens"))
        ));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let value = json!({
            "agentId": "a",
            "taskId": "t",
            "startTime": "2024-01-01T00:00:00Z",
            "status": "teleported"
        });
        assert!(matches!(
            activity_from_value(&value),
            Err(ValidationError::InvalidField("status"))
        ));
    }

    #[test]
    fn test_missing_id_rejected() {
        let value = json!({ "startTime": "2024-01-01T00:00:00Z" });
        assert!(matches!(
            session_from_value(&value),
            Err(ValidationError::MissingField("id"))
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            session_from_value(&json!([1, 2, 3])),
            Err(ValidationError::NotAnObject("session"))
        ));
    }

    #[test]
    fn test_completed_above_total_fails_validation() {
        let value = json!({
            "id": "s",
            "startTime": "2024-01-01T00:00:00Z",
            "totalTasks": 1,
            "completedTasks": 2
        });
        assert!(matches!(
            session_from_value(&value),
            Err(ValidationError::TaskCountMismatch { .. })
        ));
    }
}
