use crate::error::{QueryError, QueryResult};
use crate::payload::Payload;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Something that can run a SQL text and return the raw tool output
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, sql: &str) -> QueryResult<String>;
}

/// Runs queries through an external CLI, feeding the SQL on stdin
#[derive(Debug, Clone)]
pub struct CommandRunner {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Whole seconds, rounded up so a sub-second budget never reads as zero
fn budget_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

#[async_trait]
impl QueryRunner for CommandRunner {
    async fn run(&self, sql: &str) -> QueryResult<String> {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => QueryError::ExternalToolMissing {
                command: self.command.clone(),
            },
            _ => QueryError::Io(e),
        })?;

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(sql.as_bytes()).await {
                    Ok(()) => {}
                    // Tool exited before reading stdin; the exit status is checked below.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(QueryError::Io(e)),
                }
            }
            Ok(child.wait_with_output().await?)
        };

        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(QueryError::Timeout {
                    seconds: budget_seconds(self.timeout),
                })
            }
        };

        if !output.status.success() {
            let status = match output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "a signal".to_string(),
            };
            return Err(QueryError::CommandFailed {
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Unwrap the `[{"column": "<json string>"}]` response shape into the inner document.
///
/// With `column` set, that field is read; otherwise the row must have exactly
/// one field. A cell that is already an object is accepted as-is.
pub fn decode_payload(raw: &str, column: Option<&str>) -> QueryResult<Value> {
    let malformed = |reason: String| QueryError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("no rows returned".to_string()));
    }

    let rows: Value = serde_json::from_str(trimmed)
        .map_err(|e| malformed(format!("output is not valid JSON: {}", e)))?;
    let first = match &rows {
        Value::Array(rows) => rows.first().ok_or_else(|| malformed("no rows returned".to_string()))?,
        _ => return Err(malformed("expected a JSON array of rows".to_string())),
    };
    let row = first
        .as_object()
        .ok_or_else(|| malformed("first row is not an object".to_string()))?;

    let cell = match column {
        Some(name) => row
            .get(name)
            .ok_or_else(|| malformed(format!("column `{}` not found in result row", name)))?,
        None => {
            if row.len() != 1 {
                return Err(malformed(format!(
                    "expected exactly one column, found {}",
                    row.len()
                )));
            }
            row.values()
                .next()
                .ok_or_else(|| malformed("result row has no columns".to_string()))?
        }
    };

    let document = match cell {
        Value::String(inner) => serde_json::from_str(inner)
            .map_err(|e| malformed(format!("payload column is not valid JSON: {}", e)))?,
        Value::Object(_) => cell.clone(),
        Value::Null => return Err(malformed("payload column is null".to_string())),
        _ => return Err(malformed("payload column is not a JSON string".to_string())),
    };

    if !document.is_object() {
        return Err(malformed("decoded payload is not a JSON object".to_string()));
    }
    Ok(document)
}

/// A decoded document together with what produced it
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub document: T,
    pub payload: Value,
    pub sql: String,
}

/// Runs a rendered query and decodes its payload
pub struct QueryExecutor<R: QueryRunner> {
    runner: R,
    payload_column: Option<String>,
}

impl<R: QueryRunner> QueryExecutor<R> {
    pub fn new(runner: R, payload_column: Option<String>) -> Self {
        Self {
            runner,
            payload_column,
        }
    }

    /// Run once, decode, and map onto `T`. No retry.
    #[instrument(skip(self, sql), fields(document = T::NAME))]
    pub async fn fetch<T: Payload>(&self, sql: String) -> QueryResult<Fetched<T>> {
        info!("Running {} query ({} bytes)", T::NAME, sql.len());
        let raw = self.runner.run(&sql).await?;
        debug!("Query returned {} bytes", raw.len());

        let payload = decode_payload(&raw, self.payload_column.as_deref())?;
        let mut document: T =
            serde_json::from_value(payload.clone()).map_err(|e| QueryError::MalformedResponse {
                reason: format!("{} payload has unexpected shape: {}", T::NAME, e),
                raw: raw.clone(),
            })?;
        document.normalize();
        document.check();

        info!("Decoded {} payload", T::NAME);
        Ok(Fetched {
            document,
            payload,
            sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::RiskReportDocument;
    use mockall::predicate::eq;
    use serde_json::json;

    fn wrap(document: Value) -> String {
        json!([{ "report_json": document.to_string() }]).to_string()
    }

    #[test]
    fn test_decode_double_encoded_payload() {
        let raw = wrap(json!({"report_date": "2026-02-10"}));
        let doc = decode_payload(&raw, None).unwrap();
        assert_eq!(doc["report_date"], "2026-02-10");
    }

    #[test]
    fn test_decode_named_column_among_many() {
        let raw = json!([{ "run_id": 7, "payload": "{\"a\": 1}" }]).to_string();
        assert_eq!(decode_payload(&raw, Some("payload")).unwrap()["a"], 1);
        assert!(matches!(
            decode_payload(&raw, None),
            Err(QueryError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_decode_accepts_already_decoded_object() {
        let raw = json!([{ "payload": {"a": 1} }]).to_string();
        assert_eq!(decode_payload(&raw, None).unwrap()["a"], 1);
    }

    #[test]
    fn test_decode_failures_carry_raw_output() {
        for raw in ["", "[]", "not json", "{\"a\": 1}", "[{\"p\": \"{oops\"}]", "[{\"p\": \"[1,2]\"}]", "[{\"p\": null}]"] {
            match decode_payload(raw, None) {
                Err(err @ QueryError::MalformedResponse { .. }) => {
                    assert_eq!(err.raw_output(), Some(raw));
                }
                other => panic!("expected malformed response for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_and_normalizes() {
        let mut runner = MockQueryRunner::new();
        runner
            .expect_run()
            .with(eq("SELECT 1"))
            .times(1)
            .returning(|_| {
                Ok(wrap(json!({
                    "report_date": "2026-02-10",
                    "attainment_detail": {"POR": [{"region": "AMER", "category": "NEW LOGO"}]}
                })))
            });

        let executor = QueryExecutor::new(runner, None);
        let fetched = executor
            .fetch::<RiskReportDocument>("SELECT 1".to_string())
            .await
            .unwrap();

        assert_eq!(fetched.sql, "SELECT 1");
        assert_eq!(fetched.payload["report_date"], "2026-02-10");
        let rows = RiskReportDocument::rows(&fetched.document.attainment_detail, "POR");
        assert_eq!(rows[0].product, "POR");
    }

    #[tokio::test]
    async fn test_fetch_propagates_runner_errors_without_retry() {
        let mut runner = MockQueryRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Err(QueryError::Timeout { seconds: 5 }));

        let executor = QueryExecutor::new(runner, None);
        let err = executor
            .fetch::<RiskReportDocument>("SELECT 1".to_string())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_fetch_rejects_type_mismatch() {
        let mut runner = MockQueryRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(wrap(json!({"attainment_detail": "not a map"}))));

        let executor = QueryExecutor::new(runner, None);
        let result = executor.fetch::<RiskReportDocument>("SELECT 1".to_string()).await;
        assert!(matches!(result, Err(QueryError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_command_runner_reports_missing_tool() {
        let runner = CommandRunner::new(
            "revops-no-such-query-tool",
            vec![],
            Duration::from_secs(5),
        );
        let err = runner.run("SELECT 1").await.unwrap_err();
        assert!(matches!(err, QueryError::ExternalToolMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_enforces_timeout() {
        let runner = CommandRunner::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(200),
        );
        let err = runner.run("SELECT 1").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, QueryError::Timeout { seconds: 1 }));
        assert_eq!(err.to_string(), "query timed out after 1 seconds");
    }

    #[test]
    fn test_budget_seconds_round_up() {
        assert_eq!(budget_seconds(Duration::from_millis(200)), 1);
        assert_eq!(budget_seconds(Duration::from_secs(300)), 300);
        assert_eq!(budget_seconds(Duration::from_millis(1500)), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_pipes_sql_and_reports_failures() {
        let echo = CommandRunner::new("cat", vec![], Duration::from_secs(5));
        assert_eq!(echo.run("SELECT 42").await.unwrap(), "SELECT 42");

        let failing = CommandRunner::new(
            "sh",
            vec!["-c".into(), "echo boom >&2; exit 3".into()],
            Duration::from_secs(5),
        );
        match failing.run("SELECT 1").await {
            Err(QueryError::CommandFailed { status, stderr }) => {
                assert_eq!(status, "exit code 3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected command failure, got {:?}", other),
        }
    }
}
