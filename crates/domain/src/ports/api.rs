use async_trait::async_trait;
use serde_json::Value;

use crate::entities::{Execution, Job, JobPage, Member};
use crate::value_objects::JobQuery;
use console_errors::ConsoleResult;

/// 调度服务REST接口
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn list_jobs(&self, query: &JobQuery) -> ConsoleResult<JobPage>;
    async fn get_job(&self, name: &str) -> ConsoleResult<Job>;
    /// 按 `name` 幂等地创建或更新任务
    async fn upsert_job(&self, body: &Value) -> ConsoleResult<()>;
    async fn run_job(&self, name: &str) -> ConsoleResult<()>;
    async fn toggle_job(&self, name: &str) -> ConsoleResult<()>;
    async fn delete_job(&self, name: &str) -> ConsoleResult<()>;
    async fn list_executions(
        &self,
        job_name: &str,
        output_size_limit: Option<usize>,
    ) -> ConsoleResult<Vec<Execution>>;
    /// 完整的执行详情，输出不截断
    async fn get_execution(&self, job_name: &str, execution_id: &str) -> ConsoleResult<Execution>;
    /// 所有任务中正在运行的执行
    async fn busy(&self) -> ConsoleResult<Vec<Execution>>;
    async fn members(&self) -> ConsoleResult<Vec<Member>>;
    async fn leader(&self) -> ConsoleResult<Member>;
}
