use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clock_core::config::ExecutorConfig;
use clock_core::models::{RunId, Task, TaskLog, CANCEL_MARKER, TIMEOUT_MARKER};
use clock_core::traits::{ExecutionFailure, TaskExecution, TaskExecutor};
use clock_core::{EventHub, StreamEvent, StreamEventKind};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::output::{LineSplitter, OutputBuffer};

/// 进程退出后等待输出读取完成的最长时间
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Shell任务执行器
///
/// 命令按空白切分为程序和参数后直接启动（不经过 shell 解释）。
/// 超时或取消时先发送 SIGTERM，宽限期内未退出再强制结束。
pub struct ShellExecutor {
    kill_grace: Duration,
    max_output_bytes: usize,
    events: Option<EventHub>,
}

enum ProcessOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

struct OutputReader {
    buffer: Arc<Mutex<OutputBuffer>>,
    handle: JoinHandle<()>,
}

impl ShellExecutor {
    /// 创建新的Shell执行器
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            kill_grace: config.kill_grace(),
            max_output_bytes: config.max_output_bytes,
            events: None,
        }
    }

    /// 每读到一行输出就发布到事件流
    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = Some(events);
        self
    }

    /// 切分命令，空命令返回 None
    pub fn parse_command(command: &str) -> Option<(String, Vec<String>)> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some((program, parts.collect()))
    }

    fn spawn_reader<R>(
        &self,
        reader: R,
        kind: StreamEventKind,
        task: &Task,
        run_id: &RunId,
    ) -> OutputReader
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(OutputBuffer::new(self.max_output_bytes)));
        let sink = Arc::clone(&buffer);
        let events = self.events.clone();
        let task = task.clone();
        let run_id = run_id.clone();

        let max_line = self.max_output_bytes;

        let handle = tokio::spawn(async move {
            let mut reader = reader;
            let mut splitter = LineSplitter::new(max_line);
            let mut chunk = vec![0u8; READ_CHUNK_BYTES];
            loop {
                let lines = match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => splitter.push(&chunk[..n]),
                    Err(e) => {
                        debug!("读取进程输出失败: tid={}, error={}", task.tid, e);
                        break;
                    }
                };
                for line in lines {
                    record_line(events.as_ref(), &sink, kind, &task, &run_id, &line).await;
                }
            }
            if let Some(line) = splitter.finish() {
                record_line(events.as_ref(), &sink, kind, &task, &run_id, &line).await;
            }
        });

        OutputReader { buffer, handle }
    }

    async fn drain(reader: Option<OutputReader>) -> String {
        let Some(OutputReader { buffer, mut handle }) = reader else {
            return String::new();
        };

        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            // 子进程派生的后台进程可能仍持有管道
            handle.abort();
        }

        let mut guard = buffer.lock().await;
        std::mem::replace(&mut *guard, OutputBuffer::new(0)).into_string()
    }

    /// 先发送 SIGTERM，宽限期后仍未退出则强制结束
    async fn terminate(&self, child: &mut Child, tid: i64) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: pid 来自仍由我们持有的子进程
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc == 0 {
                    match tokio::time::timeout(self.kill_grace, child.wait()).await {
                        Ok(_) => {
                            debug!("进程已在宽限期内退出: tid={}, pid={}", tid, pid);
                            return;
                        }
                        Err(_) => warn!(
                            "进程未在{}秒内退出，强制结束: tid={}, pid={}",
                            self.kill_grace.as_secs(),
                            tid,
                            pid
                        ),
                    }
                }
            }
        }

        if let Err(e) = child.kill().await {
            warn!("强制结束进程失败: tid={}, error={}", tid, e);
        }
    }
}

async fn record_line(
    events: Option<&EventHub>,
    sink: &Mutex<OutputBuffer>,
    kind: StreamEventKind,
    task: &Task,
    run_id: &RunId,
    line: &str,
) {
    if let Some(events) = events {
        events.publish(StreamEvent::output(kind, task, run_id, line));
    }
    sink.lock().await.push_line(line);
}

async fn sleep_for(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

fn append_line(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

fn failure_line(task: &Task, failure: &ExecutionFailure) -> String {
    match failure {
        ExecutionFailure::Timeout => {
            format!("{TIMEOUT_MARKER} task {} timeout after {}s", task.name, task.timeout)
        }
        ExecutionFailure::Cancelled => format!("{CANCEL_MARKER} {failure}"),
        other => other.to_string(),
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(
        &self,
        task: &Task,
        run_id: &RunId,
        cancel: CancellationToken,
    ) -> TaskExecution {
        let started = Instant::now();
        let mut log = TaskLog::for_task(task, run_id);
        let elapsed_ms = |started: Instant| started.elapsed().as_millis() as i64;

        let fail = |mut log: TaskLog, failure: ExecutionFailure, started: Instant| {
            append_line(&mut log.std_err, &failure_line(task, &failure));
            log.update_at = chrono::Utc::now();
            TaskExecution::failed(log, failure, elapsed_ms(started))
        };

        let Some((program, args)) = Self::parse_command(&task.command) else {
            return fail(log, ExecutionFailure::EmptyCommand, started);
        };

        if cancel.is_cancelled() {
            return fail(log, ExecutionFailure::Cancelled, started);
        }

        info!(
            "执行Shell任务: run_id={}, tid={}, command={}, args={:?}",
            run_id, task.tid, program, args
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !task.directory.is_empty() {
            cmd.current_dir(&task.directory);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("启动Shell命令失败: tid={}, error={}", task.tid, e);
                return fail(log, ExecutionFailure::Spawn(e.to_string()), started);
            }
        };

        let stdout = child
            .stdout
            .take()
            .map(|out| self.spawn_reader(out, StreamEventKind::Stdout, task, run_id));
        let stderr = child
            .stderr
            .take()
            .map(|err| self.spawn_reader(err, StreamEventKind::Stderr, task, run_id));

        let outcome = tokio::select! {
            status = child.wait() => ProcessOutcome::Exited(status),
            _ = cancel.cancelled() => ProcessOutcome::Cancelled,
            _ = sleep_for(task.timeout_duration()) => ProcessOutcome::TimedOut,
        };

        if matches!(outcome, ProcessOutcome::Cancelled | ProcessOutcome::TimedOut) {
            self.terminate(&mut child, task.tid).await;
        }

        log.std_out = Self::drain(stdout).await;
        log.std_err = Self::drain(stderr).await;

        let failure = match outcome {
            ProcessOutcome::Exited(Ok(status)) if status.success() => None,
            ProcessOutcome::Exited(Ok(status)) => Some(ExecutionFailure::ProcessFailure {
                exit_code: status.code(),
            }),
            ProcessOutcome::Exited(Err(e)) => Some(ExecutionFailure::Spawn(e.to_string())),
            ProcessOutcome::TimedOut => Some(ExecutionFailure::Timeout),
            ProcessOutcome::Cancelled => Some(ExecutionFailure::Cancelled),
        };

        let execution = match failure {
            None => {
                log.update_at = chrono::Utc::now();
                TaskExecution::succeeded(log, elapsed_ms(started))
            }
            Some(failure) => fail(log, failure, started),
        };

        info!(
            "Shell任务执行完成: run_id={}, tid={}, status={}, duration={}ms",
            run_id, task.tid, execution.status, execution.duration_ms
        );
        execution
    }

    fn name(&self) -> &str {
        "shell"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use clock_core::models::TaskStatus;

    fn executor() -> ShellExecutor {
        ShellExecutor::new(&ExecutorConfig {
            kill_grace_seconds: 1,
            max_output_bytes: 4096,
        })
    }

    fn task(command: &str) -> Task {
        let mut task = Task::new(1, "test", command);
        task.tid = 7;
        task
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            ShellExecutor::parse_command("  echo  hello world "),
            Some(("echo".to_string(), vec!["hello".to_string(), "world".to_string()]))
        );
        assert!(ShellExecutor::parse_command("   ").is_none());
    }

    #[tokio::test]
    async fn test_echo_success() {
        let execution = executor()
            .execute(&task("echo hello"), &RunId::generate(), CancellationToken::new())
            .await;
        assert_eq!(execution.status, TaskStatus::Success);
        assert_eq!(execution.log.std_out, "hello");
        assert!(execution.log.std_err.is_empty());
        assert_eq!(execution.log.tid, 7);
    }

    #[tokio::test]
    async fn test_empty_command_fails_immediately() {
        let execution = executor()
            .execute(&task(""), &RunId::generate(), CancellationToken::new())
            .await;
        assert_eq!(execution.status, TaskStatus::Failure);
        assert_eq!(execution.failure, Some(ExecutionFailure::EmptyCommand));
        assert_eq!(execution.log.std_err, "command cannot be empty");
    }

    #[tokio::test]
    async fn test_missing_program_reports_spawn_failure() {
        let execution = executor()
            .execute(
                &task("definitely-not-a-real-binary-xyz"),
                &RunId::generate(),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(execution.status, TaskStatus::Failure);
        assert!(matches!(execution.failure, Some(ExecutionFailure::Spawn(_))));
    }

    #[tokio::test]
    async fn test_output_without_newline_is_bounded() {
        // 约 1MB 且没有换行的输出
        let execution = executor()
            .execute(
                &task("head -c 1048576 /dev/zero"),
                &RunId::generate(),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(execution.status, TaskStatus::Success);
        assert!(execution.log.std_out.len() <= 4096 + 64);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_spawn() {
        let token = CancellationToken::new();
        token.cancel();
        let execution = executor()
            .execute(&task("sleep 10"), &RunId::generate(), token)
            .await;
        assert!(execution.is_cancelled());
        assert!(execution.log.is_cancelled());
    }
}
