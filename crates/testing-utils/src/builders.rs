//! 测试数据构建器

use clock_core::models::{Container, Relation, Task, TaskStatus};

/// Builder for creating test Container entities
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            container: Container::new("test_container", "*/5 * * * *"),
        }
    }

    pub fn with_id(mut self, cid: i64) -> Self {
        self.container.cid = cid;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.container.name = name.to_string();
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.container.expression = expression.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.container.disable = true;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.container.blocking = blocking;
        self
    }

    pub fn build(self) -> Container {
        self.container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task::new(1, "test_task", "echo test"),
        }
    }

    pub fn with_id(mut self, tid: i64) -> Self {
        self.task.tid = tid;
        self
    }

    pub fn with_cid(mut self, cid: i64) -> Self {
        self.task.cid = cid;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.task.command = command.to_string();
        self
    }

    pub fn with_directory(mut self, directory: &str) -> Self {
        self.task.directory = directory.to_string();
        self
    }

    pub fn with_timeout(mut self, seconds: i64) -> Self {
        self.task.timeout = seconds;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_log_enable(mut self, log_enable: bool) -> Self {
        self.task.log_enable = log_enable;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.task.disable = true;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 构建依赖边 `tid -> next_tid`
pub fn relation(cid: i64, tid: i64, next_tid: i64) -> Relation {
    Relation::new(cid, tid, next_tid)
}
