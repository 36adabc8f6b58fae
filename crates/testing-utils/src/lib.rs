//! # Clock Testing Utils
//!
//! 工作区共享的测试工具：
//!
//! - **InMemoryStore**: 同时实现四个仓储接口的内存存储
//! - **FakeExecutor**: 可按任务编排结果和耗时的执行器，支持取消
//! - **Builders**: 容器和任务的测试数据构建器
//! - **TestEnv**: 异步条件等待等辅助函数
//!
//! ```toml
//! [dev-dependencies]
//! clock-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
