#![doc = r#"
# spark-core

## 设计动机（Why）
- **定位**：`spark-core` 是连接引擎的最小契约层，只承载那些与具体传输
  实现无关、但被引擎各层共同依赖的概念：连接标识分配、结构化错误分类、
  宿主侧的尺寸配置。
- **架构角色**：`spark-transport-tcp` 在此之上构建真正的连接状态机、
  发送队列与 IO 上下文池；本 crate 不涉及任何 socket 操作。

## 核心契约（What）
- [`error::CoreError`]／[`error::ErrorKind`]：贯穿发送、接收、关闭路径的
  统一错误类型，区分编程错误与运行时 IO 错误；
- [`ids::ConnectionId`]／[`ids::ConnectionIdAllocator`]：等价于宿主侧
  `NextConnectionID()`，保证同一宿主生命周期内严格递增、互不重复；
- [`config::HostConfig`]：对应构造期配置项 `socketBufferSize` /
  `messageBufferSize`，两者均要求 `>= 1`。

## 实现策略（How）
- 本 crate 刻意不依赖 Tokio 或任何运行时：它只提供纯数据与纯函数契约，
  因此可以被单元测试、未来的其它传输实现（如本地管道）直接复用。
"#]

pub mod config;
pub mod error;
pub mod ids;
pub mod observability;
pub mod prelude;
