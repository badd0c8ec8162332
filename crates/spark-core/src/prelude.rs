//! 常用类型的统一导入入口，镜像原框架 `spark_core::prelude` 的用法习惯。

pub use crate::config::HostConfig;
pub use crate::error::{CoreError, ErrorKind, Result};
pub use crate::ids::{ConnectionId, ConnectionIdAllocator};
