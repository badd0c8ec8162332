//! 连接注册表：从连接 ID 到活跃连接的并发映射。

use std::sync::Arc;

use dashmap::DashMap;
use spark_core::ids::ConnectionId;

use crate::connection::Connection;

/// 由 [`crate::host::Host`] 持有的单例；支持并发的增删查，以及停机时的
/// 一次性清空。
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, connection: Arc<Connection>) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// 取走当前所有连接，注册表随之变空。用于停机时一次性接管所有活跃
    /// 连接，逐个发起断开，而不必持锁遍历。
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.connections.remove(&id).map(|(_, conn)| conn))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
