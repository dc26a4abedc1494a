use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use std::sync::{Arc, Mutex};

/// Hands out connections to a single DuckDB database instance.
///
/// Every pooled connection is cloned from one root connection so that they all
/// share the same instance; opening the file repeatedly would create competing
/// instances, and `:memory:` databases would not be shared at all.
pub struct DuckDBConnectionManager {
    root: Arc<Mutex<Connection>>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: &str) -> Result<Self, duckdb::Error> {
        let root = if connection_string == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(connection_string)?
        };
        Ok(Self {
            root: Arc::new(Mutex::new(root)),
        })
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self
            .root
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub type DuckDBPool = Pool<DuckDBConnectionManager>;

pub fn build_pool(connection_string: &str, pool_size: usize) -> Result<DuckDBPool, Box<dyn std::error::Error + Send + Sync>> {
    let manager = DuckDBConnectionManager::new(connection_string)?;
    let pool = Pool::builder()
        .max_size(pool_size.max(1) as u32)
        .build(manager)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_connections_share_one_in_memory_database() {
        let pool = build_pool(":memory:", 2).unwrap();

        let first = pool.get().unwrap();
        first.execute("CREATE TABLE shared (v INTEGER)", []).unwrap();
        first.execute("INSERT INTO shared VALUES (7)", []).unwrap();

        let second = pool.get().unwrap();
        let v: i32 = second
            .query_row("SELECT v FROM shared", [], |row| row.get(0))
            .unwrap();
        assert_eq!(v, 7);
    }
}
