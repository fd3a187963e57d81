use crate::backend::QueueBackend;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::RedisError;
use std::time::Duration;
use tracing::debug;

/// Longest single `BRPOP` issued by [`RedisQueue::pop`]; it re-issues until a message arrives.
const BLOCK_WINDOW: Duration = Duration::from_secs(5);

/// Redis's smallest useful blocking timeout; `0` would mean "forever".
const MIN_BLOCK_SECS: f64 = 0.01;

fn connection_error(err: RedisError) -> EnsembleError {
    EnsembleError::Connection(format!("redis: {err}"))
}

/// Redis list backend: `LPUSH` appends, `BRPOP` pops, so each list is FIFO.
///
/// Pushes share one auto-reconnecting [`ConnectionManager`]. A blocking pop
/// occupies its connection until it returns, so pops borrow a dedicated
/// connection from a small idle pool instead.
pub struct RedisQueue {
    client: redis::Client,
    writer: ConnectionManager,
    idle: Mutex<Vec<MultiplexedConnection>>,
}

impl RedisQueue {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> EnsembleResult<Self> {
        let client = redis::Client::open(url).map_err(connection_error)?;
        let writer = client
            .get_connection_manager()
            .await
            .map_err(connection_error)?;
        Ok(Self {
            client,
            writer,
            idle: Mutex::new(Vec::new()),
        })
    }

    async fn blocking_conn(&self) -> EnsembleResult<MultiplexedConnection> {
        let pooled = self.idle.lock().pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(connection_error),
        }
    }

    async fn brpop(&self, queue: &str, window: Duration) -> EnsembleResult<Option<String>> {
        let mut conn = self.blocking_conn().await?;
        let secs = window.as_secs_f64().max(MIN_BLOCK_SECS);
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(secs)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        // Only healthy connections go back to the pool.
        self.idle.lock().push(conn);
        Ok(reply.map(|(_, payload)| payload))
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn push(&self, queue: &str, payload: String) -> EnsembleResult<()> {
        let mut conn = self.writer.clone();
        let _: () = redis::cmd("LPUSH")
            .arg(queue)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn push_batch(&self, clear: &[String], items: Vec<(String, String)>) -> EnsembleResult<()> {
        if clear.is_empty() && items.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for queue in clear {
            pipe.cmd("DEL").arg(queue).ignore();
        }
        for (queue, payload) in &items {
            pipe.cmd("LPUSH").arg(queue).arg(payload).ignore();
        }
        let mut conn = self.writer.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        debug!(cleared = clear.len(), count = items.len(), "Pushed batch via MULTI/EXEC");
        Ok(())
    }

    async fn pop(&self, queue: &str) -> EnsembleResult<String> {
        loop {
            if let Some(payload) = self.brpop(queue, BLOCK_WINDOW).await? {
                return Ok(payload);
            }
        }
    }

    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> EnsembleResult<Option<String>> {
        self.brpop(queue, timeout).await
    }

    async fn purge(&self, queue: &str) -> EnsembleResult<()> {
        let mut conn = self.writer.clone();
        let _: () = redis::cmd("DEL")
            .arg(queue)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn len(&self, queue: &str) -> EnsembleResult<usize> {
        let mut conn = self.writer.clone();
        redis::cmd("LLEN")
            .arg(queue)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)
    }

    async fn ping(&self) -> EnsembleResult<()> {
        let mut conn = self.writer.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }
}
