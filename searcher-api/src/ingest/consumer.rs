//! Consumer-group worker over the analyzer notification stream.
//!
//! One logical consumer with an ephemeral name runs two cooperating
//! tasks: the read loop, which drains its own pending messages before
//! switching to new ones, and a claimer, which periodically reassigns
//! messages other consumers failed to acknowledge. Claimed messages
//! re-enter the read loop through the rewound pending cursor.
//!
//! Delivery is at-least-once: a message is acknowledged only after the
//! handler returned successfully.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, RedisError, RedisResult};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::coordinator::NotificationHandler;
use super::IngestError;
use crate::config::RedisSettings;

/// Message field carrying the JSON id payload.
const NOTIFICATION_FIELD: &str = "done";

const XREAD_COUNT: usize = 10;
const XREAD_BLOCK_MS: usize = 10_000;

/// Pending messages idle longer than this are up for reclaim.
const CLAIM_MIN_IDLE_MS: usize = 1_000;
const CLAIM_INTERVAL_MS: u64 = 5_000;
const CLAIM_COUNT: usize = 10;

const BACKOFF_INITIAL_MIN_MS: u64 = 500;
const BACKOFF_INITIAL_MAX_MS: u64 = 1_000;
const BACKOFF_MAX_MS: u64 = 30_000;

pub struct StreamConsumer {
    client: redis::Client,
    stream: String,
    group: String,
}

impl StreamConsumer {
    pub fn new(settings: &RedisSettings) -> Result<Self, IngestError> {
        let url = format!("redis://{}:{}", settings.host, settings.port);
        let client =
            redis::Client::open(url).map_err(|e| IngestError::Stream(e.to_string()))?;
        Ok(Self {
            client,
            stream: settings.stream_name.clone(),
            group: settings.consumer_group.clone(),
        })
    }

    /// Consume until the shutdown signal flips. The current handler
    /// invocation finishes and the claimer is joined before returning.
    pub async fn run(
        &self,
        handler: Arc<dyn NotificationHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let consumer_name = ephemeral_consumer_name(&self.group);
        let mut conn = self.connect(&mut shutdown).await?;
        self.ensure_group(&mut conn).await?;
        info!(
            "consumer starting in consumer group {}, consumer name: {}",
            self.group, consumer_name
        );

        let check_pending = Arc::new(AtomicBool::new(true));
        let cursor = Arc::new(Mutex::new(String::from("0")));

        let (stop_tx, stop_rx) = watch::channel(false);
        let claimer = tokio::spawn(claim_loop(
            self.client.clone(),
            self.stream.clone(),
            self.group.clone(),
            consumer_name.clone(),
            Arc::clone(&check_pending),
            Arc::clone(&cursor),
            stop_rx,
        ));

        let result = self
            .read_loop(
                &mut conn,
                handler,
                &consumer_name,
                &check_pending,
                &cursor,
                &mut shutdown,
            )
            .await;

        info!("waiting for claimer to finish");
        let _ = stop_tx.send(true);
        if let Err(e) = claimer.await {
            error!("claimer task failed: {e}");
        }
        result
    }

    async fn read_loop(
        &self,
        conn: &mut MultiplexedConnection,
        handler: Arc<dyn NotificationHandler>,
        consumer_name: &str,
        check_pending: &AtomicBool,
        cursor: &Mutex<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        loop {
            if *shutdown.borrow() {
                info!("shutting down consumer");
                return Ok(());
            }

            let was_pending = check_pending.load(Ordering::SeqCst);
            let cursor_id = if was_pending {
                // consume our own pending messages since the last ack
                lock_cursor(cursor).clone()
            } else {
                // only consume new messages
                ">".to_string()
            };

            let options = StreamReadOptions::default()
                .group(&self.group, consumer_name)
                .count(XREAD_COUNT)
                .block(XREAD_BLOCK_MS);
            let keys = [self.stream.as_str()];
            let read_ids = [cursor_id.as_str()];

            let reply = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    continue;
                }
                result = conn.xread_options::<_, _, StreamReadReply>(
                    &keys,
                    &read_ids,
                    &options,
                ) => result,
            };

            let reply = match reply {
                Ok(reply) => reply,
                Err(e) if is_connection_error(&e) => {
                    warn!("stream connection lost: {e}");
                    *conn = self.connect(shutdown).await?;
                    continue;
                }
                Err(e) => {
                    error!("unknown error while consuming messages: {e}");
                    return Ok(());
                }
            };

            let batch: Vec<StreamId> = reply
                .keys
                .into_iter()
                .next()
                .map(|key| key.ids)
                .unwrap_or_default();

            if batch.is_empty() {
                if was_pending {
                    // our pending backlog is drained
                    check_pending.store(false, Ordering::SeqCst);
                } else {
                    debug!("{XREAD_BLOCK_MS} ms passed, no new messages");
                }
                continue;
            }

            for message in batch {
                match parse_notification(&message.map) {
                    Ok(ids) => match handler.handle(ids).await {
                        Ok(()) => {
                            let acked: RedisResult<i64> =
                                conn.xack(&self.stream, &self.group, &[&message.id]).await;
                            match acked {
                                Ok(_) => {
                                    debug!(
                                        id = %message.id,
                                        pending = was_pending,
                                        "consumed message"
                                    );
                                    *lock_cursor(cursor) = message.id.clone();
                                }
                                Err(e) => {
                                    warn!("failed to acknowledge message {}: {e}", message.id)
                                }
                            }
                        }
                        // not acknowledged: redelivered via the claimer
                        Err(e) => error!("error while processing message {}: {e}", message.id),
                    },
                    Err(e) => error!("error while processing message {}: {e}", message.id),
                }
            }
        }
    }

    async fn connect(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<MultiplexedConnection, IngestError> {
        let mut backoff =
            rand::thread_rng().gen_range(BACKOFF_INITIAL_MIN_MS..=BACKOFF_INITIAL_MAX_MS);

        loop {
            if *shutdown.borrow() {
                return Err(IngestError::Stream(
                    "shutdown requested while connecting".into(),
                ));
            }

            match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => return Ok(conn),
                Err(e) => info!("redis not ready ({e}), waiting {backoff} milliseconds"),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Err(IngestError::Stream(
                            "shutdown requested while connecting".into(),
                        ));
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(backoff)) => {}
            }
            backoff = next_backoff(backoff);
        }
    }

    async fn ensure_group(&self, conn: &mut MultiplexedConnection) -> Result<(), IngestError> {
        let created: RedisResult<String> = conn
            .xgroup_create_mkstream(&self.stream, &self.group, "$")
            .await;

        match created {
            Ok(_) => info!(
                "created/asserted consumer group {} for stream {}",
                self.group, self.stream
            ),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                info!("consumer group {} already exists", self.group)
            }
            Err(e) => return Err(IngestError::Stream(e.to_string())),
        }
        Ok(())
    }
}

/// Reassign messages other consumers left pending for longer than the
/// idle threshold, then point the read loop back at the pending
/// cursor so it picks them up.
async fn claim_loop(
    client: redis::Client,
    stream: String,
    group: String,
    consumer_name: String,
    check_pending: Arc<AtomicBool>,
    cursor: Arc<Mutex<String>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("claimer failed to connect: {e}");
            return;
        }
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(CLAIM_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                debug!("exiting claimer");
                return;
            }
            _ = ticker.tick() => {}
        }
        if *stop.borrow() {
            return;
        }

        let options = StreamAutoClaimOptions::default().count(CLAIM_COUNT);
        let claimed: RedisResult<StreamAutoClaimReply> = conn
            .xautoclaim_options(
                &stream,
                &group,
                &consumer_name,
                CLAIM_MIN_IDLE_MS,
                "0-0",
                options,
            )
            .await;

        match claimed {
            Ok(reply) if !reply.claimed.is_empty() => {
                debug!("autoclaimed {} pending messages", reply.claimed.len());
                *lock_cursor(&cursor) = "0".to_string();
                check_pending.store(true, Ordering::SeqCst);
            }
            Ok(_) => {}
            Err(e) => error!("error while autoclaiming messages: {e}"),
        }
    }
}

fn ephemeral_consumer_name(group: &str) -> String {
    format!("{group}_{}", Uuid::new_v4().simple())
}

/// The payload is an opaque id or id list encoded as JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdPayload {
    Many(Vec<String>),
    One(String),
}

impl IdPayload {
    fn into_vec(self) -> Vec<String> {
        match self {
            IdPayload::Many(ids) => ids,
            IdPayload::One(id) => vec![id],
        }
    }
}

fn parse_notification(map: &HashMap<String, redis::Value>) -> Result<Vec<String>, IngestError> {
    let value = map.get(NOTIFICATION_FIELD).ok_or_else(|| {
        IngestError::Notification(format!("missing '{NOTIFICATION_FIELD}' field"))
    })?;
    let payload: String =
        redis::from_redis_value(value).map_err(|e| IngestError::Notification(e.to_string()))?;
    let ids: IdPayload = serde_json::from_str(&payload)
        .map_err(|e| IngestError::Notification(e.to_string()))?;
    Ok(ids.into_vec())
}

fn next_backoff(current: u64) -> u64 {
    (current * 2).min(BACKOFF_MAX_MS)
}

fn is_connection_error(error: &RedisError) -> bool {
    error.is_io_error()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_timeout()
}

fn lock_cursor(cursor: &Mutex<String>) -> std::sync::MutexGuard<'_, String> {
    // the cursor is only ever a short string; a poisoned lock means a
    // panic elsewhere already took the worker down
    match cursor.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: &str) -> HashMap<String, redis::Value> {
        let mut map = HashMap::new();
        map.insert(
            NOTIFICATION_FIELD.to_string(),
            redis::Value::BulkString(value.as_bytes().to_vec()),
        );
        map
    }

    #[test]
    fn notification_parses_an_id_list() {
        let ids = parse_notification(&payload(r#"["a1","a2"]"#)).unwrap();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn notification_parses_a_single_id() {
        let ids = parse_notification(&payload(r#""a1""#)).unwrap();
        assert_eq!(ids, vec!["a1"]);
    }

    #[test]
    fn notification_without_payload_field_is_rejected() {
        let err = parse_notification(&HashMap::new()).unwrap_err();
        assert!(matches!(err, IngestError::Notification(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_notification(&payload("not-json")).unwrap_err();
        assert!(matches!(err, IngestError::Notification(_)));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        assert_eq!(next_backoff(500), 1_000);
        assert_eq!(next_backoff(1_000), 2_000);
        assert_eq!(next_backoff(20_000), BACKOFF_MAX_MS);
        assert_eq!(next_backoff(BACKOFF_MAX_MS), BACKOFF_MAX_MS);
    }

    #[test]
    fn consumer_names_are_unique_within_the_group() {
        let a = ephemeral_consumer_name("searcher_api");
        let b = ephemeral_consumer_name("searcher_api");
        assert!(a.starts_with("searcher_api_"));
        assert_ne!(a, b);
    }
}
