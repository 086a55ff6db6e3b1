//! Redis implementation of KeyedStore.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, RedisWrite, Script, ToRedisArgs, aio::MultiplexedConnection};

use super::{Increment, KeyTtl, KeyedStore, check_ttl};
use crate::score::Expiry;

/// INCRBY that reports whether it created the key and sets the TTL only in
/// that case. A non-integer value is dropped first so a corrupted counter
/// restarts from zero instead of failing every increment.
///
/// KEYS[1] = counter, ARGV[1] = amount, ARGV[2] = ttl seconds (0 = none)
const INCREMENT_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if current and not string.match(current, '^%-?%d+$') then
  redis.call('DEL', KEYS[1])
  current = false
end
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if current then
  return {value, 0}
end
local ttl = tonumber(ARGV[2])
if ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return {value, 1}
";

impl ToRedisArgs for Expiry {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match self {
            Expiry::At(ts) => ts.write_redis_args(out),
            Expiry::Never => out.write_arg(b"+inf"),
        }
    }
}

/// Redis implementation of KeyedStore.
#[derive(Clone)]
pub struct RedisKeyedStore {
    client: redis::Client,
    increment: Script,
}

impl RedisKeyedStore {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            increment: Script::new(INCREMENT_SCRIPT),
        }
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to redis")
    }
}

#[async_trait]
impl KeyedStore for RedisKeyedStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        anyhow::ensure!(pong == "PONG", "unexpected PING reply: {pong}");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        check_ttl(key, ttl_secs)?;
        let mut conn = self.conn().await?;

        match ttl_secs {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64, ttl_secs: Option<u64>) -> Result<Increment> {
        check_ttl(key, ttl_secs)?;
        let mut conn = self.conn().await?;

        let (value, created): (i64, i64) = self
            .increment
            .key(key)
            .arg(by)
            .arg(ttl_secs.unwrap_or(0))
            .invoke_async(&mut conn)
            .await
            .with_context(|| format!("increment of {key} failed"))?;

        Ok(Increment {
            value,
            created: created == 1,
        })
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.conn().await?;
        let ttl: i64 = conn.ttl(key).await?;

        Ok(match ttl {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            secs => KeyTtl::Expires(secs.max(0) as u64),
        })
    }

    async fn sorted_set_add(&self, set: &str, member: &str, score: Expiry) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(set, member, score).await?;
        Ok(())
    }

    async fn sorted_set_range(
        &self,
        set: &str,
        min: i64,
        max: Expiry,
        evict_out_of_range: bool,
    ) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;

        // MULTI/EXEC so the read and the eviction see the same set.
        let mut pipe = redis::pipe();
        pipe.atomic().zrangebyscore(set, min, max);
        if evict_out_of_range {
            pipe.zrembyscore(set, "-inf", format!("({min}")).ignore();
            if let Expiry::At(max) = max {
                pipe.zrembyscore(set, format!("({max}"), "+inf").ignore();
            }
        }

        let (members,): (Vec<String>,) = pipe.query_async(&mut conn).await?;
        Ok(members)
    }
}
