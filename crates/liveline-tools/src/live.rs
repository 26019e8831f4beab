//! Thin query layer over the shared OSC client.
//!
//! AbletonOSC echoes the object indices before the payload, so callers pick
//! the value they want by position.

use crate::error::Result;
use liveline_osc::{OscClient, Timeouts, Value};
use std::time::Duration;

/// Value at `index`, or nil when the response is shorter.
pub fn at(values: &[Value], index: usize) -> Value {
    values.get(index).cloned().unwrap_or_default()
}

/// Values from `index` on.
pub fn after(values: Vec<Value>, index: usize) -> Vec<Value> {
    values.into_iter().skip(index).collect()
}

/// Connected handle to Live. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Live {
    client: OscClient,
}

impl Live {
    pub fn new(client: OscClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &OscClient {
        &self.client
    }

    /// Read with the default query timeout.
    pub async fn get(&self, address: &str, args: &[Value]) -> Result<Vec<Value>> {
        self.query(address, args, Timeouts::QUERY).await
    }

    /// Single value at `index` of a read.
    pub async fn get_at(&self, address: &str, args: &[Value], index: usize) -> Result<Value> {
        let values = self.get(address, args).await?;
        Ok(at(&values, index))
    }

    /// Setter or action. Live acknowledges these, so they still wait for a reply.
    pub async fn command(&self, address: &str, args: &[Value]) -> Result<Vec<Value>> {
        self.query(address, args, Timeouts::COMMAND).await
    }

    pub async fn query(&self, address: &str, args: &[Value], timeout: Duration) -> Result<Vec<Value>> {
        Ok(self.client.query(address, args, timeout).await?)
    }
}
