//! Stdio MCP server: newline-delimited JSON-RPC 2.0.
//!
//! Each line on the reader is one message. Requests run concurrently, one
//! tokio task each, and their replies go through a single writer task so
//! lines never interleave. Notifications are handled but never answered.

use crate::error::Result;
use liveline_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "liveline";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One outbound JSON-RPC response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

struct Request {
    /// `None` for notifications.
    id: Option<Value>,
    method: String,
    params: Value,
}

impl Request {
    /// Split a parsed message into a request. `Ok(None)` for responses sent
    /// by the peer, which this server never asked for and ignores.
    fn from_value(message: Value) -> std::result::Result<Option<Self>, Response> {
        let Value::Object(mut fields) = message else {
            return Err(Response::failure(
                Value::Null,
                RpcError::new(INVALID_REQUEST, "Invalid Request: expected an object"),
            ));
        };

        let id = fields.remove("id");
        let method = match fields.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(Response::failure(
                    id.unwrap_or(Value::Null),
                    RpcError::new(INVALID_REQUEST, "Invalid Request: method must be a string"),
                ))
            }
            None if fields.contains_key("result") || fields.contains_key("error") => {
                return Ok(None)
            }
            None => {
                return Err(Response::failure(
                    id.unwrap_or(Value::Null),
                    RpcError::new(INVALID_REQUEST, "Invalid Request: missing method"),
                ))
            }
        };

        Ok(Some(Self {
            id,
            method,
            params: fields.remove("params").unwrap_or(Value::Null),
        }))
    }
}

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// MCP server over any line-oriented byte stream. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Server {
    registry: ToolRegistry,
}

impl Server {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve until `reader` hits EOF.
    ///
    /// On EOF the OSC session is shut down first, so requests still waiting
    /// on Live fail fast instead of running out their timeouts, and requests
    /// that have not reached Live yet fail without reconnecting. Their error
    /// replies are still written before this returns.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), io::Error>(())
        });

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();

        let read_result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(err) = finished {
                    tracing::error!(error = %err, "Request task failed");
                }
            }

            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let Some(response) = server.handle_line(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        // The writer only goes away once every sender is dropped.
                        let _ = tx.send(text);
                    }
                    Err(err) => tracing::error!(error = %err, "Failed to serialize response"),
                }
            });
        };

        tracing::info!(in_flight = in_flight.len(), "Input closed, shutting down");
        self.registry.context().session().shutdown().await;

        while let Some(finished) = in_flight.join_next().await {
            if let Err(err) = finished {
                tracing::error!(error = %err, "Request task failed");
            }
        }

        drop(tx);
        writer_task.await.map_err(io::Error::other)??;
        read_result?;
        Ok(())
    }

    /// Handle one raw line. `None` when nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "Unparsable message");
                return Some(Response::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", err)),
                ));
            }
        };

        let request = match Request::from_value(message) {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(response) => return Some(response),
        };

        let outcome = self.dispatch(&request.method, request.params).await;
        let Some(id) = request.id else {
            if let Err(err) = outcome {
                tracing::debug!(method = %request.method, error = %err.message, "Notification failed");
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(err) => Response::failure(id, err),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        tracing::debug!(method, "Request");
        match method {
            "initialize" => Ok(self.initialize()),
            "notifications/initialized" | "notifications/cancelled" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.definitions() })),
            "tools/call" => self.call_tool(params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    async fn call_tool(&self, params: Value) -> std::result::Result<Value, RpcError> {
        let params: CallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        tracing::debug!(tool = %params.name, "Tool call");
        let result = self.registry.call(&params.name, &params.arguments).await;
        if result.is_error {
            tracing::info!(tool = %params.name, error = %result.first_text(), "Tool returned an error");
        }
        serde_json::to_value(&result).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveline_osc::{OscSession, SessionConfig};
    use liveline_samples::SampleLibrary;
    use liveline_tools::ToolContext;
    use std::sync::Arc;

    fn server() -> Server {
        let ctx = ToolContext::new(
            Arc::new(OscSession::new(SessionConfig::default())),
            Arc::new(SampleLibrary::default()),
        );
        Server::new(ToolRegistry::new(Arc::new(ctx)))
    }

    // --- framing ---

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.id, json!(1));
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(result["capabilities"], json!({ "tools": {} }));
        assert_eq!(result["serverInfo"]["name"], json!("liveline"));
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let server = server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"no/such/method"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_peer_responses_are_ignored() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let response = server().handle_line("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let server = server();
        let response = server.handle_line("[1,2]").await.unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":5}"#)
            .await
            .unwrap();
        assert_eq!(response.id, json!("a"));
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();
        match response.error {
            Some(RpcError { code: METHOD_NOT_FOUND, message }) => {
                assert!(message.contains("resources/list"));
            }
            other => panic!("Expected METHOD_NOT_FOUND, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tools_call_without_name_is_invalid_params() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_call_after_shutdown_does_not_reconnect() {
        let mock = liveline_osc::MockTransport::new();
        mock.reply(liveline_osc::HEALTH_CHECK_ADDRESS, vec![liveline_osc::Value::from("ok")]);
        let transport = mock.clone();
        let session = OscSession::with_factory(
            SessionConfig::default(),
            Arc::new(move |osc: &liveline_osc::OscConfig| {
                liveline_osc::OscClient::with_transport(osc.clone(), Box::new(transport.clone()))
            }),
        );
        let ctx = ToolContext::new(Arc::new(session), Arc::new(SampleLibrary::default()));
        let server = Server::new(ToolRegistry::new(Arc::new(ctx)));

        server.registry().context().session().shutdown().await;
        let response = server
            .handle_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"transport_get_tempo"}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(
            result["content"][0]["text"],
            json!("TRANSPORT_ERROR: Client closing")
        );
        assert_eq!(mock.open_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_tool_error_not_an_rpc_error() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#,
            )
            .await
            .unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(
            result["content"][0]["text"],
            json!("UNKNOWN_TOOL: No handler for tool 'nope'")
        );
    }
}
