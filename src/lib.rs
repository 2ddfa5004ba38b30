//! Stream Buffer Filter for Envoy Proxy
//!
//! This filter gates requests by HTTP method and frames request bodies into
//! delimiter-terminated records as chunks arrive. Verbs without a handler are
//! answered with 405 Method Not Allowed and an `allow` header. Body chunks
//! are accumulated in a growable buffer that only ever holds the current
//! partial record.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod buffer;
pub mod config;
pub mod framing;
pub mod methods;
pub mod telemetry;

use config::FilterConfig;
use framing::{FramingError, RecordFramer};
use log::{debug, info, warn};
use methods::{Method, MethodNotAllowed, MethodTable, MethodTableBuilder};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType, LogLevel};

/// Per-verb request handler
type VerbHandler = fn(&mut StreamBufferHttpContext) -> Action;

/// Verbs without a body are forwarded untouched
fn pass_through(ctx: &mut StreamBufferHttpContext) -> Action {
    ctx.framer = None;
    Action::Continue
}

/// Verbs with a body get a record framer for the body chunks
fn frame_body(ctx: &mut StreamBufferHttpContext) -> Action {
    ctx.framer = Some(RecordFramer::new(
        ctx.config.initial_buffer_capacity,
        ctx.config.record_delimiter,
        ctx.config.max_record_size,
    ));
    Action::Continue
}

/// Register a handler for every configured verb
fn build_method_table(methods: &[Method]) -> MethodTable<VerbHandler> {
    methods
        .iter()
        .fold(MethodTableBuilder::new(), |builder, &method| {
            let handler: VerbHandler = if method.has_body() {
                frame_body
            } else {
                pass_through
            };
            builder.method(method, handler)
        })
        .build()
}

/// Body bytes handed over by the host. A missing chunk is framed as empty
/// and logged, since its bytes are lost to the framer.
fn body_chunk_or_empty(context_id: u32, body_size: usize, body: Option<Vec<u8>>) -> Vec<u8> {
    match body {
        Some(chunk) => chunk,
        None => {
            warn!(
                "[context_id={}] Body chunk of {} bytes unavailable, framing without it",
                context_id, body_size
            );
            Vec::new()
        }
    }
}

/// Root context for filter lifecycle management
struct StreamBufferRootContext {
    config: FilterConfig,
    table: MethodTable<VerbHandler>,
}

impl StreamBufferRootContext {
    fn new() -> Self {
        let config = FilterConfig::default();
        let table = build_method_table(&config.methods().unwrap_or_default());
        Self { config, table }
    }
}

impl Context for StreamBufferRootContext {}

impl RootContext for StreamBufferRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            let config = match FilterConfig::from_bytes(&config_bytes) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Rejecting filter configuration: {}", e);
                    return false;
                }
            };
            let methods = match config.methods() {
                Ok(methods) => methods,
                Err(e) => {
                    warn!("Rejecting filter configuration: {}", e);
                    return false;
                }
            };
            self.table = build_method_table(&methods);
            self.config = config;
        }

        info!(
            "Stream buffer filter initialized, allowing {}",
            self.table.allow_header()
        );

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(StreamBufferHttpContext::new(
            context_id,
            self.config.clone(),
            self.table.clone(),
        )))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context for per-request processing
struct StreamBufferHttpContext {
    context_id: u32,
    config: FilterConfig,
    table: MethodTable<VerbHandler>,
    /// Present while the request body is being framed
    framer: Option<RecordFramer>,
    /// Records framed from a completed body
    records_framed: Option<usize>,
    /// Track if we've already sent a local response
    request_rejected: bool,
}

impl StreamBufferHttpContext {
    fn new(context_id: u32, config: FilterConfig, table: MethodTable<VerbHandler>) -> Self {
        Self {
            context_id,
            config,
            table,
            framer: None,
            records_framed: None,
            request_rejected: false,
        }
    }

    /// Route the request verb to its handler
    fn dispatch(&mut self, method: &str) -> Result<Action, MethodNotAllowed> {
        let handler = *self.table.route(method)?;
        Ok(handler(self))
    }

    /// Send a 405 with the allowed verbs
    fn reject_method(&mut self, method: &str, err: &MethodNotAllowed) {
        if self.request_rejected {
            return;
        }
        self.request_rejected = true;

        let allow = err.allow_header();
        let allowed: Vec<&str> = err.allowed.iter().map(Method::as_str).collect();
        let error_body = serde_json::json!({
            "error": "Method Not Allowed",
            "method": method,
            "allow": allowed,
            "status": err.status()
        });
        let body_bytes = error_body.to_string();

        telemetry::audit_method_not_allowed(method, err)
            .with_context_id(self.context_id)
            .emit();

        self.send_http_response(
            err.status(),
            vec![("content-type", "application/json"), ("allow", allow.as_str())],
            Some(body_bytes.as_bytes()),
        );
    }

    /// Send a 413 for a record over the size limit
    fn reject_body(&mut self, err: &FramingError) {
        if self.request_rejected {
            return;
        }
        self.request_rejected = true;

        let reason = err.to_string();
        let error_body = serde_json::json!({
            "error": "Payload Too Large",
            "reason": reason,
            "status": 413
        });
        let body_bytes = error_body.to_string();

        telemetry::audit_record_too_large(&reason)
            .with_context_id(self.context_id)
            .emit();

        self.send_http_response(
            413,
            vec![("content-type", "application/json")],
            Some(body_bytes.as_bytes()),
        );
    }
}

impl Context for StreamBufferHttpContext {}

impl HttpContext for StreamBufferHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        let method = self.get_http_request_header(":method").unwrap_or_default();
        let path = self.get_http_request_header(":path").unwrap_or_default();

        match self.dispatch(&method) {
            Ok(action) => {
                debug!(
                    "[context_id={}] {} {} accepted, framing body: {}",
                    self.context_id,
                    method,
                    path,
                    self.framer.is_some()
                );
                telemetry::audit_accepted(&method)
                    .with_path(&path)
                    .with_context_id(self.context_id)
                    .emit();
                action
            }
            Err(err) => {
                self.reject_method(&method, &err);
                Action::Pause
            }
        }
    }

    fn on_http_request_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        if self.request_rejected {
            return Action::Pause;
        }
        if self.framer.is_none() {
            return Action::Continue;
        }

        // Chunks are forwarded as they are framed, so each call sees only new bytes
        let chunk = if body_size > 0 {
            body_chunk_or_empty(
                self.context_id,
                body_size,
                self.get_http_request_body(0, body_size),
            )
        } else {
            Vec::new()
        };

        let context_id = self.context_id;
        let log_records = self.config.log_records;
        let log_record = |record: &[u8]| {
            if log_records {
                debug!(
                    "[context_id={}] record: {}",
                    context_id,
                    String::from_utf8_lossy(record)
                );
            }
        };

        let framer = match self.framer.as_mut() {
            Some(framer) => framer,
            None => return Action::Continue,
        };

        match framer.feed(&chunk, log_record) {
            Ok(completed) => {
                debug!(
                    "[context_id={}] {} bytes -> {} records, {} bytes pending",
                    context_id,
                    chunk.len(),
                    completed,
                    framer.pending().len()
                );
            }
            Err(err) => {
                warn!("[context_id={}] {}", context_id, err);
                self.framer = None;
                self.reject_body(&err);
                return Action::Pause;
            }
        }

        if end_of_stream {
            framer.finish(log_record);
            telemetry::audit_body_framed(
                framer.records(),
                framer.bytes_seen(),
                framer.buffer_stats(),
            )
            .with_context_id(context_id)
            .emit();
            self.records_framed = Some(framer.records());
            self.framer = None;
        }

        Action::Continue
    }

    fn on_http_response_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        if let Some(records) = self.records_framed {
            self.set_http_response_header("x-stream-buffer-records", Some(&records.to_string()));
        }
        Action::Continue
    }

    fn on_log(&mut self) {
        if self.request_rejected {
            info!(
                "[context_id={}] Request was REJECTED by stream buffer filter",
                self.context_id
            );
        } else {
            debug!(
                "[context_id={}] Request processing complete",
                self.context_id
            );
        }
    }
}

// Register the filter with proxy-wasm runtime
proxy_wasm::main! {{
    proxy_wasm::set_log_level(LogLevel::Debug);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(StreamBufferRootContext::new())
    });
}}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_for(methods: &[Method]) -> StreamBufferHttpContext {
        StreamBufferHttpContext::new(1, FilterConfig::default(), build_method_table(methods))
    }

    #[test]
    fn test_default_table() {
        let root = StreamBufferRootContext::new();
        assert_eq!(root.table.allow_header(), "GET, HEAD, POST");
    }

    #[test]
    fn test_body_verbs_enable_framing() {
        let mut ctx = context_for(&[Method::Get, Method::Post, Method::Put]);

        assert!(matches!(ctx.dispatch("POST"), Ok(Action::Continue)));
        assert!(ctx.framer.is_some());

        assert!(matches!(ctx.dispatch("GET"), Ok(Action::Continue)));
        assert!(ctx.framer.is_none());

        assert!(matches!(ctx.dispatch("PUT"), Ok(Action::Continue)));
        assert!(ctx.framer.is_some());
    }

    #[test]
    fn test_head_routes_to_get_handler() {
        let mut ctx = context_for(&[Method::Get]);
        assert!(matches!(ctx.dispatch("HEAD"), Ok(Action::Continue)));
        assert!(ctx.framer.is_none());
    }

    #[test]
    fn test_unrouted_verb_reports_allow_list() {
        let mut ctx = context_for(&[Method::Get]);
        match ctx.dispatch("DELETE") {
            Err(err) => {
                assert_eq!(err.allow_header(), "GET, HEAD");
                assert_eq!(err.status(), 405);
            }
            Ok(_) => panic!("DELETE should not be routed"),
        }
    }

    #[test]
    fn test_missing_body_chunk_is_empty() {
        assert!(body_chunk_or_empty(3, 16, None).is_empty());
        assert_eq!(body_chunk_or_empty(3, 2, Some(b"ab".to_vec())), b"ab");
    }

    #[test]
    fn test_framer_uses_config() {
        let config = FilterConfig {
            record_delimiter: b';',
            max_record_size: 4,
            ..Default::default()
        };
        let mut ctx = StreamBufferHttpContext::new(2, config, build_method_table(&[Method::Post]));
        ctx.dispatch("POST").unwrap();

        let framer = ctx.framer.as_mut().unwrap();
        assert_eq!(framer.feed(b"ab;cd;", |_| {}).unwrap(), 2);
        assert!(framer.feed(b"toolong", |_| {}).is_err());
    }
}
