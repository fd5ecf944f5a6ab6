//! 开发代理服务器
//!
//! 服务本地构建产物与 live-reload 通知，其余请求全部反向代理
//! 到真实应用服务器。请求处理只读启动时构建的配置，
//! 从不改写流水线或会话状态。

pub mod livereload;
pub mod port;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::bundler::{ProxyConfig, LANDING_PATH};
use crate::error::WatchError;
use crate::state::SessionStore;

pub use livereload::LiveReloadHub;

/// live-reload 客户端回连的 SSE 路径
pub const LIVE_RELOAD_PATH: &str = "/__theme_watch/livereload";

/// 代理服务器状态
///
/// 启动时构建一次，之后只读
pub struct ProxyState {
    /// 代理配置
    pub config: ProxyConfig,
    /// live-reload 中心
    pub hub: Arc<LiveReloadHub>,
    /// 会话状态（只读访问）
    pub session: Arc<SessionStore>,
    /// 转发用 HTTP 客户端
    client: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: ProxyConfig, hub: Arc<LiveReloadHub>, session: Arc<SessionStore>) -> Self {
        Self {
            config,
            hub,
            session,
            client: reqwest::Client::new(),
        }
    }
}

/// 构建代理路由
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route(LANDING_PATH, get(landing))
        .route(LIVE_RELOAD_PATH, get(livereload_stream))
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 绑定回环地址并在后台运行代理服务器
///
/// 绑定失败对会话启动是致命的
pub async fn serve(
    state: Arc<ProxyState>,
    cancel: CancellationToken,
) -> Result<SocketAddr, WatchError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    let listener = TcpListener::bind(addr).await.map_err(WatchError::Bind)?;
    let local_addr = listener.local_addr().map_err(WatchError::Bind)?;

    tracing::info!(addr = %local_addr, "Dev proxy server listening");

    let app = router(state);
    tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "Dev proxy server error");
        }
    });

    Ok(local_addr)
}

/// 落地页
///
/// GET /webpack-dev-server/
async fn landing(State(state): State<Arc<ProxyState>>) -> Html<String> {
    let phase = state.session.phase().await;
    let changed = state
        .session
        .changed_file()
        .await
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>theme-watch</title></head>\n<body>\n\
         <h1>theme-watch dev server</h1>\n\
         <ul>\n\
         <li>proxy target: {}</li>\n\
         <li>port: {}</li>\n\
         <li>session phase: {:?}</li>\n\
         <li>last change: {}</li>\n\
         <li>bundler entries: {}</li>\n\
         </ul>\n</body>\n</html>\n",
        state.config.target_url,
        state.config.port,
        phase,
        changed,
        state.config.bundler.entry.len(),
    ))
}

/// live-reload 事件流
///
/// GET /__theme_watch/livereload
async fn livereload_stream(
    State(state): State<Arc<ProxyState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.hub.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event("reload").data(json));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "Live reload subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// 反向代理
///
/// 所有未匹配的路径转发到配置的目标 URL
async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(uri.path());
    let target = format!(
        "{}{}",
        state.config.target_url.trim_end_matches('/'),
        path_and_query
    );

    let mut request = state.client.request(method, &target);
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name.as_str()) {
            request = request.header(name, value);
        }
    }

    let upstream = match request.body(body.to_vec()).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(target = %target, error = %e, "Proxy forward failed");
            return (
                StatusCode::BAD_GATEWAY,
                format!("upstream unreachable: {}", e),
            )
                .into_response();
        }
    };

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if !is_hop_by_hop(name.as_str()) {
            response_headers.insert(name, value.clone());
        }
    }

    match upstream.bytes().await {
        Ok(bytes) => (status, response_headers, bytes).into_response(),
        Err(e) => {
            warn!(target = %target, error = %e, "Failed to read upstream body");
            (StatusCode::BAD_GATEWAY, "upstream body error").into_response()
        }
    }
}

/// 不应跨代理转发的头
fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name,
        "host"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "content-length"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bundler::BundlerConfig;

    fn empty_bundler() -> BundlerConfig {
        serde_json::from_str(r#"{ "entry": ["./js/main.js"] }"#).unwrap()
    }

    async fn start_upstream() -> SocketAddr {
        let app = Router::new().route(
            "/api/ping",
            get(|| async { (StatusCode::OK, "upstream pong") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn start_proxy(target_url: &str) -> (SocketAddr, CancellationToken) {
        let config = ProxyConfig::build(empty_bundler(), None, None, target_url, 0);
        let state = Arc::new(ProxyState::new(
            config,
            Arc::new(LiveReloadHub::new()),
            Arc::new(SessionStore::new()),
        ));
        let cancel = CancellationToken::new();
        let addr = serve(state, cancel.clone()).await.unwrap();
        (addr, cancel)
    }

    #[tokio::test]
    async fn test_landing_page_served_at_fixed_path() {
        let (addr, cancel) = start_proxy("http://localhost:8080").await;

        let body = reqwest::get(format!("http://{}{}", addr, LANDING_PATH))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("theme-watch dev server"));
        assert!(body.contains("http://localhost:8080"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unmatched_paths_proxied_to_target() {
        let upstream = start_upstream().await;
        let (addr, cancel) = start_proxy(&format!("http://{}", upstream)).await;

        let resp = reqwest::get(format!("http://{}/api/ping", addr))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "upstream pong");
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unreachable_target_is_bad_gateway() {
        let (addr, cancel) = start_proxy("http://127.0.0.1:1").await;

        let resp = reqwest::get(format!("http://{}/anything", addr))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        cancel.cancel();
    }
}
