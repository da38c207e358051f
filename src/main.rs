use salvo::catcher::Catcher;
use salvo::cors::{AllowOrigin, Cors};
use salvo::http::Method;
use salvo::prelude::*;
use salvo::server::ServerHandle;
use tokio::signal;
use tracing::info;

mod config;
mod engine;
mod error;
mod events;
mod id;
mod matcher;
mod models;
mod queue;
mod registry;
mod relay;
mod session;
mod transport;
mod utils;
mod validate;

pub use error::AppError;

pub type AppResult<T> = Result<T, AppError>;

fn cors_hoop() -> impl Handler {
    let origin = match crate::config::get().allowed_origin.as_deref() {
        Some(origin) => AllowOrigin::exact(
            origin
                .parse()
                .expect("allowed_origin must be a valid header value"),
        ),
        None => AllowOrigin::any(),
    };
    Cors::new()
        .allow_origin(origin)
        .allow_methods(vec![Method::GET])
        .into_handler()
}

/// Every response carries no-cache directives. The wire protocol is
/// stateful and ephemeral, so nothing here should ever be cached by an
/// intermediary.
#[handler]
async fn no_cache_hoop(res: &mut Response) {
    res.headers_mut().insert(
        salvo::http::header::CACHE_CONTROL,
        salvo::http::HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
}

fn router() -> Router {
    Router::new()
        .hoop(crate::utils::logger::Logger)
        .hoop(cors_hoop())
        .hoop(no_cache_hoop)
        .get(transport::health)
        .push(Router::with_path("healthz").get(transport::health))
        .push(Router::with_path("connect").goal(transport::connect))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    crate::config::init();
    let cfg = crate::config::get();

    let _guard = cfg.log.guard();
    tracing::info!("log level: {}", &cfg.log.filter_level);

    let service = Service::new(router()).catcher(Catcher::default());
    let listen_addr = format!("{}:{}", cfg.bind_address, cfg.listen_port);
    println!("🚀 Signaling server listening on ws://{listen_addr}/connect");

    let acceptor = TcpListener::new(&listen_addr).bind().await;
    let server = Server::new(acceptor);
    tokio::spawn(shutdown_signal(server.handle()));
    server.serve(service).await;
}

async fn shutdown_signal(handle: ServerHandle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl_c signal received"),
        _ = terminate => info!("terminate signal received"),
    }
    handle.stop_graceful(std::time::Duration::from_secs(10));
}

#[cfg(test)]
mod tests {
    use salvo::prelude::*;
    use salvo::test::{ResponseExt, TestClient};

    #[tokio::test]
    async fn healthz_reports_alive() {
        crate::config::ensure_init_for_test();
        let service = Service::new(super::router());

        let content = TestClient::get("http://127.0.0.1:5800/healthz")
            .send(&service)
            .await
            .take_string()
            .await
            .unwrap();
        assert_eq!(content, "alive");
    }
}
