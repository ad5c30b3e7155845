use std::{process, sync::Arc};

use playshelf::{
    application::{error::AppError, refresh::SitemapRefresher, sitemap::SitemapService},
    config,
    infra::{
        catalog,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
    },
};
use tokio::{io::AsyncWriteExt, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

fn build_sitemap_service(settings: &config::Settings) -> Result<Arc<SitemapService>, AppError> {
    let store = catalog::connect(&settings.catalog)?;
    Ok(Arc::new(SitemapService::new(
        store,
        settings.sitemap.base.clone(),
    )))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let sitemap = build_sitemap_service(&settings)?;

    if settings.sitemap.warm_on_startup {
        match sitemap.sitemap_xml().await {
            Ok(document) => info!(
                target = "playshelf::serve",
                bytes = document.len(),
                "sitemap warmed on startup"
            ),
            Err(err) => warn!(
                target = "playshelf::serve",
                error = %err,
                "sitemap warmup failed; first request will retry"
            ),
        }
    }

    let refresher = SitemapRefresher::spawn(sitemap.clone(), settings.sitemap.refresh_interval);

    let result = serve_http(
        &settings,
        HttpState::new(sitemap.clone(), settings.sitemap.refresh_interval),
        AdminState { sitemap },
    )
    .await;

    refresher.shutdown(settings.server.graceful_shutdown).await;

    result
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let sitemap = build_sitemap_service(&settings)?;
    let document = sitemap.build_document().await?;
    let xml = document.to_xml();

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, xml.as_bytes())
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                target = "playshelf::render",
                path = %path.display(),
                urls = document.len(),
                "sitemap written"
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(xml.as_bytes())
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            stdout
                .flush()
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "playshelf::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listeners bound"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "playshelf::serve", "listeners stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
