use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
    process,
    sync::Arc,
};

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use weft::{
    application::{engine::EngineBuilder, error::AppError, repos::Collaborators},
    cache::{Cache, CacheConfig},
    config::{self, CacheCommand, Command, DispatchArgs, RenderArgs, RequestArgs, parse_pairs},
    domain::{
        attributes::AttributeMap,
        context::{RequestContext, Viewer},
    },
    infra::{error::InfraError, fixture::SiteFixture, telemetry},
};

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %report.joined(), source = report.source, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.joined(), source = report.source, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let cache = Arc::new(Cache::from_config(&CacheConfig::from(&settings.cache))?);
    info!(
        target_module = "weft::main",
        backend = cache.backend_name(),
        "Cache ready"
    );

    match cli_args.command {
        Command::Render(args) => run_render(&settings, cache, *args),
        Command::Dispatch(args) => run_dispatch(&settings, cache, *args),
        Command::Cache(args) => match args.command {
            CacheCommand::Flush(flush) => {
                cache.flush(flush.group.as_deref());
                info!(
                    target_module = "weft::main",
                    group = flush.group.as_deref().unwrap_or("*"),
                    "Cache flushed"
                );
                Ok(())
            }
            CacheCommand::Key(key) => {
                let payload = serde_json::from_str::<serde_json::Value>(&key.payload)
                    .unwrap_or(serde_json::Value::String(key.payload));
                write_line(&cache.build_key(&payload, &key.group))
            }
        },
    }
}

fn run_render(
    settings: &config::Settings,
    cache: Arc<Cache>,
    args: RenderArgs,
) -> Result<(), AppError> {
    let text = match (args.text, args.input) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path).map_err(InfraError::from)?,
        (None, None) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(InfraError::from)?;
            buffer
        }
    };

    let site = Arc::new(SiteFixture::load(&args.request.site)?);
    let engine =
        EngineBuilder::from_settings(Collaborators::from_site(site), cache, settings).build();
    let context = request_context(&args.request);

    let fragment = engine.expand_fragment(&context, &text);
    write_line(&fragment.html)?;
    if args.show_assets {
        for handle in &fragment.assets {
            write_line(&format!("asset: {handle}"))?;
        }
    }
    Ok(())
}

fn run_dispatch(
    settings: &config::Settings,
    cache: Arc<Cache>,
    args: DispatchArgs,
) -> Result<(), AppError> {
    if args.type_tag.trim().is_empty() {
        return Err(AppError::validation("--type must not be empty"));
    }

    let site = Arc::new(SiteFixture::load(&args.request.site)?);
    let engine =
        EngineBuilder::from_settings(Collaborators::from_site(site), cache, settings).build();
    let context = request_context(&args.request);
    let attributes: AttributeMap = parse_pairs(&args.attributes).into_iter().collect();

    let html = engine.render(&context, &args.type_tag, attributes, &args.content);
    write_line(&html)
}

fn request_context(args: &RequestArgs) -> RequestContext {
    let map = |entries: &[String]| -> BTreeMap<String, String> {
        parse_pairs(entries).into_iter().collect()
    };

    RequestContext {
        query: map(&args.query),
        body: map(&args.body),
        cookies: map(&args.cookie),
        session: (!args.session.is_empty()).then(|| map(&args.session)),
        server: map(&args.server),
        request_uri: args.request_uri.clone(),
        current_post: args.post,
        queried_term: args.term,
        viewer: Viewer {
            user_id: args.user,
            can_manage: args.manage,
        },
        admin_screen: args.admin_screen,
    }
}

fn write_line(line: &str) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}").map_err(InfraError::from)?;
    Ok(())
}
