mod handlers;

use clap::{CommandFactory, Parser};
use deck::{
    cli::{CustomSubcommand, DeckArgs, DeckSubcommand, ImagesSubcommand, TemplatesSubcommand},
    DeckResult,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> DeckResult<()> {
    let args = DeckArgs::parse();
    init_tracing(args.verbose);

    // Ctrl-C cancels whatever engine call is in flight; the handlers report what was skipped.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let ctx = handlers::Context::new(args.path, args.yes, cancel);
    let success = match args.subcommand {
        Some(DeckSubcommand::Init { dir }) => handlers::init_subcommand(&ctx, dir).await?,
        Some(DeckSubcommand::List { env, json }) => {
            handlers::list_subcommand(&ctx, env.as_deref(), json).await?
        }
        Some(DeckSubcommand::Templates {
            subcommand: TemplatesSubcommand::Update,
        }) => handlers::templates_update_subcommand(&ctx).await?,
        Some(DeckSubcommand::Custom {
            subcommand: CustomSubcommand::New { template },
        }) => handlers::custom_new_subcommand(&ctx, template).await?,
        Some(DeckSubcommand::Images {
            subcommand: ImagesSubcommand::New { custom },
        }) => handlers::images_new_subcommand(&ctx, custom).await?,
        Some(DeckSubcommand::Start { name }) => handlers::start_subcommand(&ctx, name).await?,
        Some(DeckSubcommand::Stop { name }) => handlers::stop_subcommand(&ctx, name).await?,
        Some(DeckSubcommand::Restart { name }) => handlers::restart_subcommand(&ctx, name).await?,
        Some(DeckSubcommand::Logs { name, tail }) => {
            handlers::logs_subcommand(&ctx, &name, tail).await?
        }
        Some(DeckSubcommand::Exec {
            name,
            interactive,
            command,
        }) => handlers::exec_subcommand(&ctx, &name, &command, interactive).await?,
        Some(DeckSubcommand::Ports { name, layer, fix }) => {
            handlers::ports_subcommand(&ctx, layer, &name, fix).await?
        }
        Some(DeckSubcommand::Clean { layer, name, kind }) => {
            handlers::clean_subcommand(&ctx, layer, name, kind.map(Into::into)).await?
        }
        None => {
            DeckArgs::command().print_help()?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// `RUST_LOG` wins; otherwise deck logs at info, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "deck=debug" } else { "deck=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
