use std::path::PathBuf;

use deck::{
    catalog::UnifiedResource,
    cleanup::{CleaningKind, CleaningPlan},
    cli::{paint_status, AnsiStyles},
    integrations::{Selector, StdinConfirm, StdinSelector},
    lifecycle::ProgressEvent,
    management::{self, Deck},
    report::OperationReport,
    resources::Layer,
    DeckError, DeckResult,
};
use tokio_util::sync::CancellationToken;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What every handler needs from the global flags.
pub struct Context {
    project_dir: PathBuf,
    assume_yes: bool,
    cancel: CancellationToken,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Context {
    pub fn new(project_dir: Option<PathBuf>, assume_yes: bool, cancel: CancellationToken) -> Self {
        Self {
            project_dir: project_dir.unwrap_or_else(|| PathBuf::from(".")),
            assume_yes,
            cancel,
        }
    }

    async fn open(&self) -> DeckResult<Deck> {
        if !management::is_initialized(&self.project_dir).await {
            tracing::warn!(
                "{} is not a deck project, run `deck init` first",
                self.project_dir.display()
            );
        }

        Deck::open(&self.project_dir).await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

pub async fn init_subcommand(ctx: &Context, dir: Option<PathBuf>) -> DeckResult<bool> {
    let project_dir = dir.unwrap_or_else(|| ctx.project_dir.clone());
    let deck_dir = management::initialize(Some(project_dir)).await?;
    print_report(&OperationReport::success(format!(
        "initialized deck project at {}",
        deck_dir.display()
    )))
}

pub async fn list_subcommand(ctx: &Context, env: Option<&str>, json: bool) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let catalog = deck.list(env).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(true);
    }

    if catalog.is_empty() {
        println!("nothing here yet, try `{}`", "deck templates update".literal());
        return Ok(true);
    }

    for layer in [Layer::Images, Layer::Custom, Layer::Templates] {
        let rows = catalog.layer(layer);
        if rows.is_empty() {
            continue;
        }

        println!("{}", layer.to_string().header());
        for row in rows {
            println!("  {}", format_row(row));
        }
    }

    Ok(true)
}

pub async fn templates_update_subcommand(ctx: &Context) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let report = deck.update_templates(&ctx.cancel).await?;
    print_report(&report)
}

pub async fn custom_new_subcommand(ctx: &Context, template: Option<String>) -> DeckResult<bool> {
    promote(ctx, Layer::Templates, template).await
}

pub async fn images_new_subcommand(ctx: &Context, custom: Option<String>) -> DeckResult<bool> {
    promote(ctx, Layer::Custom, custom).await
}

pub async fn start_subcommand(ctx: &Context, name: Option<String>) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let Some(name) = resolve_name(&deck, Layer::Images, name).await? else {
        return Ok(false);
    };

    let outcome = deck
        .starter()
        .smart_start(&name, &print_progress, &ctx.cancel)
        .await?;
    print_report(&outcome.report)
}

pub async fn stop_subcommand(ctx: &Context, name: Option<String>) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let Some(name) = resolve_name(&deck, Layer::Images, name).await? else {
        return Ok(false);
    };

    let report = deck.starter().stop(&name, &ctx.cancel).await?;
    print_report(&report)
}

pub async fn restart_subcommand(ctx: &Context, name: Option<String>) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let Some(name) = resolve_name(&deck, Layer::Images, name).await? else {
        return Ok(false);
    };

    let outcome = deck
        .starter()
        .restart(&name, &print_progress, &ctx.cancel)
        .await?;
    print_report(&outcome.report)
}

pub async fn logs_subcommand(ctx: &Context, name: &str, tail: Option<usize>) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let logs = deck.starter().logs(name, tail).await?;
    print!("{}", logs);
    Ok(true)
}

pub async fn exec_subcommand(
    ctx: &Context,
    name: &str,
    command: &[String],
    interactive: bool,
) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let output = deck.starter().exec(name, command, interactive).await?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    Ok(output.exit_code == 0)
}

pub async fn ports_subcommand(ctx: &Context, layer: Layer, name: &str, fix: bool) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let report = deck.check_ports(layer, name, fix).await?;

    for check in &report.checks {
        let state = if check.available {
            "free".valid()
        } else {
            "taken".invalid()
        };
        let suggestion = check
            .suggested_port
            .map(|port| format!(" (suggested {})", port).placeholder())
            .unwrap_or_default();
        println!("  {}={} {}{}", check.name, check.port, state, suggestion);
    }

    print_report(&report.report)
}

pub async fn clean_subcommand(
    ctx: &Context,
    layer: Layer,
    name: Option<String>,
    kind: Option<CleaningKind>,
) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let Some(name) = resolve_name(&deck, layer, name).await? else {
        return Ok(false);
    };

    let cleaner = deck.cleaner();
    let options = match cleaner.compute_cleaning_options(layer, &name).await? {
        CleaningPlan::Refused { reason, hints, .. } => {
            return print_report(&OperationReport::failure(reason).with_hints(hints));
        }
        CleaningPlan::Options(options) => options,
    };

    let picked = match kind {
        Some(kind) => options.iter().position(|o| o.kind == kind).ok_or_else(|| {
            DeckError::custom(anyhow::anyhow!(
                "cleanup '{}' isn't available for {}/{}",
                kind,
                layer,
                name
            ))
        })?,
        None if ctx.assume_yes || options.len() == 1 => {
            options.iter().position(|o| o.recommended).unwrap_or(0)
        }
        None => {
            let items: Vec<String> = options.iter().map(|o| o.to_string()).collect();
            let prompt = format!("How should {}/{} be cleaned?", layer, name);
            let Some(index) = StdinSelector.select_one(&prompt, &items).await? else {
                println!("nothing cleaned");
                return Ok(false);
            };
            index
        }
    };

    let result = cleaner
        .execute(&options[picked], &StdinConfirm::new(ctx.assume_yes), &ctx.cancel)
        .await?;

    for resource in &result.cleaned_resources {
        println!("  {} {}", "removed".valid(), resource);
    }
    for resource in &result.skipped_resources {
        println!("  {} {}", "skipped".invalid(), resource);
    }

    print_report(&result.to_report())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

async fn promote(ctx: &Context, source: Layer, name: Option<String>) -> DeckResult<bool> {
    let deck = ctx.open().await?;
    let Some(name) = resolve_name(&deck, source, name).await? else {
        return Ok(false);
    };

    let entry = deck.promote(source, &name).await?;
    let mut report = OperationReport::success(format!(
        "created {}/{} from {}/{}",
        entry.layer, entry.name, source, name
    ));
    if let Some(reason) = entry.unavailable_reason() {
        report = report.with_hint(format!("{} is {}", entry.name, reason));
    }
    if entry.layer == Layer::Images {
        report = report.with_hint(format!("deck start {}", entry.name));
    }

    print_report(&report)
}

/// Uses `name` if given, otherwise asks the user to pick an entry of `layer`.
async fn resolve_name(deck: &Deck, layer: Layer, name: Option<String>) -> DeckResult<Option<String>> {
    if let Some(name) = name {
        return Ok(Some(name));
    }

    if !deckutils::is_interactive_terminal() {
        return Err(DeckError::custom(anyhow::anyhow!(
            "no {} entry given and no terminal to ask on",
            layer
        )));
    }

    let picked = deck.select_entry(layer, &StdinSelector).await?;
    if picked.is_none() {
        println!("no {} entry selected", layer);
    }
    Ok(picked)
}

fn print_progress(event: ProgressEvent) {
    eprintln!("{}", event.to_string().placeholder());
}

fn print_report(report: &OperationReport) -> DeckResult<bool> {
    if report.success {
        println!("{}", report.message.valid());
    } else {
        println!("{}", report.message.error());
    }

    for hint in &report.hints {
        println!("  hint: {}", hint.literal());
    }

    Ok(report.success)
}

fn format_row(row: &UnifiedResource) -> String {
    let mut line = format!("{:<40} {}", row.name, paint_status(row.status));
    if let Some(image) = &row.related_image_ref {
        line.push_str(&format!("  image: {}", image).placeholder());
    }
    if !row.related_container_names.is_empty() {
        line.push_str(
            &format!("  containers: {}", row.related_container_names.join(", ")).placeholder(),
        );
    }
    if let Some(reason) = &row.unavailable_reason {
        line.push_str(&format!("  ({})", reason).invalid());
    }
    line
}
