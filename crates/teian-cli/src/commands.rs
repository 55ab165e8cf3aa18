use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use teian_store::{
    AliasRepo, AliasStore, QuotaLedger, QuotaResetDriver, Store, SuggestionRepo, SuggestionStore,
    UploadQuota,
};
use teian_types::{Alias, AliasEdit, AliasFilter, AliasStatus, NewAlias, Query, Suggestion};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::*;
use crate::config::TeianConfig;

pub fn run_command(cli: Cli, config: TeianConfig) -> anyhow::Result<()> {
    let out = Output(cli.format);
    match cli.command {
        Command::Serve(args) => cmd_serve(&config, args),
        Command::Suggestion(action) => {
            let store = open_store(&config)?;
            let result = cmd_suggestion(&SuggestionRepo::new(store.clone()), action, out);
            finish(store, result)
        }
        Command::Alias(action) => {
            let store = open_store(&config)?;
            let result = cmd_alias(&AliasRepo::new(store.clone()), action, out);
            finish(store, result)
        }
        Command::Quota(action) => {
            let store = open_store(&config)?;
            let result = cmd_quota(&QuotaLedger::new(store.clone()), action, out);
            finish(store, result)
        }
    }
}

fn open_store(config: &TeianConfig) -> anyhow::Result<Store> {
    Store::open(&config.db_path, config.store_options())
        .with_context(|| format!("opening {}", config.db_path.display()))
}

/// Close the store after the command's repository has been dropped.
fn finish(store: Store, result: anyhow::Result<()>) -> anyhow::Result<()> {
    let closed = store.close();
    result?;
    Ok(closed?)
}

#[derive(Clone, Copy)]
struct Output(OutputFormat);

impl Output {
    /// Print `value` as JSON, or hand it to `text` for human output.
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.0 {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(value),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

fn cmd_serve(config: &TeianConfig, args: ServeArgs) -> anyhow::Result<()> {
    let at = match args.reset_at {
        Some(s) => s.parse()?,
        None => config.reset_at()?,
    };
    // Opening may sleep between lock retries; keep it off the runtime.
    let store = open_store(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let quota: Arc<dyn UploadQuota> = Arc::new(QuotaLedger::new(store.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = QuotaResetDriver::new(quota, at).spawn(shutdown_rx);

        println!(
            "{} teian serving {} (quota reset daily at {})",
            "✓".green().bold(),
            config.db_path.display().to_string().bold(),
            at.to_string().yellow(),
        );

        shutdown_signal().await;
        info!("shutdown requested");
        // The driver may already have exited on its own.
        let _ = shutdown_tx.send(true);
        driver.await.context("quota reset driver")?;
        store.close()?;
        println!("{} store closed", "✓".green());
        Ok::<_, anyhow::Error>(())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
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

// ---------------------------------------------------------------------------
// suggestion
// ---------------------------------------------------------------------------

fn cmd_suggestion(
    repo: &dyn SuggestionStore,
    action: SuggestionAction,
    out: Output,
) -> anyhow::Result<()> {
    match action {
        SuggestionAction::Add { username, text } => {
            let s = repo.create(&username, &text)?;
            out.emit(&s, |s| {
                println!("{} suggestion {} from {}", "✓".green().bold(), s.id.to_string().yellow(), s.username.bold())
            })
        }
        SuggestionAction::List { user, list } => {
            let items = match user {
                Some(user) => repo.of_user(&user)?,
                None => repo.all()?,
            };
            let items = Query::new(list.filter_user, list.text, list.sort).apply(items);
            out.emit(&items[..], |items| print_suggestions(items))
        }
        SuggestionAction::Delete { username, id } => {
            repo.delete(&username, id)?;
            out.emit(&id, |id| println!("{} deleted suggestion {}", "✓".green(), id))
        }
    }
}

fn print_suggestions(items: &[Suggestion]) {
    if items.is_empty() {
        println!("No suggestions.");
        return;
    }
    for s in items {
        println!(
            "{}  {}  {}",
            format!("#{}", s.id).yellow().bold(),
            s.username.bold(),
            s.fmt_created().dimmed()
        );
        println!("    {}", s.text);
    }
}

// ---------------------------------------------------------------------------
// alias
// ---------------------------------------------------------------------------

fn cmd_alias(repo: &dyn AliasStore, action: AliasAction, out: Output) -> anyhow::Result<()> {
    match action {
        AliasAction::Add {
            username,
            old,
            new,
            comment,
        } => {
            let draft = NewAlias::new(username, old, new, comment);
            draft.validate()?;
            let alias = repo.create(&draft)?;
            out.emit(&alias, |a| {
                println!("{} alias {} proposed", "✓".green().bold(), a.id.to_string().yellow());
                print_alias(a);
            })
        }
        AliasAction::Show { id } => {
            let alias = repo.get(id)?;
            out.emit(&alias, print_alias)
        }
        AliasAction::List { user, list } => {
            let items = match user {
                Some(user) => repo.of_user(&user)?,
                None => repo.all()?,
            };
            let items = Query::new(list.filter_user, list.text, list.sort).apply(items);
            out.emit(&items[..], |items| print_aliases(items))
        }
        AliasAction::Update {
            id,
            old,
            new,
            comment,
            status,
        } => {
            let alias = repo.edit(
                id,
                &AliasEdit {
                    old,
                    new,
                    comment,
                    status,
                },
            )?;
            out.emit(&alias, |a| {
                println!("{} alias {} updated", "✓".green().bold(), a.id.to_string().yellow());
                print_alias(a);
            })
        }
        AliasAction::Delete { id, all } => {
            if all {
                let removed = repo.delete_all()?;
                out.emit(&removed, |n| println!("{} deleted {} aliases", "✓".green(), n))
            } else {
                let id = id.context("alias id required")?;
                repo.delete(id)?;
                out.emit(&id, |id| println!("{} deleted alias {}", "✓".green(), id))
            }
        }
        AliasAction::Search {
            query,
            old,
            new,
            username,
            comment,
        } => {
            let filter = AliasFilter {
                old: old.unwrap_or_default(),
                new: new.unwrap_or_default(),
                username: username.unwrap_or_default(),
                comment: comment.unwrap_or_default(),
            };
            let items = match query {
                Some(q) if filter.is_empty() => repo.search(&q)?,
                Some(q) => repo
                    .search_advanced(&filter)?
                    .into_iter()
                    .filter(|a| a.old.contains(q.as_str()) || a.new.contains(q.as_str()))
                    .collect(),
                None => repo.search_advanced(&filter)?,
            };
            out.emit(&items[..], |items| print_aliases(items))
        }
    }
}

fn status_label(status: AliasStatus) -> colored::ColoredString {
    match status {
        AliasStatus::New => "new".cyan(),
        AliasStatus::Approved => "approved".green(),
        AliasStatus::Rejected => "rejected".red(),
    }
}

fn print_alias(a: &Alias) {
    println!(
        "{}  {} → {}  [{}]  by {}  {}",
        format!("#{}", a.id).yellow().bold(),
        a.old.bold(),
        a.new.bold(),
        status_label(a.status),
        a.username,
        a.fmt_created().dimmed()
    );
    if !a.comment.is_empty() {
        println!("    {}", a.comment);
    }
}

fn print_aliases(items: &[Alias]) {
    if items.is_empty() {
        println!("No aliases.");
        return;
    }
    items.iter().for_each(print_alias);
}

// ---------------------------------------------------------------------------
// quota
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct QuotaReport<'a> {
    username: &'a str,
    used: u64,
    remaining: u64,
    cap: u64,
}

fn cmd_quota(quota: &dyn UploadQuota, action: QuotaAction, out: Output) -> anyhow::Result<()> {
    let cap = quota.cap();
    match action {
        QuotaAction::Charge { username, bytes } => {
            let remaining = quota.charge(&username, bytes)?;
            let report = QuotaReport {
                username: &username,
                used: cap - remaining,
                remaining,
                cap,
            };
            out.emit(&report, |r| {
                println!(
                    "{} charged {} bytes to {}; {} of {} remaining",
                    "✓".green().bold(),
                    bytes,
                    r.username.bold(),
                    r.remaining.to_string().yellow(),
                    r.cap
                )
            })
        }
        QuotaAction::Usage { username } => {
            let used = quota.usage(&username)?;
            let report = QuotaReport {
                username: &username,
                used,
                remaining: cap.saturating_sub(used),
                cap,
            };
            out.emit(&report, |r| {
                println!("{}: {} of {} bytes used", r.username.bold(), r.used.to_string().yellow(), r.cap)
            })
        }
        QuotaAction::Reset => {
            let cleared = quota.reset_all()?;
            out.emit(&cleared, |n| println!("{} reset quota for {} users", "✓".green().bold(), n))
        }
    }
}
