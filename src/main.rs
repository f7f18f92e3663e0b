//! leadsync - headless CRM lead dashboard
//!
//! Lists leads from a local cache with time-based expiry, refreshes them
//! incrementally from the webhook backend, and reports what changed.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use leadsync::api::NewTask;
use leadsync::app::{App, LeadLoad};
use leadsync::cli::{CacheAction, Cli, Command};
use leadsync::config::Config;
use leadsync::feed::{FetchMode, Outcome};
use leadsync::ui;

/// Sets up logging to stderr; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: bool) {
    let default = if verbose { "leadsync=debug" } else { "leadsync=info" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_banner(load: &LeadLoad) {
    if let Some(message) = load.banner() {
        eprintln!("warning: {} (showing last known data)", message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let app = App::from_config(config.clone()).with_identity(cli.identity_override());

    match cli.command {
        Command::Login { user, password } => {
            let password = match password {
                Some(password) => password,
                None => Config::password_from_env()?,
            };
            let session = app.login(&user, &password).await?;
            println!(
                "Signed in as {} {} <{}>",
                session.user.first_name, session.user.last_name, session.user.email
            );
        }
        Command::Logout => {
            app.logout().await;
            println!("Signed out.");
        }
        Command::Leads(args) => {
            let mode = if args.refresh {
                FetchMode::Manual
            } else {
                FetchMode::Initial
            };
            let load = app.load_leads(mode).await?;
            print_banner(&load);
            let query = args.query();
            let page = query.apply(load.feed.leads());
            print_lines(&ui::render_lead_page(&page, query.per_page));
        }
        Command::Lead { id } => {
            let (lead, comments) = app.lead_detail(&id).await?;
            print_lines(&ui::render_lead_detail(&lead, Some(&comments), app.now()));
        }
        Command::Refresh => {
            let load = app.load_leads(FetchMode::Manual).await?;
            print_banner(&load);
            if let Outcome::Replaced { count } = load.outcome {
                println!("Refreshed {} leads.", count);
            }
        }
        Command::Watch { interval } => {
            let interval = match interval {
                Some(interval) => interval,
                None => config.refresh.interval()?,
            };
            app.watch(interval, |feed, outcome| match outcome {
                Outcome::Merged(summary) => {
                    let at = feed.last_updated().unwrap_or_else(chrono::Utc::now);
                    println!("{}", ui::render_merge(summary, at));
                    for lead in feed.leads().iter().filter(|l| l.is_flagged()) {
                        let tag = if lead.is_new { "new" } else { "updated" };
                        println!("  {:<8} {} ({})", tag, lead.name, lead.status);
                    }
                }
                Outcome::Cached { count } | Outcome::Replaced { count } => {
                    println!("Loaded {} leads.", count);
                }
                Outcome::Failed { message } => eprintln!("warning: {}", message),
                _ => {}
            })
            .await?;
        }
        Command::Summary => {
            let overview = app.overview().await?;
            print_lines(&ui::render_summary(&overview.leads));
            println!("Open tasks:      {}", overview.open_tasks);
            println!("Due today:       {}", overview.due_today);
        }
        Command::Tasks => {
            let tasks = app.tasks().await?;
            print_lines(&ui::render_task_board(&tasks, app.now()));
        }
        Command::Comments { lead_id } => {
            let comments = app.comments(&lead_id).await?;
            if comments.is_empty() {
                println!("No comments yet.");
            }
            for comment in comments {
                println!("{} ({}): {}", comment.author, comment.created_at, comment.content);
            }
        }
        Command::Status { lead_id, status } => {
            app.set_status(&lead_id, status).await?;
            println!("{} is now {}.", lead_id, status);
        }
        Command::Assign { to, lead_ids } => {
            app.assign(&lead_ids, &to).await?;
            println!("Assigned {} leads to {}.", lead_ids.len(), to);
        }
        Command::AddTask(args) => {
            let task = NewTask {
                lead_id: args.lead_id,
                title: args.title,
                description: args.description,
                due: args.due,
                priority: args.priority,
            };
            app.add_task(&task).await?;
            println!("Task created on {}.", task.lead_id);
        }
        Command::TaskStatus {
            task_id,
            lead_id,
            status,
        } => {
            app.set_task_status(&task_id, &lead_id, status).await?;
            println!("Task {} moved to {}.", task_id, status.as_str());
        }
        Command::Cache { action } => match action {
            CacheAction::Info => {
                print_lines(&ui::render_cache_info(&app.cache_info(), app.now()));
            }
            CacheAction::Clear { details_only } => {
                app.clear_cache(details_only);
                println!("Cache cleared.");
            }
        },
    }

    Ok(())
}
