use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use taskboard_rest_api::api;
use taskboard_rest_api::client::{self, RegisterRequest, SubtaskRequest, TaskFilter};
use taskboard_rest_api::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// The address to bind to
        #[arg(short, long, default_value = "127.0.0.1:37240")]
        addr: SocketAddr,
    },
    /// Client commands
    Client {
        /// The base URL of the API
        #[arg(long, default_value = taskboard_rest_api::BASE_URL)]
        url: String,
        /// Bearer token returned by `auth login`
        #[arg(long)]
        token: Option<String>,
        #[command(subcommand)]
        command: ClientCommands,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Account related commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Task related commands
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and print a bearer token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Request an email verification code
    StartVerification {
        #[arg(long)]
        email: String,
    },
    /// Submit an email verification code
    Verify {
        code: String,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks, optionally filtered
    List {
        #[arg(long)]
        id: Option<i32>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        priority: Option<bool>,
        /// May be repeated; a task matches if its tag is any of these
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Show a single task
    Get { id: i32 },
    /// Create a task
    Create {
        #[arg(long)]
        name: String,
        /// study, classes or others
        #[arg(long)]
        tag: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: bool,
        /// Subtask as NAME:DURATION; may be repeated
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },
    /// Update a task
    Update {
        id: i32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<bool>,
        /// Mark the task as completed
        #[arg(long)]
        complete: bool,
        /// Id of a subtask to mark completed; may be repeated
        #[arg(long = "complete-subtask")]
        complete_subtasks: Vec<i32>,
    },
    /// Delete a task
    Delete { id: i32 },
}

fn parse_subtask(raw: &str) -> anyhow::Result<SubtaskRequest> {
    let (name, duration) = match raw.rsplit_once(':') {
        Some((name, duration)) => (
            name,
            Some(
                duration
                    .parse::<i32>()
                    .with_context(|| format!("invalid subtask duration in '{}'", raw))?,
            ),
        ),
        None => (raw, None),
    };
    Ok(SubtaskRequest {
        name: Some(name.to_string()),
        duration,
        ..Default::default()
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let config = Config::from_env()?;
            let pool = config
                .build_pool()
                .context("Failed to create database pool")?;

            // Create router with connection pool
            let app = api::create_router(pool, config.auth);

            // Start server
            tracing::info!("Starting server on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Client {
            url,
            token,
            command,
        } => match command {
            ClientCommands::Auth { command } => match command {
                AuthCommands::Register {
                    username,
                    email,
                    password,
                } => {
                    let user = client::register(
                        &url,
                        RegisterRequest {
                            username,
                            email,
                            password,
                        },
                    )
                    .await?;
                    print_json(&user)?;
                }
                AuthCommands::Login { email, password } => {
                    let issued = client::login(&url, &email, &password).await?;
                    print_json(&issued)?;
                }
                AuthCommands::StartVerification { email } => {
                    let started = client::start_verification(&url, &email).await?;
                    print_json(&started)?;
                }
                AuthCommands::Verify { code } => {
                    let user = client::verify(&url, &code).await?;
                    print_json(&user)?;
                }
            },
            ClientCommands::Tasks { command } => {
                let token = token.context("--token is required for task commands")?;
                match command {
                    TaskCommands::List {
                        id,
                        completed,
                        priority,
                        tag,
                    } => {
                        let filter = TaskFilter {
                            id,
                            is_completed: completed,
                            priority,
                            tags: (!tag.is_empty())
                                .then(|| tag.iter().map(|t| t.to_lowercase()).collect()),
                        };
                        let tasks = client::fetch_tasks(&url, &token, &filter).await?;
                        print_json(&tasks)?;
                    }
                    TaskCommands::Get { id } => {
                        match client::fetch_task(&url, &token, id).await {
                            Ok(task) => print_json(&task)?,
                            Err(client::TaskError::NotFound(id)) => {
                                eprintln!("Error: Task with id {} not found", id);
                                std::process::exit(1);
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    TaskCommands::Create {
                        name,
                        tag,
                        description,
                        priority,
                        subtasks,
                    } => {
                        let subtasks = subtasks
                            .iter()
                            .map(|raw| parse_subtask(raw))
                            .collect::<anyhow::Result<Vec<_>>>()?;
                        let task = client::create_task(
                            &url,
                            &token,
                            client::CreateTaskRequest {
                                name,
                                tag,
                                description,
                                priority: Some(priority),
                                start_time: None,
                                end_time: None,
                                subtasks,
                            },
                        )
                        .await?;
                        print_json(&task)?;
                    }
                    TaskCommands::Update {
                        id,
                        name,
                        tag,
                        description,
                        priority,
                        complete,
                        complete_subtasks,
                    } => {
                        let subtasks = (!complete_subtasks.is_empty()).then(|| {
                            complete_subtasks
                                .into_iter()
                                .map(|subtask_id| SubtaskRequest {
                                    id: Some(subtask_id),
                                    is_completed: Some(true),
                                    ..Default::default()
                                })
                                .collect()
                        });
                        let task = client::update_task(
                            &url,
                            &token,
                            id,
                            client::UpdateTaskRequest {
                                name,
                                tag,
                                description,
                                priority,
                                start_time: None,
                                end_time: None,
                                is_completed: complete.then_some(true),
                                subtasks,
                            },
                        )
                        .await?;
                        print_json(&task)?;
                    }
                    TaskCommands::Delete { id } => {
                        client::delete_task(&url, &token, id).await?;
                        println!("Deleted task {}", id);
                    }
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subtask_with_duration() {
        let subtask = parse_subtask("Read notes:45").unwrap();
        assert_eq!(subtask.name.as_deref(), Some("Read notes"));
        assert_eq!(subtask.duration, Some(45));
    }

    #[test]
    fn test_parse_subtask_without_duration() {
        let subtask = parse_subtask("Read notes").unwrap();
        assert_eq!(subtask.duration, None);
    }

    #[test]
    fn test_parse_subtask_rejects_bad_duration() {
        assert!(parse_subtask("Read notes:soon").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
