//! odo Explorer CLI - Browse and change odo-managed cluster resources
//!
//! A command-line front end over the explorer engine: shows the
//! project/application/component tree and runs create, delete and link
//! operations, waiting until the cluster reflects them.

mod commands;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Overrides;

#[derive(Parser)]
#[command(name = "odo-explorer")]
#[command(author, version, about = "Browse and change odo-managed cluster resources")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Path to the odo binary
    #[arg(long, global = true, env = "ODO_EXPLORER_ODO")]
    odo: Option<std::path::PathBuf>,

    /// Cluster server URL shown at the root of the tree
    #[arg(long, global = true, env = "ODO_EXPLORER_SERVER")]
    server: Option<String>,

    /// Seconds to wait for a change to show up in the cluster
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the odo version
    Version,

    /// Show the resource tree
    Tree {
        /// Levels to expand below the cluster
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Browse the component and service catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage applications
    App {
        #[command(subcommand)]
        action: AppAction,
    },

    /// Manage components
    Component {
        #[command(subcommand)]
        action: ComponentAction,
    },

    /// Manage storage of a component
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },

    /// Manage URLs of a component
    Url {
        #[command(subcommand)]
        action: UrlAction,
    },

    /// Manage services
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Link a component to another component or a service
    Link {
        #[command(flatten)]
        scope: ComponentScope,

        /// Name of the component or service to link to
        target: String,

        /// The target is a service
        #[arg(long)]
        service: bool,
    },

    /// Show current configuration
    Config,
}

#[derive(Args, Clone)]
pub struct AppScope {
    /// Project name
    #[arg(long)]
    project: String,

    /// Application name
    #[arg(long)]
    app: String,
}

#[derive(Args, Clone)]
pub struct ComponentScope {
    #[command(flatten)]
    app: AppScope,

    /// Component name
    #[arg(long)]
    component: String,
}

#[derive(Args, Clone, Copy)]
pub struct Confirm {
    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List component types and their versions
    Components,
    /// List service templates and their plans
    Services,
    /// Describe a service template
    Describe { service: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    #[command(alias = "ls")]
    List,
    Create {
        name: String,
    },
    #[command(alias = "rm")]
    Delete {
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Subcommand)]
enum AppAction {
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        project: String,
    },
    Create {
        #[arg(long)]
        project: String,
        name: String,
    },
    #[command(alias = "rm")]
    Delete {
        #[arg(long)]
        project: String,
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
    Describe {
        #[arg(long)]
        project: String,
        name: String,
    },
}

#[derive(Subcommand)]
enum ComponentAction {
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        scope: AppScope,
    },
    Create {
        #[command(flatten)]
        scope: AppScope,
        name: String,
        /// Component type, optionally with a version: `nodejs:8`
        #[arg(long = "type")]
        component_type: String,
        /// Git repository URL
        #[arg(long, group = "source")]
        git: Option<String>,
        /// Path to a binary (Java only)
        #[arg(long, group = "source")]
        binary: Option<String>,
        /// Local source directory
        #[arg(long, group = "source")]
        local: Option<String>,
    },
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        scope: AppScope,
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
    Describe {
        #[command(flatten)]
        scope: ComponentScope,
    },
    Log {
        #[command(flatten)]
        scope: ComponentScope,
        /// Keep streaming new log lines
        #[arg(short, long)]
        follow: bool,
    },
    Push {
        #[command(flatten)]
        scope: ComponentScope,
    },
    Watch {
        #[command(flatten)]
        scope: ComponentScope,
    },
}

#[derive(Subcommand)]
enum StorageAction {
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        scope: ComponentScope,
    },
    Create {
        #[command(flatten)]
        scope: ComponentScope,
        name: String,
        /// Mount path inside the container
        #[arg(long)]
        path: String,
        /// Size in GiB
        #[arg(long, default_value = "1")]
        size: u32,
    },
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        scope: ComponentScope,
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Subcommand)]
enum UrlAction {
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        scope: ComponentScope,
    },
    Create {
        #[command(flatten)]
        scope: ComponentScope,
        name: String,
        /// Port to expose
        #[arg(long)]
        port: Option<u16>,
    },
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        scope: ComponentScope,
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Subcommand)]
enum ServiceAction {
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        scope: AppScope,
    },
    Create {
        #[command(flatten)]
        scope: AppScope,
        name: String,
        /// Service template from the catalog
        #[arg(long)]
        template: String,
        /// Plan of the template
        #[arg(long, default_value = "default")]
        plan: String,
    },
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        scope: AppScope,
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let overrides = Overrides {
        odo_path: cli.odo,
        server_url: cli.server,
        timeout_secs: cli.timeout,
    };

    let command = match cli.command {
        Commands::Config => return commands::config::show(&overrides, json).await,
        command => command,
    };

    let ctx = commands::Context::open(overrides).await?;

    match command {
        Commands::Version => commands::catalog::version(&ctx, json).await?,
        Commands::Tree { depth } => commands::tree::show(&ctx, depth, json).await?,
        Commands::Catalog { action } => match action {
            CatalogAction::Components => commands::catalog::components(&ctx, json).await?,
            CatalogAction::Services => commands::catalog::services(&ctx, json).await?,
            CatalogAction::Describe { service } => {
                commands::catalog::describe_service(&ctx, &service).await?
            }
        },
        Commands::Project { action } => match action {
            ProjectAction::List => commands::resources::list_projects(&ctx, json).await?,
            ProjectAction::Create { name } => {
                commands::resources::create_project(&ctx, &name, json).await?
            }
            ProjectAction::Delete { name, confirm } => {
                commands::resources::delete_project(&ctx, &name, confirm.yes, json).await?
            }
        },
        Commands::App { action } => match action {
            AppAction::List { project } => {
                commands::resources::list_applications(&ctx, &project, json).await?
            }
            AppAction::Create { project, name } => {
                commands::resources::create_application(&ctx, &project, &name, json).await?
            }
            AppAction::Delete {
                project,
                name,
                confirm,
            } => {
                commands::resources::delete_application(&ctx, &project, &name, confirm.yes, json)
                    .await?
            }
            AppAction::Describe { project, name } => {
                commands::component::describe_application(&ctx, &project, &name).await?
            }
        },
        Commands::Component { action } => match action {
            ComponentAction::List { scope } => {
                commands::resources::list_components(&ctx, &scope, json).await?
            }
            ComponentAction::Create {
                scope,
                name,
                component_type,
                git,
                binary,
                local,
            } => {
                let source = commands::resources::source_from_flags(git, binary, local);
                commands::resources::create_component(
                    &ctx,
                    &scope,
                    &name,
                    &component_type,
                    source,
                    json,
                )
                .await?
            }
            ComponentAction::Delete {
                scope,
                name,
                confirm,
            } => {
                commands::resources::delete_component(&ctx, &scope, &name, confirm.yes, json)
                    .await?
            }
            ComponentAction::Describe { scope } => {
                commands::component::describe(&ctx, &scope).await?
            }
            ComponentAction::Log { scope, follow } => {
                commands::component::log(&ctx, &scope, follow).await?
            }
            ComponentAction::Push { scope } => commands::component::push(&ctx, &scope).await?,
            ComponentAction::Watch { scope } => commands::component::watch(&ctx, &scope).await?,
        },
        Commands::Storage { action } => match action {
            StorageAction::List { scope } => {
                commands::resources::list_component_children(
                    &ctx,
                    &scope,
                    odo_explorer_core::NodeKind::Storage,
                    json,
                )
                .await?
            }
            StorageAction::Create {
                scope,
                name,
                path,
                size,
            } => {
                commands::resources::create_storage(&ctx, &scope, &name, &path, size, json).await?
            }
            StorageAction::Delete {
                scope,
                name,
                confirm,
            } => {
                commands::resources::delete_component_child(
                    &ctx,
                    &scope,
                    odo_explorer_core::NodeKind::Storage,
                    &name,
                    confirm.yes,
                    json,
                )
                .await?
            }
        },
        Commands::Url { action } => match action {
            UrlAction::List { scope } => {
                commands::resources::list_component_children(
                    &ctx,
                    &scope,
                    odo_explorer_core::NodeKind::Url,
                    json,
                )
                .await?
            }
            UrlAction::Create { scope, name, port } => {
                commands::resources::create_url(&ctx, &scope, &name, port, json).await?
            }
            UrlAction::Delete {
                scope,
                name,
                confirm,
            } => {
                commands::resources::delete_component_child(
                    &ctx,
                    &scope,
                    odo_explorer_core::NodeKind::Url,
                    &name,
                    confirm.yes,
                    json,
                )
                .await?
            }
        },
        Commands::Service { action } => match action {
            ServiceAction::List { scope } => {
                commands::resources::list_services(&ctx, &scope, json).await?
            }
            ServiceAction::Create {
                scope,
                name,
                template,
                plan,
            } => {
                commands::resources::create_service(&ctx, &scope, &name, &template, &plan, json)
                    .await?
            }
            ServiceAction::Delete {
                scope,
                name,
                confirm,
            } => {
                commands::resources::delete_service(&ctx, &scope, &name, confirm.yes, json)
                    .await?
            }
        },
        Commands::Link {
            scope,
            target,
            service,
        } => commands::component::link(&ctx, &scope, &target, service, json).await?,
        Commands::Config => {}
    }

    Ok(())
}
