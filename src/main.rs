//! Injector CLI
//!
//! Entry point for the `injectord` service.

use clap::{Parser, Subcommand};
use injector::config::ConfigOverrides;
use injector::engine::{Engine, EngineSettings};
use injector::transport::{order_by_precedence, EventSink};
use injector::{
    logging, parse_line, ClientHandle, Command, Config, HeadlessPlugin, ResourceLocator, Server,
    Ui,
};
use injector_logminer::{LogMiner, Mined};
use injector_protocol::magic_for_port;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "injectord")]
#[command(about = "Live code injection service", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the injection service and read commands from stdin
    Serve {
        /// Path to config file (default: ~/.config/injector/injector.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Listening port
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Xcode installation
        #[arg(long)]
        xcode: Option<PathBuf>,

        /// Resources directory
        #[arg(long)]
        resources: Option<PathBuf>,

        /// Workspace or project document to select at startup
        #[arg(long, short = 'w')]
        workspace: Option<String>,

        /// Build-activity log directory for the workspace
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Find the compile command for a source file in the build logs
    FindCommand {
        /// Source path, or bare file name
        file: String,

        /// Architecture the command must target
        #[arg(long, short = 'a')]
        arch: String,

        /// Directory of archived build-activity logs
        #[arg(long)]
        log_dir: PathBuf,

        /// Project directory bare file names are resolved against
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the advertised server addresses in precedence order
    Addresses {
        /// Path to config file (default: ~/.config/injector/injector.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Commands::Serve {
            config,
            port,
            xcode,
            resources,
            workspace,
            log_dir,
        } => {
            let overrides = ConfigOverrides {
                port,
                xcode_path: xcode,
                resources_dir: resources,
            };
            run_serve(config.as_deref(), &overrides, workspace, log_dir);
        }
        Commands::FindCommand {
            file,
            arch,
            log_dir,
            project_root,
            json,
        } => {
            run_find_command(&file, &arch, log_dir, project_root, json);
        }
        Commands::Addresses { config, json } => {
            run_addresses(config.as_deref(), json);
        }
    }
}

fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Config {
    let mut config = match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };
    config.apply(overrides);
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(1);
    }
    config
}

fn run_serve(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    workspace: Option<String>,
    log_dir: Option<PathBuf>,
) {
    let config = load_config(config_path, overrides);
    let (ui, ui_events) = Ui::channel(config.preferences, config.parameters.clone());
    let client = ClientHandle::new(magic_for_port(config.port));
    let (commands, queue) = mpsc::channel::<Command>();

    let sink = commands.clone();
    let events: EventSink = Arc::new(move |event| {
        // orchestrator gone means shutdown is under way
        let _ = sink.send(Command::Server(event));
    });

    let server = match Server::listen(
        &config.listen_address(),
        client.clone(),
        ui.clone(),
        events,
        Duration::from_millis(config.accept_backoff_ms),
    ) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "could not start service");
            process::exit(1);
        }
    };
    if let Err(e) = server.spawn() {
        error!(error = %e, "could not start accept loop");
        process::exit(1);
    }

    spawn_keep_alive(client.clone(), Duration::from_secs(config.keepalive_seconds));
    let console = thread::Builder::new()
        .name("injector-console".to_string())
        .spawn(move || injector::ui::run_console(ui_events));
    if let Err(e) = console {
        warn!(error = %e, "could not start console");
    }

    let shutdown = commands.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown.send(Command::Shutdown);
    }) {
        warn!(error = %e, "could not install interrupt handler");
    }

    if let Some(path) = workspace {
        let is_alt_ide = path.ends_with("idea/misc.xml");
        let _ = commands.send(Command::Workspace {
            path,
            log_directory: log_dir,
            is_alt_ide,
        });
    }

    spawn_stdin_reader(commands);

    let plugin = Arc::new(HeadlessPlugin::new(config.resources_dir.join("loader")));
    let resources = ResourceLocator::new(config.resources_dir.clone());
    let mut engine = Engine::new(EngineSettings::from_config(&config), ui, client, plugin, resources);
    engine.run(queue);
}

fn spawn_keep_alive(client: ClientHandle, interval: Duration) {
    let spawned = thread::Builder::new()
        .name("injector-keepalive".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            if let Err(e) = client.keep_alive() {
                debug!(error = %e, "keep-alive failed");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not start keep-alive");
    }
}

fn spawn_stdin_reader(commands: Sender<Command>) {
    let spawned = thread::Builder::new()
        .name("injector-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(Some(command)) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
            info!("stdin closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not start command reader");
    }
}

fn run_find_command(
    file: &str,
    arch: &str,
    log_dir: PathBuf,
    project_root: Option<PathBuf>,
    json_output: bool,
) {
    let project_root = project_root
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"));
    let miner = LogMiner::new(Some(log_dir), project_root);

    let mined = match miner.find_compile_command(file, arch) {
        Ok(mined) => mined,
        Err(e) => {
            eprintln!("{}", e);
            if let Some(detail) = e.detail() {
                eprintln!("{}", detail);
            }
            process::exit(1);
        }
    };

    let command = mined.command();
    if json_output {
        let nib_directory = match mined {
            Mined::Nib {
                ref compilation_directory,
                ..
            } => compilation_directory.clone(),
            _ => None,
        };
        let output = serde_json::json!({
            "command": command.command,
            "working_directory": command.working_directory,
            "resolved_source": mined.resolved_source(),
            "nib_directory": nib_directory,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        if let Some(source) = mined.resolved_source() {
            println!("# source: {}", source.display());
        }
        println!("{}", command.shell_line());
    }
}

fn run_addresses(config_path: Option<&Path>, json_output: bool) {
    let config = load_config(config_path, &ConfigOverrides::default());
    let addresses = order_by_precedence(&config.server_addresses);

    if json_output {
        match serde_json::to_string_pretty(&addresses) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else if addresses.is_empty() {
        println!("No server addresses configured.");
    } else {
        for address in addresses {
            println!("{}", address);
        }
    }
}
