//! Contract Desk command-line tool
//!
//! ```bash
//! desk migrate
//! desk createuser anna --superuser
//! desk grant boris contract.view_contract contract.change_letter
//! desk runserver 0.0.0.0:8000
//! ```

mod commands;

use clap::{Parser, Subcommand};
use desk_conf::Settings;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "desk")]
#[command(about = "Contract Desk administration utility", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Settings file (defaults to desk.toml)
	#[arg(short, long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbosity level (can be repeated)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Serve the desk over HTTP until Ctrl+C
	Runserver {
		/// Address to bind, overriding the settings
		#[arg(value_name = "ADDR")]
		addr: Option<String>,
	},

	/// Create missing tables
	Migrate,

	/// Create a user account
	Createuser {
		#[arg(value_name = "USERNAME")]
		username: String,

		/// Password; read from standard input when omitted
		#[arg(long, env = "DESK_PASSWORD", hide_env_values = true)]
		password: Option<String>,

		/// Grant every permission
		#[arg(long)]
		superuser: bool,
	},

	/// Change the password of a user
	Changepassword {
		#[arg(value_name = "USERNAME")]
		username: String,

		#[arg(long, env = "DESK_PASSWORD", hide_env_values = true)]
		password: Option<String>,
	},

	/// Grant permissions such as `contract.view_contract`
	Grant {
		/// User name, or group name with --group
		#[arg(value_name = "NAME")]
		name: String,

		#[arg(value_name = "PERMISSION", required = true)]
		permissions: Vec<String>,

		/// Grant to a group instead of a user
		#[arg(long)]
		group: bool,
	},

	/// Put a user into a group
	Addtogroup {
		#[arg(value_name = "USERNAME")]
		username: String,

		#[arg(value_name = "GROUP")]
		group: String,
	},

	/// Allow a user to sign in again
	Activate {
		#[arg(value_name = "USERNAME")]
		username: String,
	},

	/// Refuse sign-in for a user
	Deactivate {
		#[arg(value_name = "USERNAME")]
		username: String,
	},
}

fn settings(cli: &Cli) -> anyhow::Result<Settings> {
	let mut settings = Settings::load(cli.config.as_deref())?;
	match cli.verbosity {
		0 => {}
		1 => settings.log_level = "debug".to_string(),
		_ => settings.log_level = "trace".to_string(),
	}
	Ok(settings)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let mut settings = settings(&cli)?;
	desk_conf::logging::init(&settings);

	match cli.command {
		Commands::Runserver { addr } => {
			if let Some(addr) = addr {
				settings.bind = addr;
				settings.validate()?;
			}
			commands::runserver(&settings).await
		}
		Commands::Migrate => commands::migrate(&settings).await,
		Commands::Createuser {
			username,
			password,
			superuser,
		} => {
			let password = commands::password_or_prompt(password)?;
			commands::createuser(&settings, &username, &password, superuser).await
		}
		Commands::Changepassword { username, password } => {
			let password = commands::password_or_prompt(password)?;
			commands::changepassword(&settings, &username, &password).await
		}
		Commands::Grant {
			name,
			permissions,
			group,
		} => commands::grant(&settings, &name, &permissions, group).await,
		Commands::Addtogroup { username, group } => commands::addtogroup(&settings, &username, &group).await,
		Commands::Activate { username } => commands::set_active(&settings, &username, true).await,
		Commands::Deactivate { username } => commands::set_active(&settings, &username, false).await,
	}
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	if let Err(e) = run(cli).await {
		eprintln!("Error: {:#}", e);
		process::exit(1);
	}
}
