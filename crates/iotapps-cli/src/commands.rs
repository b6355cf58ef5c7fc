use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::warn;

use iotapps_core::auth::{LoginByKeyOutcome, TimerStatus};
use iotapps_core::models::NarrativesQuery;
use iotapps_core::{AppApi, Config};

/// Narratives shown by the `narratives` command
const NARRATIVES_ROW_COUNT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    Passcode { username: String },
    LoginKey { api_key: String },
    Status,
    Refresh,
    Logout { all: bool },
    Narratives { location_id: i64 },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            Some("login") => Command::Login {
                username: args.next().map(str::to_string),
            },
            Some("passcode") => Command::Passcode {
                username: args.next().context("passcode needs a username")?.to_string(),
            },
            Some("login-key") => Command::LoginKey {
                api_key: args.next().context("login-key needs an API key")?.to_string(),
            },
            Some("status") | None => Command::Status,
            Some("refresh") => Command::Refresh,
            Some("logout") => match args.next() {
                None => Command::Logout { all: false },
                Some("--all") => Command::Logout { all: true },
                Some(other) => bail!("Unknown logout option: {}", other),
            },
            Some("narratives") => {
                let raw = args.next().context("narratives needs a location id")?;
                Command::Narratives {
                    location_id: raw
                        .parse()
                        .with_context(|| format!("Invalid location id: {}", raw))?,
                }
            }
            Some(other) => bail!("Unknown command: {}", other),
        };

        if let Some(extra) = args.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

pub async fn run(app: &AppApi, mut config: Config, command: Command) -> Result<()> {
    let auth = app.auth();
    auth.on_need_relogin()
        .on(|| eprintln!("Session expired - please log in again."));

    match command {
        Command::Login { username } => {
            let username = match username.or_else(|| config.last_username.clone()) {
                Some(username) => username,
                None => prompt("Username: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            auth.login(&username, &password, false).await?;
            remember_username(&mut config, &username);
            println!("Logged in as {}.", username);
            print_status(app);
        }
        Command::Passcode { username } => {
            auth.send_passcode(&username, false, config.brand.as_deref())
                .await?;
            let passcode = prompt("Passcode: ")?;

            auth.login_by_passcode(&username, &passcode, false).await?;
            remember_username(&mut config, &username);
            println!("Logged in as {}.", username);
            print_status(app);
        }
        Command::LoginKey { api_key } => match auth.login_by_key(&api_key, false).await {
            LoginByKeyOutcome::LoggedIn(_) => {
                println!("Logged in by API key.");
                print_status(app);
            }
            LoginByKeyOutcome::Failed(e) => bail!("Login by key failed: {}", e),
        },
        Command::Status => print_status(app),
        Command::Refresh => {
            auth.refresh_token().await?;
            println!("API key refreshed.");
            print_status(app);
        }
        Command::Logout { all: true } => {
            auth.logout_global().await?;
            println!("Logged out from all clients.");
        }
        Command::Logout { all: false } => {
            auth.logout_local();
            println!("Logged out.");
        }
        Command::Narratives { location_id } => {
            if !auth.is_authenticated() {
                bail!("Not logged in - run `iotapps login` first");
            }
            let query = NarrativesQuery {
                row_count: Some(NARRATIVES_ROW_COUNT),
                ..Default::default()
            };
            let response = app.locations().narratives(location_id, &query).await?;
            if response.narratives.is_empty() {
                println!("No narratives.");
            }
            for narrative in &response.narratives {
                let when = narrative
                    .timestamp()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {}", when, narrative.display_title());
            }
        }
    }

    Ok(())
}

fn remember_username(config: &mut Config, username: &str) {
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn print_status(app: &AppApi) {
    let session = app.auth().session();
    let Some(key) = session.token() else {
        println!("Not logged in.");
        return;
    };

    println!("Server:   {}", app.client().server_url());
    if let Some(username) = session.last_username() {
        println!("User:     {}", username);
    }
    println!("API key:  {}", mask(key));
    match session.expires_at() {
        Some(expires_at) => println!(
            "Expires:  {} ({} min left)",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.minutes_until_expiry(Utc::now()).unwrap_or(0)
        ),
        None => println!("Expires:  unknown"),
    }
    if let TimerStatus::Armed { fires_at } = app.auth().expiry_timer() {
        println!("Refresh:  {}", fires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}

/// Show only the start of a key
fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}…", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Status);
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Command::Login { username: None }
        );
        assert_eq!(
            Command::parse(&args(&["login", "alice"])).unwrap(),
            Command::Login { username: Some("alice".to_string()) }
        );
        assert_eq!(
            Command::parse(&args(&["logout", "--all"])).unwrap(),
            Command::Logout { all: true }
        );
        assert_eq!(
            Command::parse(&args(&["narratives", "123"])).unwrap(),
            Command::Narratives { location_id: 123 }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args(&["passcode"])).is_err());
        assert!(Command::parse(&args(&["narratives", "abc"])).is_err());
        assert!(Command::parse(&args(&["logout", "--everywhere"])).is_err());
        assert!(Command::parse(&args(&["status", "extra"])).is_err());
        assert!(Command::parse(&args(&["frobnicate"])).is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("abcdefgh"), "abcd…");
        assert_eq!(mask("ab"), "ab…");
    }
}
