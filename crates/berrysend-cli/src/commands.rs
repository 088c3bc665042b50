use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::warn;

use berrysend_core::auth::Registration;
use berrysend_core::router::{Location, DEFAULT_AUTHENTICATED_PATH};
use berrysend_core::ClientContext;

pub const USAGE: &str = "\
Usage: berrysend <command>

Commands:
  login [email]      Sign in (password from BERRYSEND_PASSWORD or prompt)
  register           Create an account
  logout             Sign out and clear the stored session
  refresh            Refresh the access token
  whoami             Re-fetch and print the current user
  status             Print the session state as JSON
  navigate <path>    Run the route guards for <path>
  help               Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Register,
    Logout,
    Refresh,
    WhoAmI,
    Status,
    Navigate { path: String },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            None | Some("help") | Some("--help") | Some("-h") => Command::Help,
            Some("login") => Command::Login {
                email: args.next().map(str::to_string),
            },
            Some("register") => Command::Register,
            Some("logout") => Command::Logout,
            Some("refresh") => Command::Refresh,
            Some("whoami") => Command::WhoAmI,
            Some("status") => Command::Status,
            Some("navigate") => match args.next() {
                Some(path) => Command::Navigate {
                    path: path.to_string(),
                },
                None => bail!("navigate requires a path"),
            },
            Some(other) => bail!("Unknown command: {}", other),
        };
        if let Some(extra) = args.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    if let Ok(password) = std::env::var("BERRYSEND_PASSWORD") {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

/// After signing in, go to the page authenticated users start on
async fn enter_landing_page(ctx: &ClientContext) -> Result<Location> {
    Ok(ctx.router.push(DEFAULT_AUTHENTICATED_PATH).await?)
}

pub async fn run(ctx: &ClientContext, command: Command) -> Result<()> {
    let session = &ctx.session;

    match command {
        Command::Help => println!("{}", USAGE),

        Command::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email")?,
            };
            let password = prompt_password()?;
            if email.is_empty() || password.is_empty() {
                bail!("Email and password required");
            }

            let outcome = session.login(&email, &password).await?;
            println!("Signed in as {}", outcome.principal.display_name());

            let landed = enter_landing_page(ctx).await?;
            println!("Now at {} ({})", landed, ctx.router.title());
        }

        Command::Register => {
            let registration = Registration {
                name: prompt("Full name")?,
                email: prompt("Email")?,
                password: prompt_password()?,
            };

            let candidate = berrysend_core::auth::Principal::new(None, &registration.email, &registration.name);
            let validation = candidate.validate();
            if !validation.is_valid() {
                bail!(validation.errors.join("; "));
            }

            let outcome = session.register(&registration).await?;
            if outcome.token.is_some() {
                println!("Registered and signed in as {}", outcome.principal.display_name());
            } else {
                println!(
                    "Registered {}. Run `berrysend login {}` to sign in.",
                    outcome.principal.display_name(),
                    outcome.principal.email
                );
            }
        }

        Command::Logout => {
            session.logout().await;
            println!("Signed out");
        }

        Command::Refresh => {
            let token = session.refresh_token().await?;
            println!("Token refreshed (type {})", token.token_type);
        }

        Command::WhoAmI => {
            if !session.check_and_enforce_expiry().await {
                bail!("Not signed in");
            }
            let principal = session.fetch_current_user().await?;
            println!("{}", serde_json::to_string_pretty(&principal)?);
        }

        Command::Status => {
            session.check_and_enforce_expiry().await;
            let token = session.token();
            let status = serde_json::json!({
                "state": format!("{:?}", session.state()),
                "authenticated": session.is_authenticated(),
                "role": session.user_role(),
                "user": session.principal(),
                "tokenType": token.as_ref().map(|t| t.token_type.clone()),
                "expiresAt": token.as_ref().and_then(|t| t.expiration_date()),
                "remainingMillis": token.as_ref().map(|t| t.remaining_millis()),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Navigate { path } => {
            let landed = ctx.router.push(&path).await?;
            if landed.path != Location::parse(&path).path {
                warn!(requested = %path, landed = %landed, "Navigation redirected");
            }
            println!("{}\t{}", landed, ctx.router.title());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use berrysend_core::config::EnvironmentConfig;
    use berrysend_core::StorageBackend;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Help);
        assert_eq!(
            Command::parse(&args(&["login", "ops@berrysend.com"])).unwrap(),
            Command::Login {
                email: Some("ops@berrysend.com".to_string())
            }
        );
        assert_eq!(Command::parse(&args(&["login"])).unwrap(), Command::Login { email: None });
        assert_eq!(
            Command::parse(&args(&["navigate", "/management"])).unwrap(),
            Command::Navigate {
                path: "/management".to_string()
            }
        );
        assert_eq!(Command::parse(&args(&["status"])).unwrap(), Command::Status);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(&args(&["navigate"])).is_err());
        assert!(Command::parse(&args(&["launch"])).is_err());
        assert!(Command::parse(&args(&["logout", "now"])).is_err());
    }

    #[tokio::test]
    async fn test_navigate_signed_out_lands_on_login() {
        let ctx = ClientContext::build(EnvironmentConfig::default(), StorageBackend::Memory).unwrap();

        run(&ctx, Command::Navigate { path: "/management".to_string() })
            .await
            .unwrap();

        let current = ctx.router.current();
        assert_eq!(current.path, "/login");
        assert_eq!(current.query_value("redirect"), Some("/management"));
        assert_eq!(ctx.router.title(), "Login - BerrySend");
    }

    #[tokio::test]
    async fn test_landing_page_after_sign_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().join("berrysend");
        std::fs::create_dir_all(&data_dir).unwrap();
        let token = serde_json::json!({
            "accessToken": "opaque-access",
            "refreshToken": "opaque-refresh",
            "expiresIn": 3600,
            "tokenType": "Bearer",
        });
        std::fs::write(data_dir.join("berrysend_token.json"), token.to_string()).unwrap();

        let mut config = EnvironmentConfig::default();
        config.data_dir = Some(data_dir);
        let ctx = ClientContext::build(config, StorageBackend::File).unwrap();
        assert!(ctx.session.is_authenticated());

        let landed = enter_landing_page(&ctx).await.unwrap();

        assert_eq!(landed.path, "/management");
        assert_eq!(ctx.router.title(), "Port Management - BerrySend");
    }
}
