//! macad - Active Directory workstation helper for macOS
//!
//! Thin CLI over the library. Every subcommand runs one operation (or one
//! composed flow) and exits; passwords are only ever read from stdin.
//!
//! Exit status: 0 on a positive answer, 1 on a negative one (not bound,
//! nothing stored, renewal failed, ...), and 2-7 for errors, one code per
//! error kind. 64 means the command line did not give enough to act on.

use clap::{Parser, Subcommand};
use macad::core::{CredentialStore, Workstation};
use macad::models::{PasswordCheck, Principal, SecureString};
use macad::platform::{Keychain, ProcessRunner};
use macad::utils::{AdError, ConfigError};
use macad::{logger, Settings, Tools};
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// macad - Active Directory binding, principals and Kerberos tickets
#[derive(Parser, Debug)]
#[command(name = "macad")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error); overrides MACAD_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Directory ===
    /// Is this Mac bound to Active Directory?
    Bound,

    /// Binding snapshot: domain, search nodes, realms
    Status,

    /// DNS name of the joined domain
    Domain,

    /// Directory search policy
    Nodes,

    /// Default Kerberos realms
    Realms,

    /// Does the domain publish an LDAP SRV record?
    Reachable {
        /// Domain to check (default: the joined domain)
        domain: Option<String>,
    },

    /// User logged in at the console
    ConsoleUser,

    /// Network home share of a user as an smb:// URL
    SmbHome {
        /// Short user name (default: console user)
        user: Option<String>,

        /// Directory node to read (default: the Active Directory node)
        #[arg(long)]
        node: Option<String>,
    },

    // === Principals ===
    /// Kerberos principal of a local user
    Principal {
        /// Short user name (default: console user)
        user: Option<String>,

        /// Read the default principal of the ticket cache instead
        #[arg(long)]
        from_ticket: bool,
    },

    // === Keychain ===
    /// Stored domain passwords
    #[command(subcommand)]
    Keychain(KeychainCommands),

    // === Tickets ===
    /// Check a password (read from stdin) without storing it
    TestPassword {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    /// Get a ticket using the stored password
    Kinit {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    /// Renew the current ticket
    Renew,

    /// Current ticket and its lifecycle phase
    Ticket,

    /// Renew, or re-acquire from the keychain, without prompting
    Refresh {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    /// Check a password (read from stdin) and store it when accepted
    Login {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    // === Directory search ===
    /// Groups a principal belongs to
    Groups {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeychainCommands {
    /// Is a password stored?
    Check {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    /// Store a password read from stdin (no KDC check)
    Save {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },

    /// Remove the stored password
    Delete {
        /// user@REALM (default: console user in the first realm)
        principal: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Ad(#[from] AdError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Usage(String),

    #[error("failed to read password from stdin: {0}")]
    Stdin(#[source] io::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Ad(AdError::NotBound { .. }) => 2,
            CliError::Ad(AdError::DomainUnreachable { .. }) => 3,
            CliError::Ad(AdError::MalformedPrincipal { .. }) => 4,
            CliError::Ad(AdError::ProcessFailure { .. }) => 5,
            CliError::Ad(AdError::CredentialStoreFailure { .. }) => 6,
            CliError::Config(_) => 7,
            CliError::Usage(_) | CliError::Stdin(_) => 64,
        }
    }
}

/// Whether the command's answer was positive
type Answer = Result<bool, CliError>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.log_level.as_deref());

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("macad: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Answer {
    let settings = Arc::new(Settings::load(cli.config.as_deref())?);
    debug!(?settings, "settings loaded");

    let runner = Arc::new(ProcessRunner::new(settings.command_timeout()));
    let tools = Tools::new(runner, settings);
    let store = Arc::new(Keychain::new(tools.clone()));
    let ws = Workstation::new(tools, store);
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Bound => {
            let bound = ws.directory.is_bound().await?;
            out.print(&bound, if bound { "bound" } else { "not bound" });
            Ok(bound)
        }
        Commands::Status => {
            let status = ws.directory.status().await?;
            let mut text = format!("bound: {}", status.bound);
            if let Some(domain) = &status.domain {
                text.push_str(&format!("\ndomain: {}", domain));
            }
            if let Some(nodes) = &status.search_nodes {
                text.push_str(&format!("\nsearch nodes: {}", nodes.join(", ")));
            }
            if let Some(realms) = &status.realms {
                let realms: Vec<&str> = realms.iter().map(String::as_str).collect();
                text.push_str(&format!("\nrealms: {}", realms.join(", ")));
            }
            out.print(&status, &text);
            Ok(status.bound)
        }
        Commands::Domain => Ok(out.optional(&ws.directory.current_domain().await?)),
        Commands::Nodes => {
            let nodes = ws.directory.search_nodes().await?;
            let text = nodes.as_ref().map(|n| n.join("\n")).unwrap_or_default();
            out.print(&nodes, &text);
            Ok(nodes.is_some())
        }
        Commands::Realms => {
            let realms = ws.directory.realms().await?;
            let text = realms
                .as_ref()
                .map(|r| r.iter().cloned().collect::<Vec<_>>().join("\n"))
                .unwrap_or_default();
            out.print(&realms, &text);
            Ok(realms.is_some())
        }
        Commands::Reachable { domain } => {
            let reachable = ws.directory.accessible(domain.as_deref()).await?;
            out.print(&reachable, if reachable { "reachable" } else { "unreachable" });
            Ok(reachable)
        }
        Commands::ConsoleUser => Ok(out.optional(&ws.directory.console_user().await?)),
        Commands::SmbHome { user, node } => {
            let user = user_or_console(&ws, user).await?;
            let node = match node {
                Some(node) => node,
                None => ws.directory.ad_node().await?.ok_or_else(|| {
                    CliError::Usage("no Active Directory search node; pass --node".to_string())
                })?,
            };
            let url = ws.directory.smb_home(&user, &node).await?;
            out.print(&url, &url);
            Ok(!url.is_empty())
        }
        Commands::Principal { user, from_ticket } => {
            let principal = if from_ticket {
                ws.resolver.resolve_from_ticket_cache().await
            } else {
                let user = user_or_console(&ws, user).await?;
                ws.resolver.resolve_principal(&user).await?
            };
            Ok(out.optional(&principal))
        }
        Commands::Keychain(KeychainCommands::Check { principal }) => {
            let principal = target(&ws, principal).await?;
            let found = ws.store.find(&principal).await;
            out.print(&found, if found { "stored" } else { "not stored" });
            Ok(found)
        }
        Commands::Keychain(KeychainCommands::Save { principal }) => {
            let principal = target(&ws, principal).await?;
            let password = read_password(&principal)?;
            ws.store.save(&principal, &password).await?;
            out.print(&true, "saved");
            Ok(true)
        }
        Commands::Keychain(KeychainCommands::Delete { principal }) => {
            let principal = target(&ws, principal).await?;
            ws.store.delete(&principal).await?;
            out.print(&true, "deleted");
            Ok(true)
        }
        Commands::TestPassword { principal } => {
            let principal = target(&ws, principal).await?;
            let password = read_password(&principal)?;
            let check = ws.tickets.test_password(&principal, &password).await?;
            out.password_check(&check)
        }
        Commands::Kinit { principal } => {
            let principal = target(&ws, principal).await?;
            let acquired = ws.tickets.acquire_via_store(&principal).await;
            out.print(&acquired, if acquired { "ticket acquired" } else { "no ticket acquired" });
            Ok(acquired)
        }
        Commands::Renew => {
            let renewed = ws.tickets.renew().await;
            out.print(&renewed, if renewed { "renewed" } else { "renewal failed" });
            Ok(renewed)
        }
        Commands::Ticket => {
            let state = ws.tickets.ticket_state().await?;
            let phase = ws.tickets.current_phase().await?;
            let text = match &state {
                Some(state) => {
                    let expires = state
                        .expires_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string());
                    format!(
                        "principal: {}\nphase: {}\nexpires: {}\nrenewable: {}",
                        state.principal, phase, expires, state.renewable
                    )
                }
                None => format!("phase: {}", phase),
            };
            out.print(&TicketReport { phase, ticket: state.as_ref() }, &text);
            Ok(state.map(|s| s.valid).unwrap_or(false))
        }
        Commands::Refresh { principal } => {
            let principal = target(&ws, principal).await?;
            let outcome = ws.refresh(&principal).await?;
            let text = match outcome {
                macad::RefreshOutcome::Renewed => "renewed",
                macad::RefreshOutcome::Acquired => "acquired",
                macad::RefreshOutcome::NeedsPassword => "password needed",
            };
            out.print(&outcome, text);
            Ok(outcome != macad::RefreshOutcome::NeedsPassword)
        }
        Commands::Login { principal } => {
            let principal = target(&ws, principal).await?;
            let password = read_password(&principal)?;
            let check = ws.login(&principal, &password).await?;
            out.password_check(&check)
        }
        Commands::Groups { principal } => {
            let principal = target(&ws, principal).await?;
            let groups = ws.groups.membership(&principal.to_string()).await?;
            let text = groups
                .as_ref()
                .map(|g| g.iter().cloned().collect::<Vec<_>>().join("\n"))
                .unwrap_or_default();
            out.print(&groups, &text);
            Ok(groups.is_some())
        }
    }
}

#[derive(Serialize)]
struct TicketReport<'a> {
    phase: macad::TicketPhase,
    ticket: Option<&'a macad::TicketState>,
}

struct Output {
    json: bool,
}

impl Output {
    fn print<T: Serialize + ?Sized>(&self, value: &T, text: &str) {
        if !self.json {
            if !text.is_empty() {
                println!("{}", text);
            }
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{}", rendered),
            Err(err) => eprintln!("macad: cannot render JSON: {}", err),
        }
    }

    /// Print an optional value; `true` when present
    fn optional<T: Serialize + std::fmt::Display>(&self, value: &Option<T>) -> bool {
        let text = value.as_ref().map(|v| v.to_string()).unwrap_or_default();
        self.print(value, &text);
        value.is_some()
    }

    fn password_check(&self, check: &PasswordCheck) -> Answer {
        let text = match check {
            PasswordCheck::Success => "password accepted".to_string(),
            PasswordCheck::IncorrectPassword => "password incorrect".to_string(),
            PasswordCheck::Unknown(raw) => format!("unknown result: {}", raw),
        };
        self.print(check, &text);
        Ok(*check == PasswordCheck::Success)
    }
}

/// Explicit principal, or the console user in the first realm
async fn target(ws: &Workstation, principal: Option<String>) -> Result<Principal, CliError> {
    match principal {
        Some(principal) => Ok(Principal::parse(&principal)?),
        None => ws.default_principal().await?.ok_or_else(|| {
            CliError::Usage(
                "no principal given and no console user or realm to derive one".to_string(),
            )
        }),
    }
}

async fn user_or_console(ws: &Workstation, user: Option<String>) -> Result<String, CliError> {
    match user {
        Some(user) => Ok(user),
        None => ws
            .directory
            .console_user()
            .await?
            .ok_or_else(|| CliError::Usage("no user given and nobody is logged in".to_string())),
    }
}

fn read_password(principal: &Principal) -> Result<SecureString, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password for {}: ", principal);
        let _ = io::stderr().flush();
    }
    read_secret(&mut stdin.lock())
}

/// First line of `reader` without its line ending
fn read_secret(reader: &mut impl BufRead) -> Result<SecureString, CliError> {
    let mut line = String::new();
    reader.read_line(&mut line).map_err(CliError::Stdin)?;
    let secret = SecureString::new(line.trim_end_matches(['\r', '\n']));
    // Scrub the buffer; SecureString holds its own copy
    zeroize::Zeroize::zeroize(&mut line);

    if secret.is_empty() {
        return Err(CliError::Usage("empty password".to_string()));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["macad", "--json", "keychain", "check", "bob@EXAMPLE.COM"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Keychain(KeychainCommands::Check { principal: Some(ref p) }) if p == "bob@EXAMPLE.COM"
        ));

        let cli = Cli::parse_from(["macad", "principal", "--from-ticket"]);
        assert!(matches!(cli.command, Commands::Principal { user: None, from_ticket: true }));

        let cli = Cli::parse_from(["macad", "smb-home", "alice", "--node", "/Active Directory/EXAMPLE/All Domains"]);
        assert!(matches!(cli.command, Commands::SmbHome { node: Some(_), .. }));
    }

    #[test]
    fn test_read_secret_strips_line_ending() {
        let mut input = io::Cursor::new("hunter2\r\nignored\n");
        assert_eq!(read_secret(&mut input).unwrap().as_str(), "hunter2");

        let mut input = io::Cursor::new("no newline");
        assert_eq!(read_secret(&mut input).unwrap().as_str(), "no newline");

        // Spaces are part of the password
        let mut input = io::Cursor::new(" pass phrase \n");
        assert_eq!(read_secret(&mut input).unwrap().as_str(), " pass phrase ");
    }

    #[test]
    fn test_empty_password_rejected() {
        let mut input = io::Cursor::new("\n");
        assert!(matches!(read_secret(&mut input), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::from(AdError::NotBound { operation: "realms" }).exit_code(), 2);
        assert_eq!(
            CliError::from(AdError::DomainUnreachable {
                operation: "membership",
                domain: "example.com".to_string()
            })
            .exit_code(),
            3
        );
        assert_eq!(CliError::from(AdError::malformed("split_principal", "bob")).exit_code(), 4);
        assert_eq!(CliError::Usage("x".to_string()).exit_code(), 64);
    }
}
