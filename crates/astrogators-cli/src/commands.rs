/*
[INPUT]:  Parsed subcommand and an initialized session
[OUTPUT]: Human-readable results on stdout
[POS]:    CLI layer - maps subcommands onto session operations
[UPDATE]: When adding subcommands or changing their output
*/

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use console::style;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use astrogators_client::{
    AllyCodeList, AllyCodeRef, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResendVerificationRequest, ResetPasswordRequest, Session, TokenClaims, TokenStore, User,
    VerifyEmailRequest, format_ally_code, is_valid_ally_code, unformat_ally_code,
};

use crate::config::ResolvedConfig;
use crate::{AllyCodesCommand, Command};

pub async fn run(session: &Session, config: &ResolvedConfig, command: Command) -> Result<()> {
    match command {
        Command::Status => status(session, config),
        Command::Login { email, password } => {
            let credentials = LoginRequest {
                email: prompt_or(email, "Email")?,
                password: password_or(password, false)?,
            };
            let user = session.login(&credentials).await.context("login failed")?;
            println!(
                "{} {}",
                style("Logged in as").green(),
                style(&user.username).bold()
            );
            print_migration_hint(session);
            Ok(())
        }
        Command::Logout => {
            session.logout();
            println!("{}", style("Logged out.").green());
            Ok(())
        }
        Command::Whoami => {
            match session.user() {
                Some(user) => print_user(&user),
                None => println!("{}", style("Not logged in.").yellow()),
            }
            Ok(())
        }
        Command::Register {
            email,
            username,
            password,
        } => {
            let data = RegisterRequest {
                email: prompt_or(email, "Email")?,
                username: prompt_or(username, "Username")?,
                password: password_or(password, true)?,
            };
            let response = session.register(&data).await.context("registration failed")?;
            println!("{}", style(&response.message).green());
            println!(
                "Check {} for a verification link before logging in.",
                style(&response.user.email).cyan()
            );
            Ok(())
        }
        Command::ForgotPassword { email } => {
            let data = ForgotPasswordRequest {
                email: prompt_or(email, "Email")?,
            };
            let message = session.forgot_password(&data).await?;
            println!("{}", style(message).green());
            Ok(())
        }
        Command::ResetPassword { token, password } => {
            let data = ResetPasswordRequest {
                token,
                new_password: password_or(password, true)?,
            };
            let message = session.reset_password(&data).await?;
            println!("{}", style(message).green());
            Ok(())
        }
        Command::ResendVerification { email } => {
            let data = ResendVerificationRequest {
                email: prompt_or(email, "Email")?,
            };
            let message = session.resend_verification(&data).await?;
            println!("{}", style(message).green());
            Ok(())
        }
        Command::VerifyEmail { token } => {
            let response = session
                .client()
                .verify_email(&VerifyEmailRequest { token })
                .await
                .context("email verification failed")?;
            println!("{}", style(response.message).green());
            Ok(())
        }
        Command::AllyCodes(command) => ally_codes(session, command).await,
    }
}

async fn ally_codes(session: &Session, command: AllyCodesCommand) -> Result<()> {
    match command {
        AllyCodesCommand::List => {
            print_ally_codes(session);
            Ok(())
        }
        AllyCodesCommand::Add { ally_code } => {
            let code = normalize_ally_code(&ally_code)?;
            session.add_ally_code(&code).await?;
            println!(
                "{} {}",
                style("Added").green(),
                style(format_ally_code(&code)).bold()
            );
            Ok(())
        }
        AllyCodesCommand::Remove { ally_code } => {
            let code = normalize_ally_code(&ally_code)?;
            let state = session.state();
            if !state.ally_codes.contains(&code) {
                bail!("ally code {} is not in your list", format_ally_code(&code));
            }
            let target = match state.ally_codes.remote_id(&code) {
                Some(id) => AllyCodeRef::Id(id),
                None => AllyCodeRef::Code(code.clone()),
            };
            session.remove_ally_code(target).await?;
            println!(
                "{} {}",
                style("Removed").green(),
                style(format_ally_code(&code)).bold()
            );
            Ok(())
        }
        AllyCodesCommand::Select { ally_code, clear } => {
            let Some(ally_code) = ally_code.filter(|_| !clear) else {
                session.select_ally_code(None).await;
                println!("{}", style("Selection cleared.").green());
                return Ok(());
            };

            let code = normalize_ally_code(&ally_code)?;
            if !session.state().ally_codes.contains(&code) {
                bail!(
                    "ally code {} is not in your list; add it first",
                    format_ally_code(&code)
                );
            }
            session.select_ally_code(Some(&code)).await;
            println!(
                "{} {}",
                style("Selected").green(),
                style(format_ally_code(&code)).bold()
            );
            Ok(())
        }
        AllyCodesCommand::Migrate => {
            if !session.is_authenticated() {
                bail!("log in before migrating local ally codes");
            }
            let pending = session.ally_storage().list().len();
            if pending == 0 {
                println!("{}", style("No local ally codes to migrate.").yellow());
                return Ok(());
            }
            session.migrate_local_ally_codes().await?;
            session.fetch_ally_codes().await;
            println!(
                "{} {} local ally code(s) processed.",
                style("Migration complete.").green(),
                pending
            );
            print_ally_codes(session);
            Ok(())
        }
    }
}

fn status(session: &Session, config: &ResolvedConfig) -> Result<()> {
    let state = session.state();
    println!("{}", style("Astrogator's Table").bold().cyan());
    println!("  API:          {}", config.api_base_url);
    println!("  Data dir:     {}", config.data_dir.display());
    println!(
        "  Auth:         {}",
        if state.auth_enabled {
            style("enabled").green()
        } else {
            style("disabled").yellow()
        }
    );

    match &state.user {
        Some(user) => println!("  User:         {} <{}>", user.username, user.email),
        None => println!("  User:         {}", style("anonymous").dim()),
    }

    if let Some(token) = session.client().token_store().access_token() {
        let expiry = TokenClaims::decode(&token)
            .ok()
            .and_then(|claims| claims.expires_at());
        println!("  Access token: {}", describe_expiry(expiry, Utc::now()));
    }

    println!(
        "  Ally codes:   {} ({})",
        state.ally_codes.len(),
        match state.ally_codes {
            AllyCodeList::Remote(_) => "account",
            AllyCodeList::Local(_) => "local",
        }
    );
    if let Some(selected) = &state.selected_ally_code {
        println!("  Selected:     {}", format_ally_code(selected));
    }
    print_migration_hint(session);
    Ok(())
}

fn print_user(user: &User) {
    println!("{}", style(&user.username).bold());
    println!("  id:       {}", user.id);
    println!("  email:    {}", user.email);
    println!(
        "  verified: {}",
        if user.is_verified { "yes" } else { "no" }
    );
    println!("  active:   {}", if user.is_active { "yes" } else { "no" });
    println!("  joined:   {}", user.created_at.format("%Y-%m-%d"));
}

fn print_ally_codes(session: &Session) {
    let state = session.state();
    if state.ally_codes.is_empty() {
        println!("{}", style("No ally codes found.").yellow());
        return;
    }

    let rows: Vec<(String, Option<String>, Option<DateTime<Utc>>)> = match &state.ally_codes {
        AllyCodeList::Remote(codes) => codes
            .iter()
            .map(|c| (c.ally_code.clone(), c.player_name.clone(), c.last_used_at))
            .collect(),
        AllyCodeList::Local(codes) => codes
            .iter()
            .map(|c| (c.ally_code.clone(), c.player_name.clone(), c.last_used_at))
            .collect(),
    };

    for (code, player_name, last_used_at) in rows {
        let marker = if state.selected_ally_code.as_deref() == Some(code.as_str()) {
            style("*").green().bold()
        } else {
            style(" ")
        };
        let last_used = last_used_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} {}  {:<24} {}",
            marker,
            style(format_ally_code(&code)).bold(),
            player_name.unwrap_or_default(),
            style(last_used).dim()
        );
    }
}

fn print_migration_hint(session: &Session) {
    let prompt = session.state().migration_prompt;
    if prompt.show {
        println!(
            "{} {} ally code(s) saved on this machine.",
            style("Note:").yellow().bold(),
            prompt.local_storage_codes.len()
        );
        println!("Run `astrogators ally-codes migrate` to add them to your account.");
    }
}

fn prompt_or(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(label)
            .interact_text()
            .with_context(|| format!("read {}", label.to_lowercase())),
    }
}

fn password_or(value: Option<String>, confirm: bool) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    let theme = ColorfulTheme::default();
    let mut prompt = Password::with_theme(&theme).with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().context("read password")
}

/// Accept `123-456-789` or `123456789`
fn normalize_ally_code(input: &str) -> Result<String> {
    let code = unformat_ally_code(input.trim());
    if !is_valid_ally_code(&code) {
        bail!("ally code must be exactly 9 digits, got {input:?}");
    }
    Ok(code)
}

fn describe_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match expires_at {
        None => "present (no expiry)".to_string(),
        Some(at) if at <= now => format!("expired at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        Some(at) => {
            let minutes = (at - now).num_minutes();
            format!(
                "valid until {} ({minutes} min left)",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            )
        }
    }
}
