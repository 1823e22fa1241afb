use std::sync::OnceLock;

use colored::Colorize;
use regex::Regex;
use zeroize::Zeroize;

use crate::api::HrApi;
use crate::cli::open_store;
use crate::error::{ConsoleError, Result};
use crate::session::SessionGate;
use crate::settings::load_settings;

const MIN_PASSWORD_LEN: usize = 6;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn email_re() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN))
        .as_ref()
        .map_err(|e| ConsoleError::Pattern(e.clone()))
}

pub(crate) fn check_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ConsoleError::validation("Email is required"));
    }
    if !email_re()?.is_match(email) {
        return Err(ConsoleError::validation(format!("Invalid email address: {email}")));
    }
    Ok(email)
}

pub(crate) fn check_new_password(password: &str, confirm: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ConsoleError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if password != confirm {
        return Err(ConsoleError::validation("Passwords do not match"));
    }
    Ok(())
}

pub fn login(email: &str, password: Option<String>) -> Result<()> {
    let email = check_email(email)?;
    let settings = load_settings();
    let conn = open_store(&settings)?;
    let mut gate = SessionGate::load(&conn)?;

    let mut password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        return Err(ConsoleError::validation("Password is required"));
    }

    let api = HrApi::new(&settings.effective_api_url())?;
    let outcome = api.login(email, &password);
    password.zeroize();

    let profile = match gate.complete_login(&conn, outcome) {
        Ok(session) => session.profile.clone(),
        Err(e) => {
            log::debug!("login rejected: {}", gate.last_error().unwrap_or_default());
            return Err(e);
        }
    };
    println!("Logged in as {} <{}>", profile.name.bold(), profile.email);
    Ok(())
}

pub fn logout(purge: bool) -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    let mut gate = SessionGate::load(&conn)?;
    let was_logged_in = gate.is_authenticated();
    gate.logout(&conn, purge)?;

    if was_logged_in {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    if purge {
        println!("Local ledger deleted.");
    }
    Ok(())
}

pub fn forgot_password(email: &str) -> Result<()> {
    let email = check_email(email)?;
    let settings = load_settings();
    let api = HrApi::new(&settings.effective_api_url())?;
    let message = api.forgot_password(email)?;
    println!("{}", message.green());
    println!("You will get a password reset link in your registered email.");
    Ok(())
}

pub fn reset_password(token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ConsoleError::validation("Reset token is missing"));
    }

    let mut password = rpassword::prompt_password("New password: ")?;
    let mut confirm = rpassword::prompt_password("Confirm password: ")?;
    let checked = check_new_password(&password, &confirm);
    confirm.zeroize();
    if let Err(e) = checked {
        password.zeroize();
        return Err(e);
    }

    let settings = load_settings();
    let api = HrApi::new(&settings.effective_api_url())?;
    let outcome = api.reset_password(token, &password);
    password.zeroize();

    println!("{}", outcome?.green());
    println!("Log in again with `hrconsole login`.");
    Ok(())
}
