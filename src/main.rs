mod api;
mod cli;
mod db;
mod directory;
mod error;
mod filter;
mod fmt;
mod ledger;
mod models;
mod session;
mod settings;

use clap::Parser;

use cli::ledger::FieldArgs;
use cli::{Cli, Commands, LedgerCommands, RolesCommands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Status) => cli::status::run(),
        Some(Commands::Init {
            data_dir,
            api_url,
            page_size,
        }) => cli::init::run(data_dir, api_url, page_size),
        Some(Commands::Login { email, password }) => cli::session::login(&email, password),
        Some(Commands::Logout { purge }) => cli::session::logout(purge),
        Some(Commands::ForgotPassword { email }) => cli::session::forgot_password(&email),
        Some(Commands::ResetPassword { token }) => cli::session::reset_password(&token),
        Some(Commands::Roles { command }) => match command {
            RolesCommands::List { page, search } => cli::roles::list(page, search),
            RolesCommands::Next => cli::roles::next(),
            RolesCommands::Prev => cli::roles::prev(),
            RolesCommands::View { id } => cli::roles::view(&id),
            RolesCommands::Add { name, permissions } => cli::roles::add(&name, &permissions),
            RolesCommands::Update {
                id,
                name,
                permissions,
                clear_permissions,
            } => cli::roles::update(&id, name.as_deref(), &permissions, clear_permissions),
            RolesCommands::Delete { id, yes } => cli::roles::delete(&id, yes),
        },
        Some(Commands::Permissions) => cli::roles::permissions(),
        Some(Commands::Ledger { command }) => match command {
            LedgerCommands::Add {
                tx_type,
                title,
                amount,
                date,
                payment_mode,
                source,
                employee,
            } => cli::ledger::add(FieldArgs {
                tx_type: Some(tx_type),
                title,
                amount,
                date,
                payment_mode,
                source,
                employee,
            }),
            LedgerCommands::Edit {
                id,
                tx_type,
                title,
                amount,
                date,
                payment_mode,
                source,
                employee,
            } => cli::ledger::edit(
                &id,
                FieldArgs {
                    tx_type,
                    title,
                    amount,
                    date,
                    payment_mode,
                    source,
                    employee,
                },
            ),
            LedgerCommands::Delete { id, yes } => cli::ledger::delete(&id, yes),
            LedgerCommands::List {
                range,
                from_date,
                to_date,
                tx_type,
            } => cli::ledger::list(range, from_date, to_date, tx_type),
            LedgerCommands::Summary => cli::ledger::summary(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
