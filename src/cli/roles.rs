use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::api::HrApi;
use crate::cli::{authorized_api, confirm, open_store, require_session};
use crate::directory::RoleDirectory;
use crate::error::Result;
use crate::models::{Role, Session};
use crate::settings::load_settings;

struct Context {
    conn: Connection,
    session: Session,
    directory: RoleDirectory<HrApi>,
}

fn context() -> Result<Context> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    let session = require_session(&conn)?;
    let api = authorized_api(&settings, &session)?;
    Ok(Context {
        conn,
        session,
        directory: RoleDirectory::new(api, settings.page_size),
    })
}

fn remember_page(ctx: &Context) -> Result<()> {
    ctx.directory.remember(&ctx.conn)
}

fn open_current(ctx: &mut Context) -> Result<()> {
    ctx.directory.resume(&ctx.conn)
}

fn print_page(ctx: &Context, roles: &[&Role], search: Option<&str>) {
    println!(
        "{}  {}",
        ctx.session.profile.name.bold(),
        ctx.session.profile.email.dimmed()
    );

    let mut table = Table::new();
    table.set_header(vec!["ID", "Role Name", "Permissions"]);
    if roles.is_empty() {
        table.add_row(vec![Cell::new(""), Cell::new("No roles found"), Cell::new("")]);
    }
    for role in roles {
        table.add_row(vec![
            Cell::new(&role.id),
            Cell::new(&role.name),
            Cell::new(role.permission_keys.len()),
        ]);
    }

    match search {
        Some(term) => println!("All Roles (matching '{term}' on this page)\n{table}"),
        None => println!("All Roles\n{table}"),
    }
    println!(
        "Page {} of {} ({} per page)",
        ctx.directory.current_page().to_string().bold(),
        ctx.directory.total_pages().to_string().bold(),
        ctx.directory.page_size()
    );
}

fn show(ctx: &Context, search: Option<&str>) {
    match search {
        Some(term) => print_page(ctx, &ctx.directory.search(term), Some(term)),
        None => {
            let all: Vec<&Role> = ctx.directory.roles().iter().collect();
            print_page(ctx, &all, None);
        }
    }
}

pub fn list(page: Option<u32>, search: Option<String>) -> Result<()> {
    let mut ctx = context()?;
    match page {
        Some(p) => ctx.directory.jump(p)?,
        None => open_current(&mut ctx)?,
    }
    remember_page(&ctx)?;
    show(&ctx, search.as_deref());
    Ok(())
}

pub fn next() -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    ctx.directory.next()?;
    remember_page(&ctx)?;
    show(&ctx, None);
    Ok(())
}

pub fn prev() -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    ctx.directory.prev()?;
    remember_page(&ctx)?;
    show(&ctx, None);
    Ok(())
}

pub fn view(id: &str) -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    let (role, marked) = ctx.directory.view(id)?;
    let held = marked.iter().filter(|(_, h)| *h).count();

    println!("Role:        {}", role.name.bold());
    println!("ID:          {}", role.id);
    println!("Permissions: {held} selected");

    if marked.is_empty() {
        println!("\nNo permissions available.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["", "Permission", "Key"]);
    for (perm, has) in &marked {
        let mark = if *has { "[x]".green().to_string() } else { "[ ]".to_string() };
        table.add_row(vec![Cell::new(mark), Cell::new(&perm.label), Cell::new(&perm.key)]);
    }
    println!("{table}");
    Ok(())
}

pub fn add(name: &str, permissions: &[String]) -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    ctx.directory.add(name, permissions)?;
    remember_page(&ctx)?;
    println!("{}", format!("Role added: {}", name.trim()).green());
    show(&ctx, None);
    Ok(())
}

pub fn update(id: &str, name: Option<&str>, permissions: &[String], clear_permissions: bool) -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    let selection: Option<&[String]> = if clear_permissions {
        Some(&[])
    } else if permissions.is_empty() {
        None
    } else {
        Some(permissions)
    };
    ctx.directory.update(id, name, selection)?;
    remember_page(&ctx)?;
    println!("{}", format!("Role {id} updated").green());
    show(&ctx, None);
    Ok(())
}

pub fn delete(id: &str, yes: bool) -> Result<()> {
    let mut ctx = context()?;
    open_current(&mut ctx)?;
    let name = ctx.directory.find(id)?.name.clone();
    if !yes && !confirm(&format!("Delete the role '{name}'? This cannot be undone."))? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = ctx.directory.delete(id)?;
    remember_page(&ctx)?;
    println!("{}", format!("Role deleted: {}", removed.name).green());
    show(&ctx, None);
    Ok(())
}

pub fn permissions() -> Result<()> {
    let ctx = context()?;
    let perms = ctx.directory.permissions()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Key", "Label"]);
    for p in &perms {
        table.add_row(vec![Cell::new(&p.id), Cell::new(&p.key), Cell::new(&p.label)]);
    }
    println!("Permissions ({})\n{table}", perms.len());
    Ok(())
}
