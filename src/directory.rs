use std::fmt;

use rusqlite::Connection;

use crate::api::{RolePage, RoleService};
use crate::db::{self, KEY_CURRENT_PAGE};
use crate::error::{ConsoleError, Result};
use crate::models::{Permission, Role};

/// Number of role pages, and whether the server actually told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// Derived from a reported total, or from a short (last) page.
    Exact(u32),
    /// A full page came back with no total; at least this many pages exist.
    /// When the listing really ends on a full page this overshoots by one.
    AtLeast(u32),
}

impl PageCount {
    pub fn value(&self) -> u32 {
        match self {
            PageCount::Exact(n) | PageCount::AtLeast(n) => *n,
        }
    }

    /// Page count after fetching `page` of size `page_size` and receiving
    /// `returned` rows with the server's optional `total`.
    pub fn from_fetch(page: u32, page_size: u32, returned: usize, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => {
                let pages = total.div_ceil(u64::from(page_size.max(1)));
                PageCount::Exact(u32::try_from(pages).unwrap_or(u32::MAX))
            }
            _ if returned >= page_size as usize => PageCount::AtLeast(page.saturating_add(1)),
            _ => PageCount::Exact(page),
        }
    }
}

impl fmt::Display for PageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCount::Exact(n) => write!(f, "{n}"),
            PageCount::AtLeast(n) => write!(f, "{n}+"),
        }
    }
}

/// Read-through cache of a single page of remote roles.
pub struct RoleDirectory<S: RoleService> {
    service: S,
    page_size: u32,
    current_page: u32,
    total_pages: PageCount,
    roles: Vec<Role>,
}

impl<S: RoleService> RoleDirectory<S> {
    pub fn new(service: S, page_size: u32) -> Self {
        Self {
            service,
            page_size: page_size.max(1),
            current_page: 1,
            total_pages: PageCount::Exact(1),
            roles: Vec::new(),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> PageCount {
        self.total_pages
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn fetch(&self, page: u32) -> Result<(Vec<Role>, PageCount)> {
        if page == 0 {
            return Err(ConsoleError::validation("Page numbers start at 1"));
        }
        let skip = (page - 1)
            .checked_mul(self.page_size)
            .ok_or_else(|| ConsoleError::validation(format!("Page {page} is out of range")))?;
        let RolePage { roles, total } = self.service.list_roles(skip, self.page_size)?;
        let pages = PageCount::from_fetch(page, self.page_size, roles.len(), total);
        log::debug!("role page {page}: {} rows, total={total:?}, pages={pages}", roles.len());
        Ok((roles, pages))
    }

    /// Fetch `page`. On failure the cached page is left as it was.
    pub fn open(&mut self, page: u32) -> Result<()> {
        let (roles, pages) = self.fetch(page)?;
        self.total_pages = pages;
        self.current_page = page;
        self.roles = roles;
        Ok(())
    }

    /// Fetch a page the user asked for by number. A page past the end is
    /// rejected and the cached page is kept.
    pub fn jump(&mut self, page: u32) -> Result<()> {
        let (roles, pages) = self.fetch(page)?;
        if page > pages.value() || (page > 1 && roles.is_empty()) {
            return Err(ConsoleError::validation(format!(
                "Page {page} is out of range (1..={})",
                pages
            )));
        }
        self.total_pages = pages;
        self.current_page = page;
        self.roles = roles;
        Ok(())
    }

    /// Reopen the page recorded in the store. A page that has since been
    /// emptied falls back to page 1.
    pub fn resume(&mut self, conn: &Connection) -> Result<()> {
        let page = db::get_item(conn, KEY_CURRENT_PAGE)?
            .and_then(|p| p.parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        self.open(page)?;
        if page > 1 && self.roles.is_empty() {
            log::debug!("page {page} is empty, falling back to page 1");
            self.open(1)?;
        }
        Ok(())
    }

    /// Record the current page so the next run reopens it.
    pub fn remember(&self, conn: &Connection) -> Result<()> {
        db::set_item(conn, KEY_CURRENT_PAGE, &self.current_page.to_string())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.open(self.current_page)
    }

    /// Move to `page` if it lies within the known page range.
    pub fn go_to(&mut self, page: u32) -> Result<()> {
        let last = self.total_pages.value();
        if page < 1 || page > last {
            return Err(ConsoleError::validation(format!(
                "Page {page} is out of range (1..={})",
                self.total_pages
            )));
        }
        self.open(page)
    }

    pub fn next(&mut self) -> Result<()> {
        if self.current_page >= self.total_pages.value() {
            return Err(ConsoleError::validation("Already on the last page"));
        }
        self.go_to(self.current_page + 1)
    }

    pub fn prev(&mut self) -> Result<()> {
        if self.current_page <= 1 {
            return Err(ConsoleError::validation("Already on the first page"));
        }
        self.go_to(self.current_page - 1)
    }

    /// Case-insensitive name match over the cached page only.
    pub fn search(&self, term: &str) -> Vec<&Role> {
        let needle = term.to_lowercase();
        self.roles
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn find(&self, id: &str) -> Result<&Role> {
        self.roles.iter().find(|r| r.id == id).ok_or_else(|| {
            ConsoleError::NotFound(format!(
                "No role with ID {id} on page {}",
                self.current_page
            ))
        })
    }

    pub fn permissions(&self) -> Result<Vec<Permission>> {
        self.service.list_permissions()
    }

    /// Every catalogue permission paired with whether the role holds it.
    pub fn view(&self, id: &str) -> Result<(Role, Vec<(Permission, bool)>)> {
        let role = self.find(id)?.clone();
        let catalogue = self.service.list_permissions()?;
        let marked = catalogue
            .into_iter()
            .map(|p| {
                let held = !p.key.is_empty() && role.has_permission(&p.key);
                (p, held)
            })
            .collect();
        Ok((role, marked))
    }

    pub fn add(&mut self, name: &str, selected: &[String]) -> Result<()> {
        let name = require_name(name)?;
        let keys = self.resolve_keys(selected)?;
        self.service.add_role(name, &keys)?;
        log::info!("added role {name}");
        self.refresh()
    }

    /// Update a cached role. A missing name keeps the current one and a
    /// missing selection keeps the current permissions.
    pub fn update(&mut self, id: &str, name: Option<&str>, selected: Option<&[String]>) -> Result<()> {
        let role = self.find(id)?.clone();
        let name = require_name(name.unwrap_or(role.name.as_str()))?;
        let keys = match selected {
            Some(sel) => self.resolve_keys(sel)?,
            None => role.permission_keys.clone(),
        };
        self.service.update_role(&role.id, name, &keys)?;
        log::info!("updated role {id}");
        self.refresh()
    }

    pub fn delete(&mut self, id: &str) -> Result<Role> {
        let role = self.find(id)?.clone();
        self.service.delete_role(&role.id)?;
        log::info!("deleted role {id}");
        self.refresh()?;
        // Removing the last role on a page steps back one page.
        if self.roles.is_empty() && self.current_page > 1 {
            self.open(self.current_page - 1)?;
        }
        Ok(role)
    }

    /// Map permission ids or keys to keys through the catalogue.
    fn resolve_keys(&self, selected: &[String]) -> Result<Vec<String>> {
        if selected.is_empty() {
            return Ok(Vec::new());
        }
        let catalogue = self.service.list_permissions()?;
        let mut keys: Vec<String> = Vec::with_capacity(selected.len());
        for sel in selected {
            let perm = catalogue
                .iter()
                .find(|p| p.id == *sel || (!p.key.is_empty() && p.key == *sel))
                .ok_or_else(|| ConsoleError::validation(format!("Unknown permission: {sel}")))?;
            if perm.key.is_empty() {
                return Err(ConsoleError::validation(format!("Permission {sel} has no key")));
            }
            if !keys.contains(&perm.key) {
                keys.push(perm.key.clone());
            }
        }
        Ok(keys)
    }
}

fn require_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::validation("Role name is required"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use std::cell::RefCell;

    /// In-memory stand-in for the remote role service.
    struct FakeService {
        roles: RefCell<Vec<Role>>,
        report_total: bool,
        fail: RefCell<Option<String>>,
        next_id: RefCell<u32>,
    }

    impl FakeService {
        fn with_roles(n: usize, report_total: bool) -> Self {
            let roles = (1..=n)
                .map(|i| Role {
                    id: format!("r{i}"),
                    name: format!("Role {i}"),
                    permission_keys: Vec::new(),
                })
                .collect();
            Self {
                roles: RefCell::new(roles),
                report_total,
                fail: RefCell::new(None),
                next_id: RefCell::new(n as u32 + 1),
            }
        }

        fn check(&self) -> Result<()> {
            match self.fail.borrow().clone() {
                Some(msg) => Err(ConsoleError::Server(msg)),
                None => Ok(()),
            }
        }
    }

    impl RoleService for FakeService {
        fn list_roles(&self, skip: u32, limit: u32) -> Result<RolePage> {
            self.check()?;
            let roles = self.roles.borrow();
            let page = roles
                .iter()
                .skip(skip as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(RolePage {
                roles: page,
                total: self.report_total.then_some(roles.len() as u64),
            })
        }

        fn list_permissions(&self) -> Result<Vec<Permission>> {
            self.check()?;
            Ok(vec![
                Permission { id: "p1".into(), key: "role.add".into(), label: "Add Role".into() },
                Permission { id: "p2".into(), key: "role.delete".into(), label: "Delete Role".into() },
            ])
        }

        fn add_role(&self, name: &str, keys: &[String]) -> Result<()> {
            self.check()?;
            let mut id = self.next_id.borrow_mut();
            self.roles.borrow_mut().push(Role {
                id: format!("r{id}"),
                name: name.to_string(),
                permission_keys: keys.to_vec(),
            });
            *id += 1;
            Ok(())
        }

        fn update_role(&self, id: &str, name: &str, keys: &[String]) -> Result<()> {
            self.check()?;
            let mut roles = self.roles.borrow_mut();
            let role = roles
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ConsoleError::Server("Role not found".into()))?;
            role.name = name.to_string();
            role.permission_keys = keys.to_vec();
            Ok(())
        }

        fn delete_role(&self, id: &str) -> Result<()> {
            self.check()?;
            self.roles.borrow_mut().retain(|r| r.id != id);
            Ok(())
        }
    }

    #[test]
    fn test_page_count_from_total() {
        assert_eq!(PageCount::from_fetch(1, 3, 3, Some(7)), PageCount::Exact(3));
        assert_eq!(PageCount::from_fetch(1, 3, 3, Some(6)), PageCount::Exact(2));
        assert_eq!(PageCount::from_fetch(1, 3, 1, Some(1)), PageCount::Exact(1));
    }

    #[test]
    fn test_page_count_fallback() {
        assert_eq!(PageCount::from_fetch(2, 3, 3, None), PageCount::AtLeast(3));
        assert_eq!(PageCount::from_fetch(2, 3, 2, None), PageCount::Exact(2));
        assert_eq!(PageCount::from_fetch(2, 3, 3, Some(0)), PageCount::AtLeast(3));
        assert_eq!(PageCount::AtLeast(3).to_string(), "3+");
    }

    #[test]
    fn test_seven_roles_three_per_page() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        dir.open(1).unwrap();
        assert_eq!(dir.total_pages(), PageCount::Exact(3));
        assert_eq!(dir.roles().len(), 3);
        dir.go_to(3).unwrap();
        assert_eq!(dir.roles().len(), 1);
        assert_eq!(dir.roles()[0].id, "r7");
        assert!(dir.next().is_err());
    }

    #[test]
    fn test_full_last_page_overreports_without_total() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(6, false), 3);
        dir.open(2).unwrap();
        assert_eq!(dir.total_pages(), PageCount::AtLeast(3));
        dir.next().unwrap();
        assert!(dir.roles().is_empty());
        assert_eq!(dir.total_pages(), PageCount::Exact(3));
    }

    #[test]
    fn test_prev_on_first_page_is_rejected() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(2, true), 3);
        dir.open(1).unwrap();
        assert!(dir.prev().is_err());
        assert!(dir.open(0).is_err());
    }

    #[test]
    fn test_search_current_page_only() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        dir.open(1).unwrap();
        assert_eq!(dir.search("role").len(), 3);
        assert_eq!(dir.search("ROLE 2").len(), 1);
        // Role 7 lives on page 3.
        assert!(dir.search("role 7").is_empty());
    }

    #[test]
    fn test_failed_fetch_leaves_cache_unchanged() {
        let service = FakeService::with_roles(4, true);
        let mut dir = RoleDirectory::new(service, 3);
        dir.open(1).unwrap();
        *dir.service.fail.borrow_mut() = Some("Server down".into());
        let err = dir.go_to(2).unwrap_err();
        assert_eq!(err.to_string(), "Server down");
        assert_eq!(dir.current_page(), 1);
        assert_eq!(dir.roles().len(), 3);
    }

    #[test]
    fn test_add_refetches_and_maps_permissions() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(1, true), 3);
        dir.open(1).unwrap();
        dir.add("  Auditor ", &["p1".to_string(), "role.delete".to_string(), "p1".to_string()])
            .unwrap();
        assert_eq!(dir.roles().len(), 2);
        let added = &dir.roles()[1];
        assert_eq!(added.name, "Auditor");
        assert_eq!(added.permission_keys, vec!["role.add", "role.delete"]);
    }

    #[test]
    fn test_add_validation() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(0, true), 3);
        dir.open(1).unwrap();
        assert_eq!(dir.add("   ", &[]).unwrap_err().to_string(), "Role name is required");
        let err = dir.add("X", &["nope".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown permission: nope");
        assert!(dir.roles().is_empty());
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(2, true), 3);
        dir.open(1).unwrap();
        dir.update("r1", None, Some(&["role.add".to_string()][..])).unwrap();
        dir.update("r1", Some("Lead"), None).unwrap();
        let role = dir.find("r1").unwrap();
        assert_eq!(role.name, "Lead");
        assert_eq!(role.permission_keys, vec!["role.add"]);
    }

    #[test]
    fn test_view_marks_held_permissions() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(1, true), 3);
        dir.open(1).unwrap();
        dir.update("r1", None, Some(&["p2".to_string()][..])).unwrap();
        let (role, marked) = dir.view("r1").unwrap();
        assert_eq!(role.id, "r1");
        let held: Vec<&str> = marked.iter().filter(|(_, h)| *h).map(|(p, _)| p.key.as_str()).collect();
        assert_eq!(held, vec!["role.delete"]);
    }

    #[test]
    fn test_huge_page_number_is_out_of_range() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        dir.open(1).unwrap();
        let err = dir.open(2_000_000_000).unwrap_err();
        assert_eq!(err.to_string(), "Page 2000000000 is out of range");
        assert!(dir.jump(u32::MAX).is_err());
        assert_eq!(dir.current_page(), 1);
        assert_eq!(dir.roles().len(), 3);

        let mut wide = RoleDirectory::new(FakeService::with_roles(1, true), u32::MAX);
        assert!(wide.open(3).is_err());
        assert_eq!(
            PageCount::from_fetch(u32::MAX, 3, 3, None),
            PageCount::AtLeast(u32::MAX)
        );
    }

    #[test]
    fn test_jump_rejects_pages_past_the_end() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        dir.jump(2).unwrap();
        assert_eq!(dir.current_page(), 2);
        let err = dir.jump(5).unwrap_err();
        assert_eq!(err.to_string(), "Page 5 is out of range (1..=3)");
        assert_eq!(dir.current_page(), 2);
        assert_eq!(dir.roles()[0].id, "r4");

        let mut no_total = RoleDirectory::new(FakeService::with_roles(6, false), 3);
        assert!(no_total.jump(3).is_err());
        no_total.jump(2).unwrap();
        assert_eq!(no_total.total_pages(), PageCount::AtLeast(3));
    }

    #[test]
    fn test_page_marker_round_trips_between_runs() {
        let (_dir, conn) = test_db();
        let mut first = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        first.resume(&conn).unwrap();
        assert_eq!(first.current_page(), 1);
        first.next().unwrap();
        first.remember(&conn).unwrap();
        assert_eq!(db::get_item(&conn, KEY_CURRENT_PAGE).unwrap().as_deref(), Some("2"));

        let mut second = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        second.resume(&conn).unwrap();
        assert_eq!(second.current_page(), 2);
        assert_eq!(second.roles()[0].id, "r4");
    }

    #[test]
    fn test_resume_falls_back_when_page_emptied() {
        let (_dir, conn) = test_db();
        db::set_item(&conn, KEY_CURRENT_PAGE, "3").unwrap();
        let mut dir = RoleDirectory::new(FakeService::with_roles(4, true), 3);
        dir.resume(&conn).unwrap();
        assert_eq!(dir.current_page(), 1);
        assert_eq!(dir.roles().len(), 3);

        db::set_item(&conn, KEY_CURRENT_PAGE, "garbage").unwrap();
        dir.resume(&conn).unwrap();
        assert_eq!(dir.current_page(), 1);
    }

    #[test]
    fn test_deleting_last_role_on_page_steps_back() {
        let (_dir, conn) = test_db();
        let mut dir = RoleDirectory::new(FakeService::with_roles(7, true), 3);
        dir.open(3).unwrap();
        dir.delete("r7").unwrap();
        assert_eq!(dir.current_page(), 2);
        assert_eq!(dir.roles().len(), 3);
        dir.remember(&conn).unwrap();
        assert_eq!(db::get_item(&conn, KEY_CURRENT_PAGE).unwrap().as_deref(), Some("2"));

        let mut first_page = RoleDirectory::new(FakeService::with_roles(1, true), 3);
        first_page.open(1).unwrap();
        first_page.delete("r1").unwrap();
        assert_eq!(first_page.current_page(), 1);
        assert!(first_page.roles().is_empty());
    }

    #[test]
    fn test_delete_refetches() {
        let mut dir = RoleDirectory::new(FakeService::with_roles(3, true), 3);
        dir.open(1).unwrap();
        let gone = dir.delete("r2").unwrap();
        assert_eq!(gone.name, "Role 2");
        assert_eq!(dir.roles().len(), 2);
        assert!(dir.find("r2").is_err());
    }
}
