use std::io::Write;
use std::path::PathBuf;

use crate::db::get_connection;
use crate::error::{ConsoleError, Result};
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>, api_url: Option<String>, page_size: Option<u32>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        // First run: offer the default data directory
        print!("Data directory [{}]: ", settings.data_dir);
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    if let Some(url) = api_url {
        let url = url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConsoleError::Settings(format!(
                "API URL must start with http:// or https://, got {url}"
            )));
        }
        settings.api_url = url;
    }
    if let Some(size) = page_size {
        settings.page_size = size;
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    get_connection(&settings.db_path())?;

    println!("Initialized hrconsole at {}", resolved.display());
    println!("API: {}", settings.api_url);
    Ok(())
}
