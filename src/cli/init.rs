use std::path::PathBuf;

use chrono::Local;

use crate::catalog;
use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::fiscal;
use crate::models::NewPrefix;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;

    let mut conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    let prefix = fiscal::default_prefix_for(Local::now().date_naive());
    let known = catalog::list_prefixes(&conn)?
        .iter()
        .any(|p| p.prefix == prefix);
    if !known {
        catalog::register_prefix(
            &mut conn,
            &NewPrefix {
                prefix: prefix.clone(),
                is_default: false,
            },
        )?;
        println!("Registered invoice prefix {prefix}");
    }

    save_settings(&settings)?;
    println!("Initialized database at {}", settings.db_path().display());
    Ok(())
}
