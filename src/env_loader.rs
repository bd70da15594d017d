use std::env;
use std::path::PathBuf;

use crate::essence::paths::ESSENCE_DIR_NAME;

fn fallback_dotenv_path(essence_dir: Option<PathBuf>, cwd: Option<PathBuf>) -> Option<PathBuf> {
    let base = essence_dir.or_else(|| cwd.map(|dir| dir.join(ESSENCE_DIR_NAME)))?;
    Some(base.join(".env"))
}

fn user_dotenv_path(config_dir: Option<PathBuf>) -> Option<PathBuf> {
    Some(config_dir?.join("essence/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let candidates = [
        fallback_dotenv_path(
            env::var_os("ESSENCE_DIR").map(PathBuf::from),
            env::current_dir().ok(),
        ),
        user_dotenv_path(dirs::config_dir()),
    ];
    for path in candidates.into_iter().flatten() {
        if path.is_file() {
            let _ = dotenvy::from_path(&path);
            return;
        }
    }
}
