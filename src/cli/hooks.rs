//! Git pre-commit hook installation and management.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Error;

/// Managed block markers.
const BLOCK_START: &str = "# START bumpgate version bump gate";
const BLOCK_END: &str = "# END bumpgate version bump gate";

const SHEBANG: &str = "#!/bin/sh";

/// Hook body: compare against HEAD, or the empty tree on an unborn branch.
const HOOK_BODY: &str = r#"if git rev-parse --verify HEAD >/dev/null 2>&1; then
    against=HEAD
else
    against=$(git hash-object -t tree /dev/null)
fi
bumpgate "$against" || exit 1"#;

fn managed_block() -> String {
    format!("{}\n{}\n{}", BLOCK_START, HOOK_BODY, BLOCK_END)
}

/// Path of the pre-commit hook, or `None` if the project has no `.git` dir.
pub fn hook_path(project_root: &Path) -> Option<PathBuf> {
    let git_dir = project_root.join(".git");
    git_dir
        .is_dir()
        .then(|| git_dir.join("hooks").join("pre-commit"))
}

/// Install the pre-commit hook, preserving any existing hook content.
///
/// The block goes right after the shebang so a trailing `exec` or `exit`
/// in an existing hook can't skip it. Returns `false` if the hook was
/// already installed.
pub fn install_hook(project_root: &Path) -> Result<bool, Error> {
    let path = hook_path(project_root)
        .ok_or_else(|| Error::other(format!("{} is not a git repository", project_root.display())))?;

    let final_content = if path.exists() {
        let existing = fs::read_to_string(&path)?;

        // Already has our hook
        if existing.contains(BLOCK_START) {
            return Ok(false);
        }

        insert_after_shebang(&existing)
    } else {
        format!("{}\n{}\n", SHEBANG, managed_block())
    };

    if let Some(hooks_dir) = path.parent() {
        fs::create_dir_all(hooks_dir)?;
    }
    fs::write(&path, &final_content)?;
    make_executable(&path)?;
    info!(path = %path.display(), "Installed pre-commit hook");

    Ok(true)
}

/// Put the managed block ahead of existing hook content.
fn insert_after_shebang(existing: &str) -> String {
    let (shebang, rest) = match existing.split_once('\n') {
        Some((first, rest)) if first.starts_with("#!") => (first, rest),
        None if existing.starts_with("#!") => (existing, ""),
        _ => (SHEBANG, existing),
    };

    let rest = rest.trim_start_matches('\n');
    if rest.trim().is_empty() {
        format!("{}\n{}\n", shebang, managed_block())
    } else {
        format!("{}\n{}\n\n{}", shebang, managed_block(), rest)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}

/// Remove the bumpgate block from the pre-commit hook.
///
/// Deletes the hook file if nothing but the shebang remains. Returns
/// whether anything was removed.
pub fn uninstall_hook(project_root: &Path) -> Result<bool, Error> {
    let Some(path) = hook_path(project_root) else {
        return Ok(false);
    };
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(&path)?;
    let Some(cleaned) = remove_managed_block(&content)? else {
        return Ok(false);
    };

    if cleaned.trim().is_empty() || cleaned.trim() == SHEBANG {
        fs::remove_file(&path)?;
    } else {
        fs::write(&path, format!("{}\n", cleaned.trim_end()))?;
    }
    info!(path = %path.display(), "Removed bumpgate pre-commit hook");

    Ok(true)
}

/// Strip content between the managed block markers, inclusive.
fn remove_managed_block(content: &str) -> Result<Option<String>, Error> {
    let Some(start_idx) = content.find(BLOCK_START) else {
        return Ok(None);
    };
    let end_idx = content
        .find(BLOCK_END)
        .ok_or_else(|| Error::other("Block end marker not found"))?;

    if end_idx < start_idx {
        return Err(Error::other("Block markers are in wrong order"));
    }

    let before = content[..start_idx].trim_end();
    let after = content[end_idx + BLOCK_END.len()..].trim_start();

    let cleaned = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{}\n{}", before, after),
    };
    Ok(Some(cleaned))
}
