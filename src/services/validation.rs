use std::path::Path;

use crate::models::{LaunchMode, ServerProfile};

pub const PROPERTIES_FILE: &str = "server.properties";
pub const EULA_FILE: &str = "eula.txt";

/// Checks everything `start` needs before spawning. One message per offending
/// field; an empty list means the profile can be launched.
pub fn validate_profile(profile: &ServerProfile) -> Vec<String> {
    let mut errors = Vec::new();
    let folder = &profile.folder_path;
    let has_folder = !folder.as_os_str().is_empty();

    if !has_folder {
        errors.push("Server folder is not configured.".to_string());
    } else if !folder.is_dir() {
        errors.push(format!("Server folder not found: {}", folder.display()));
    }

    match profile.launch_mode {
        LaunchMode::BatchScript => {
            if profile.batch_filename.trim().is_empty() {
                errors.push("No launch script is configured.".to_string());
            } else if has_folder {
                let script = profile.launch_artifact();
                if !script.is_file() {
                    errors.push(format!("Launch script not found: {}", script.display()));
                }
            }
        }
        LaunchMode::JavaJar => {
            if profile.jar_name.trim().is_empty() {
                errors.push("No server jar is configured.".to_string());
            } else if has_folder {
                let jar = profile.launch_artifact();
                if !jar.is_file() {
                    errors.push(format!("Server jar not found: {}", jar.display()));
                }
            }
        }
    }

    if !profile.uses_default_java() && !Path::new(profile.java_executable()).is_file() {
        errors.push(format!("Java executable not found: {}", profile.java_executable()));
    }

    errors
}

/// A raw folder is only accepted as a server instance if it carries the
/// vanilla marker files.
pub fn validate_server_folder(folder: &Path) -> Result<(), Vec<String>> {
    if !folder.is_dir() {
        return Err(vec![format!("Folder not found: {}", folder.display())]);
    }

    let missing: Vec<String> = [PROPERTIES_FILE, EULA_FILE]
        .iter()
        .filter(|f| !folder.join(f).is_file())
        .map(|f| format!("Missing {} in {}", f, folder.display()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}
