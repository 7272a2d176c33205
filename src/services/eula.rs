use std::path::Path;
use tokio::fs;

use super::validation::EULA_FILE;

/// True when `eula.txt` exists and still says `eula=false`.
pub async fn needs_agreement(folder: &Path) -> bool {
    match fs::read_to_string(folder.join(EULA_FILE)).await {
        Ok(content) => content.contains("eula=false"),
        Err(_) => false,
    }
}

/// Flips every `eula=false` line to `eula=true`, leaving the rest untouched.
pub async fn accept(folder: &Path) -> std::io::Result<()> {
    let path = folder.join(EULA_FILE);
    let content = fs::read_to_string(&path).await?;
    fs::write(&path, accept_content(&content)).await
}

fn accept_content(content: &str) -> String {
    let mut out: String = content
        .lines()
        .map(|line| if line.trim() == "eula=false" { "eula=true" } else { line })
        .collect::<Vec<_>>()
        .join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    out
}
