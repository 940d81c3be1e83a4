use anyhow::{Context, Result};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// Hands a listing URL to the platform's default URL handler
pub fn open_url(url: &str) -> Result<()> {
    if !is_web_url(url) {
        anyhow::bail!("Refusing to open non-web URL: {}", url);
    }

    let (program, args) = opener_command(std::env::consts::OS, url);
    tracing::debug!("Opening {} with {}", url, program);

    launch(program, &args).with_context(|| format!("Failed to launch {} for {}", program, url))?;

    Ok(())
}

/// Spawns `program` and reaps it on a background thread once it exits
fn launch(program: &str, args: &[String]) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(std::thread::spawn(move || child.wait().ok()))
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn opener_command(os: &str, url: &str) -> (&'static str, Vec<String>) {
    match os {
        "macos" => ("open", vec![url.to_string()]),
        // Avoids cmd.exe, which would split the URL on '&'
        "windows" => (
            "rundll32",
            vec!["url.dll,FileProtocolHandler".to_string(), url.to_string()],
        ),
        _ => ("xdg-open", vec![url.to_string()]),
    }
}
