//! Reply attachment handling.
//!
//! Files attached to a thread reply live behind the platform's authenticated
//! download URLs. With a bot credential configured they are fetched into a
//! local directory and their paths appended to the reply text; without one,
//! each file degrades to a textual placeholder. Neither path is ever a hard
//! failure; the reply text itself must still reach the terminal.

use std::path::Path;

/// One file attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// Authenticated download URL.
    pub url: String,
}

/// Append attachment paths (or placeholders) to the reply text.
pub async fn augment_with_attachments(
    client: &reqwest::Client,
    bot_token: Option<&str>,
    text: &str,
    attachments: &[Attachment],
    download_dir: &Path,
) -> String {
    if attachments.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for attachment in attachments {
        let suffix = match bot_token {
            Some(token) => match download(client, token, attachment, download_dir).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(name = %attachment.name, error = %e, "attachment download failed");
                    placeholder(attachment)
                }
            },
            None => {
                tracing::warn!(
                    name = %attachment.name,
                    "no bot credential configured; passing attachment as placeholder"
                );
                placeholder(attachment)
            }
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&suffix);
    }
    out
}

fn placeholder(attachment: &Attachment) -> String {
    format!("[attachment: {}]", attachment.name)
}

async fn download(
    client: &reqwest::Client,
    token: &str,
    attachment: &Attachment,
    download_dir: &Path,
) -> Result<String, String> {
    let resp = client
        .get(&attachment.url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("download answered {}", resp.status()));
    }
    let data = resp.bytes().await.map_err(|e| e.to_string())?;

    std::fs::create_dir_all(download_dir).map_err(|e| e.to_string())?;
    let path = download_dir.join(safe_file_name(&attachment.name));
    std::fs::write(&path, &data).map_err(|e| e.to_string())?;
    Ok(path.display().to_string())
}

/// Flatten a platform-supplied file name to something safe to create
/// locally: path separators and parent references must not survive.
fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}
