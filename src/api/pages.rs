//! Shared HTML rendering and the landing page
//!
//! No template engine: pages are small enough that a chrome function and
//! an escape helper cover the whole surface.

use axum::response::Html;
use axum::{extract::State, Extension};

use crate::auth::SessionCtx;
use crate::error::AppResult;
use crate::{db, AppState};

/// Escape text for safe interpolation into HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Drain pending flash messages for this session
pub async fn drain_flash(state: &AppState, ctx: &SessionCtx) -> AppResult<Vec<String>> {
    Ok(db::sessions::take_flash(&state.db, &ctx.id).await?)
}

/// Wrap page body in the shared chrome: nav, flash block, footer
pub fn page(title: &str, logged_in: bool, flashes: &[String], body: &str) -> Html<String> {
    let auth_links = if logged_in {
        r#"<a href="/profile">Profile</a> <a href="/logout">Logout</a>"#
    } else {
        r#"<a href="/login">Login</a> <a href="/register">Register</a>"#
    };

    let flash_block: String = flashes
        .iter()
        .map(|m| format!("<p class=\"flash\">{}</p>", escape_html(m)))
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} - wildsnap</title>
<style>
body {{ font-family: sans-serif; margin: 2em auto; max-width: 720px; }}
nav a {{ margin-right: 0.8em; }}
.flash {{ background: #fffbd1; border: 1px solid #e0d878; padding: 0.4em 0.8em; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.3em 0.6em; }}
.card {{ border: 1px solid #ddd; padding: 0.8em; margin: 0.8em 0; }}
</style>
</head>
<body>
<nav>
<a href="/">Home</a> <a href="/feed">Feed</a> <a href="/upload">Upload</a>
<a href="/history">History</a> <a href="/leaderboard">Leaderboard</a> {auth_links}
</nav>
{flash_block}
<h1>{title}</h1>
{body}
</body>
</html>"#,
        title = escape_html(title),
    ))
}

/// GET /
///
/// Public landing page with the two primary entry points.
pub async fn landing(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Html<String>> {
    let flashes = drain_flash(&state, &ctx).await?;

    let body = r#"<p>Upload a wildlife photo and find out what species it shows.</p>
<p><a href="/upload">Upload an image</a></p>
<p><a href="/history">Browse the history</a></p>"#;

    Ok(page("wildsnap", ctx.user_id.is_some(), &flashes, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_special_chars() {
        assert_eq!(
            escape_html(r#"<img src="x" onerror='a&b'>"#),
            "&lt;img src=&quot;x&quot; onerror=&#39;a&amp;b&#39;&gt;"
        );
    }

    #[test]
    fn page_renders_flash_messages_escaped() {
        let html = page("Test", false, &["<b>hi</b>".to_string()], "body");
        assert!(html.0.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(!html.0.contains("<b>hi</b>"));
    }
}
