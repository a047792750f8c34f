//! HTML pages rendered to the browser driving the handshake.
//!
//! Everything here is static or interpolates provider-issued identifiers;
//! nothing user-controlled is echoed back without going through the
//! handshake first.

use crate::types::AccessToken;

const STYLE: &str = "font-family: sans-serif; text-align: center; padding: 50px;";

fn shell(title: &str, body: &str) -> String {
    format!(
        r#"<html>
    <head><title>{title}</title></head>
    <body style="{STYLE}">
{body}
    </body>
</html>"#
    )
}

/// Landing page: a single button that kicks off the flow.
pub fn landing() -> String {
    shell(
        "Birdkey",
        r#"        <h1>Link a Twitter account</h1>
        <p>Authorize this application to obtain posting credentials.</p>
        <button id="start">Start authorization</button>
        <script>
            document.getElementById('start').addEventListener('click', function() {
                fetch('/start')
                    .then(function(response) { return response.text(); })
                    .then(function(html) { document.body.innerHTML = html; });
            });
        </script>"#,
    )
}

/// Rendered after the request token is issued: the user follows the link to
/// the provider's authorization page.
pub fn authorize_redirect(auth_url: &str) -> String {
    shell(
        "Continue to authorization",
        &format!(
            r#"        <h1>Continue to <a href="{auth_url}">Twitter authorization</a></h1>
        <p>If you are not redirected, click the link above.</p>"#
        ),
    )
}

/// Success page showing the durable credentials.
pub fn tokens_issued(access: &AccessToken) -> String {
    shell(
        "Authorization successful",
        &format!(
            r#"        <h1>Your OAuth tokens</h1>
        <p><strong>Access token:</strong> {}</p>
        <p><strong>Access token secret:</strong> {}</p>
        <p>Hand these to the posting pipeline for the authorized account.</p>"#,
            access.token, access.secret
        ),
    )
}

/// The user declined authorization at the provider.
pub fn denied() -> String {
    shell(
        "Authorization denied",
        r#"        <h1>Authorization was denied.</h1>
        <p>No credentials were issued. Start over from the landing page to try again.</p>"#,
    )
}

/// The tunnel has not produced a public callback URL yet.
pub fn not_ready() -> String {
    shell(
        "Not ready",
        r#"        <h1>Callback URL not ready yet.</h1>
        <p>The public tunnel is still connecting. Wait a moment and try again.</p>"#,
    )
}

/// Callback named a token this process does not know.
pub fn token_not_found() -> String {
    shell(
        "Token not found",
        r#"        <h1>Request token not found.</h1>
        <p>It may have expired or already been used. Start over from the landing page.</p>"#,
    )
}

/// Callback arrived without the parameters the exchange needs.
pub fn missing_params() -> String {
    shell(
        "Missing parameters",
        r#"        <h1>Missing OAuth parameters in the callback.</h1>
        <p>Start over from the landing page.</p>"#,
    )
}

/// Generic failure page for provider or transport errors.
pub fn flow_failed(detail: &str) -> String {
    shell(
        "Authorization failed",
        &format!(
            r#"        <h1>Authorization failed.</h1>
        <p>{detail}</p>
        <p>Start over from the landing page to try again.</p>"#
        ),
    )
}

/// Unmatched route.
pub fn not_found() -> String {
    shell("Not found", "        <h1>Page not found</h1>")
}
