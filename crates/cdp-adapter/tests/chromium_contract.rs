//! Contract tests against a real Chromium binary. Ignored by default
//! because they need a browser on the host.

use std::env;
use std::time::Duration;

use cdp_adapter::chromium::ChromiumLauncher;
use cdp_adapter::config::CdpConfig;
use cdp_adapter::{ElementQuery, LaunchOptions, LocatorRule, SessionLauncher};

const PAGE: &str = "data:text/html,<button onclick=\"document.title='clicked'\">Remix</button>\
<label>E-mail <input id='email' aria-label='E-mail'></label>";

fn contract_enabled() -> bool {
    env::var("REMIXPILOT_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn role(role: &str, name: &str) -> ElementQuery {
    ElementQuery::new(LocatorRule::Role {
        role: role.into(),
        name: name.into(),
        exact: false,
    })
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set REMIXPILOT_CDP_CONTRACT=1"]
async fn contract_probe_click_and_fill() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (REMIXPILOT_CDP_CONTRACT not enabled)");
        return;
    }

    let launcher = ChromiumLauncher::new(CdpConfig::default());
    let session = launcher
        .launch(&LaunchOptions { headless: true })
        .await
        .expect("launch chromium");
    let page = session.page();

    page.navigate(PAGE, Duration::from_secs(15))
        .await
        .expect("navigate succeeds");

    let probe = page
        .probe(&role("button", "Remix"))
        .await
        .expect("probe succeeds")
        .expect("button visible");
    assert_eq!(probe.tag.to_ascii_lowercase(), "button");

    page.click(&role("button", "Remix")).await.expect("click succeeds");
    page.fill(&role("textbox", "E-mail"), "user@example.test")
        .await
        .expect("fill succeeds");

    assert!(page
        .probe(&role("button", "Publish"))
        .await
        .expect("probe succeeds")
        .is_none());
    assert!(page.current_url().await.expect("url").starts_with("data:"));

    session.close().await.expect("close");
    session.close().await.expect("second close is a no-op");
}
