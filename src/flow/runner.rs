//! Flow orchestration.
//!
//! Runs each flow to the expected validation error, captures a screenshot,
//! and sends one report email covering the whole run. The browser session is
//! owned by the caller so it can be closed even when a flow fails.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use colored::Colorize;
use uuid::Uuid;

use crate::config::Config;
use crate::driver::traits::PageDriver;
use crate::error::FlowError;
use crate::flow::commit::commit_masked_field;
use crate::flow::spec::{FlowSpec, Selectors};
use crate::flow::verify::{assert_error_text, normalize_ws};
use crate::report::email::{build_report_message, EmailSection};
use crate::report::json;
use crate::report::smtp::Mailer;
use crate::report::types::{FlowResult, FlowStatus, RunReport};

/// Shorter budget for the first terms-checkbox wait; the direct terms URL is
/// tried if this expires.
const TERMS_FIRST_WAIT_MS: u64 = 20_000;
/// Settle delay after committing the ID field (ms).
const ID_SETTLE_MS: u64 = 400;
/// Budget for the verify-request poll after the assertion (ms).
const NETWORK_POLL_BUDGET_MS: u64 = 10_000;
const NETWORK_POLL_STEP_MS: u64 = 500;
/// Budget for the error-tip paint poll before the screenshot (ms).
const PAINT_POLL_BUDGET_MS: u64 = 5_000;
const PAINT_POLL_STEP_MS: u64 = 250;

const SCREENSHOT_RETRIES: u32 = 3;
const SCREENSHOT_RETRY_DELAY_MS: u64 = 400;
/// Best-effort evidence capture on the failure path is cheaper.
const FAILURE_SCREENSHOT_RETRIES: u32 = 2;
const FAILURE_SCREENSHOT_DELAY_MS: u64 = 300;

async fn screenshot_with_retry(
    driver: &dyn PageDriver,
    path: &Path,
    retries: u32,
    delay_ms: u64,
) -> Result<(), FlowError> {
    for attempt in 1..=retries {
        match driver.screenshot(path).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "screenshot attempt {}/{} failed for {}: {}",
                    attempt,
                    retries,
                    path.display(),
                    e
                );
            }
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    // One last unconditional attempt; its error is the one that surfaces.
    driver
        .screenshot(path)
        .await
        .map_err(|e| FlowError::Screenshot(e.to_string()))
}

async fn require_visible(
    driver: &dyn PageDriver,
    selector: &str,
    timeout_ms: u64,
) -> Result<()> {
    if !driver.wait_visible(selector, timeout_ms).await? {
        return Err(FlowError::ElementNotFound {
            selector: selector.to_string(),
            timeout_ms,
        }
        .into());
    }
    Ok(())
}

/// Wait for the error tip to stop animating before capturing. Best effort;
/// the capture proceeds on expiry.
async fn wait_for_stable_paint(driver: &dyn PageDriver, selector: &str) {
    let deadline = Instant::now() + Duration::from_millis(PAINT_POLL_BUDGET_MS);
    loop {
        match driver.is_painted(selector).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                log::warn!("paint check failed for {}: {}", selector, e);
                break;
            }
        }
        if Instant::now() >= deadline {
            log::warn!("{} never reported painted, capturing anyway", selector);
            break;
        }
        tokio::time::sleep(Duration::from_millis(PAINT_POLL_STEP_MS)).await;
    }
    let _ = driver.flush_frames().await;
}

/// Poll for a completed request to the verify endpoint. Best effort.
async fn wait_for_verify_request(driver: &dyn PageDriver, hint: &str) {
    let tokens: Vec<String> = hint
        .split('|')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();
    if tokens.is_empty() {
        return;
    }
    let deadline = Instant::now() + Duration::from_millis(NETWORK_POLL_BUDGET_MS);
    loop {
        match driver.saw_network_match(&tokens).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                log::warn!("verify-request poll failed: {}", e);
                return;
            }
        }
        if Instant::now() >= deadline {
            log::warn!("no request matching {:?} observed, continuing", tokens);
            return;
        }
        tokio::time::sleep(Duration::from_millis(NETWORK_POLL_STEP_MS)).await;
    }
}

/// Drive one flow from the splash page to the expected validation error and
/// capture its screenshot. Returns the observed (normalized) error text.
pub async fn run_flow(
    driver: &dyn PageDriver,
    cfg: &Config,
    spec: &FlowSpec,
    selectors: &Selectors,
) -> Result<String> {
    let timeout = cfg.browser.default_timeout_ms;

    println!("\n{} {}", "▶".cyan(), spec.title.bold());
    println!("  {} Opening {}", "🌐".blue(), spec.start_url);
    driver.goto(&spec.start_url).await?;

    // Splash page: the per-flow claim button.
    require_visible(driver, &spec.claim_button, timeout).await?;
    let _ = driver.scroll_into_view(&spec.claim_button).await;
    driver.click(&spec.claim_button).await?;

    // Terms page. SPA hash routing sometimes swallows the click, so fall
    // back to navigating straight to the terms URL.
    if !driver
        .wait_visible(&selectors.terms_checkbox, TERMS_FIRST_WAIT_MS)
        .await?
    {
        println!(
            "  {} Terms checkbox not found, routing directly to {}",
            "↩".yellow(),
            spec.terms_url
        );
        driver.navigate_via_js(&spec.terms_url).await?;
        require_visible(driver, &selectors.terms_checkbox, timeout).await?;
    }
    driver.click(&selectors.terms_checkbox).await?;

    require_visible(driver, &spec.continue_button, timeout).await?;
    driver.click(&spec.continue_button).await?;

    // Identity entry: pick the ID document type, then fill the ID number.
    require_visible(driver, &selectors.id_toggle, timeout).await?;
    driver.click(&selectors.id_toggle).await?;

    require_visible(driver, &selectors.id_input, timeout).await?;
    driver.click(&selectors.id_input).await?;
    driver.fill(&selectors.id_input, "").await?;
    driver.fill(&selectors.id_input, &cfg.inputs.claim_id).await?;
    // The ID field commits on blur; a rejection here is not fatal because
    // the DOB commit below re-triggers validation.
    if let Err(e) = driver.commit_field(&selectors.id_input).await {
        log::warn!("ID field commit rejected: {}", e);
    }
    tokio::time::sleep(Duration::from_millis(ID_SETTLE_MS)).await;

    // The masked DOB field may stay hidden behind an overlay until focused.
    if !driver.wait_attached(&selectors.dob_input, timeout).await? {
        return Err(FlowError::ElementNotFound {
            selector: selectors.dob_input.clone(),
            timeout_ms: timeout,
        }
        .into());
    }
    let outcome = commit_masked_field(
        driver,
        &selectors.dob_input,
        &cfg.inputs.claim_dob,
        cfg.inputs.keystroke_delay_ms,
    )
    .await?;
    log::debug!("DOB committed via {:?}", outcome.tier);

    // The sentinel inputs are unregistered, so the portal must reject them.
    let observed = if driver
        .wait_visible(&selectors.error_text, timeout)
        .await?
    {
        normalize_ws(&driver.element_text(&selectors.error_text).await?)
    } else {
        println!(
            "  {} No error tip appeared within {}ms",
            "⚠".yellow(),
            timeout
        );
        String::new()
    };
    assert_error_text(&cfg.inputs.expected_error_text, &observed)?;
    println!("  {} Validation error matched", "✔".green());

    // Settle before capture: re-commit both fields, drop focus, and wait for
    // the verify round trip and a stable paint of the error tip.
    let _ = driver.commit_field(&selectors.id_input).await;
    let _ = driver.commit_field(&selectors.dob_input).await;
    let _ = driver.blur_active_element().await;
    let _ = driver.press_enter().await;
    wait_for_verify_request(driver, &cfg.inputs.verify_url_hint).await;
    wait_for_stable_paint(driver, &selectors.error_text).await;
    if cfg.inputs.post_assert_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(cfg.inputs.post_assert_delay_ms)).await;
    }

    screenshot_with_retry(
        driver,
        Path::new(&spec.screenshot_path),
        SCREENSHOT_RETRIES,
        SCREENSHOT_RETRY_DELAY_MS,
    )
    .await?;
    println!("  {} Screenshot saved to {}", "📸".green(), spec.screenshot_path);

    Ok(observed)
}

/// Run every flow sequentially, email the combined report per the configured
/// policy, and write the JSON results dump. Fails (after the email) when any
/// flow failed.
pub async fn run_all(
    driver: &dyn PageDriver,
    mailer: &dyn Mailer,
    cfg: &Config,
    flows: &[FlowSpec],
) -> Result<Vec<FlowResult>> {
    if flows.is_empty() {
        bail!("no flows selected");
    }
    let selectors = Selectors::default();
    let session_id = Uuid::new_v4().simple().to_string();
    let mut results = Vec::with_capacity(flows.len());

    for spec in flows {
        let started = Instant::now();
        let result = match run_flow(driver, cfg, spec, &selectors).await {
            Ok(observed) => FlowResult {
                title: spec.title.clone(),
                status: FlowStatus::Passed,
                observed_error: observed,
                failure_reason: None,
                screenshot_path: spec.screenshot_path.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => {
                println!("  {} {}: {}", "✘".red(), spec.title, e);
                // Evidence capture for the email; the page may be gone, so
                // failures here are logged only.
                if let Err(shot_err) = screenshot_with_retry(
                    driver,
                    Path::new(&spec.screenshot_path),
                    FAILURE_SCREENSHOT_RETRIES,
                    FAILURE_SCREENSHOT_DELAY_MS,
                )
                .await
                {
                    log::warn!("failure screenshot not captured: {}", shot_err);
                }
                let observed = match e.downcast_ref::<FlowError>() {
                    Some(FlowError::AssertionMismatch { actual, .. }) => actual.clone(),
                    _ => String::new(),
                };
                FlowResult {
                    title: spec.title.clone(),
                    status: FlowStatus::Failed,
                    observed_error: observed,
                    failure_reason: Some(e.to_string()),
                    screenshot_path: spec.screenshot_path.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        };
        results.push(result);
    }

    let any_fail = results.iter().any(|r| !r.passed());
    let should_email =
        cfg.email.always_email || (any_fail && cfg.email.email_on_failure);

    if should_email {
        match send_report(mailer, cfg, flows, &results, any_fail) {
            Ok(()) => println!("{} Report email sent", "✉".green()),
            Err(e) if any_fail => {
                // Keep the flow failure as the run's error.
                log::error!("report email not sent: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let report = RunReport::new(&session_id, results.clone());
    let report_dir = Path::new(&flows[0].screenshot_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("screenshots"))
        .to_path_buf();
    if let Err(e) = json::write_report(&report, &report_dir) {
        log::warn!("JSON report not written: {}", e);
    }

    if any_fail {
        let reasons: Vec<String> = results
            .iter()
            .filter(|r| !r.passed())
            .map(|r| {
                format!(
                    "{}: {}",
                    r.title,
                    r.failure_reason.as_deref().unwrap_or("unknown failure")
                )
            })
            .collect();
        bail!("{} flow(s) failed\n{}", reasons.len(), reasons.join("\n"));
    }

    Ok(results)
}

fn send_report(
    mailer: &dyn Mailer,
    cfg: &Config,
    flows: &[FlowSpec],
    results: &[FlowResult],
    any_fail: bool,
) -> Result<(), FlowError> {
    let sender = cfg.email.sender()?;
    let subject = format!(
        "{} [{}]",
        cfg.email.subject,
        if any_fail { "FAILED" } else { "PASSED" }
    );
    let sections: Vec<EmailSection> = flows
        .iter()
        .zip(results.iter())
        .map(|(spec, result)| EmailSection {
            title: result.title.clone(),
            status: result.status,
            html_intro: spec.html_intro.clone(),
            observed_error: result.observed_error.clone(),
            failure_reason: result.failure_reason.clone(),
            image_path: result.screenshot_path.clone(),
        })
        .collect();

    let message = build_report_message(&sender, &subject, &cfg.email.text_body, &sections)?;
    mailer.send(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowserConfig, EmailConfig, InputConfig};
    use crate::flow::testutil::FakeDriver;
    use lettre::Message;
    use std::sync::Mutex;

    struct FakeMailer {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeMailer {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for FakeMailer {
        fn send(&self, message: &Message) -> Result<(), FlowError> {
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&message.formatted()).into_owned());
            if self.fail {
                return Err(FlowError::Mail("relay refused (scripted)".to_string()));
            }
            Ok(())
        }
    }

    fn test_config(always_email: bool, email_on_failure: bool) -> Config {
        Config {
            browser: BrowserConfig {
                headless: true,
                viewport_width: 1920,
                viewport_height: 1080,
                default_timeout_ms: 1000,
            },
            inputs: InputConfig {
                claim_id: "A0000000".to_string(),
                claim_dob: "01/01/1990".to_string(),
                expected_error_text: "does not match our records".to_string(),
                keystroke_delay_ms: 0,
                post_assert_delay_ms: 0,
                verify_url_hint: "verify|validate".to_string(),
            },
            email: EmailConfig {
                smtp_username: Some("bot@example.com".to_string()),
                smtp_password: Some("secret".to_string()),
                to_email: Some("team@example.com".to_string()),
                relay_host: "smtp.gmail.com".to_string(),
                use_implicit_tls: false,
                always_email,
                email_on_failure,
                subject: "Health Check".to_string(),
                text_body: "plain fallback".to_string(),
            },
        }
    }

    fn test_flow(dir: &Path) -> FlowSpec {
        FlowSpec {
            title: "Outpatients Claims".to_string(),
            start_url: "https://www.claimsimple.hk/#/".to_string(),
            terms_url: "https://www.claimsimple.hk/#/tnc".to_string(),
            claim_button: ".splash__body_search-doctor".to_string(),
            continue_button: ".button-doctorsearch-continue".to_string(),
            screenshot_path: dir.join("shot_1.png").to_string_lossy().into_owned(),
            html_intro: "Hi Team,".to_string(),
        }
    }

    fn temp_dir() -> std::path::PathBuf {
        let dir =
            std::env::temp_dir().join(format!("claimwatch_runner_{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_passing_run_captures_and_emails_once() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text(
            "The information you provided does not match our records. Please try again.",
        );
        let mailer = FakeMailer::new();
        let cfg = test_config(true, true);
        let flows = vec![test_flow(&dir)];

        let results = run_all(&driver, &mailer, &cfg, &flows).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].passed());
        assert!(Path::new(&flows[0].screenshot_path).exists());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("[PASSED]"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_wrong_error_text_fails_after_emailing() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("Invalid request");
        let mailer = FakeMailer::new();
        let cfg = test_config(true, true);
        let flows = vec![test_flow(&dir)];

        let err = run_all(&driver, &mailer, &cfg, &flows).await.unwrap_err();
        assert!(err.to_string().contains("flow(s) failed"));
        assert!(err.to_string().contains("expected error text not found"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("FAILED"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_no_email_when_policy_disabled() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("does not match our records");
        let mailer = FakeMailer::new();
        let cfg = test_config(false, false);
        let flows = vec![test_flow(&dir)];

        run_all(&driver, &mailer, &cfg, &flows).await.unwrap();
        assert!(mailer.sent().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_failure_only_policy_skips_email_on_pass() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("does not match our records");
        let mailer = FakeMailer::new();
        let cfg = test_config(false, true);
        let flows = vec![test_flow(&dir)];

        run_all(&driver, &mailer, &cfg, &flows).await.unwrap();
        assert!(mailer.sent().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_failure_only_policy_emails_on_fail() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("Invalid request");
        let mailer = FakeMailer::new();
        let cfg = test_config(false, true);
        let flows = vec![test_flow(&dir)];

        run_all(&driver, &mailer, &cfg, &flows).await.unwrap_err();
        assert_eq!(mailer.sent().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_mail_error_does_not_mask_flow_failure() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("Invalid request");
        let mailer = FakeMailer::failing();
        let cfg = test_config(true, true);
        let flows = vec![test_flow(&dir)];

        let err = run_all(&driver, &mailer, &cfg, &flows).await.unwrap_err();
        assert!(err.to_string().contains("expected error text not found"));
        assert!(!err.to_string().contains("relay refused"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_mail_error_propagates_on_passing_run() {
        let dir = temp_dir();
        let driver = FakeDriver::new().with_error_text("does not match our records");
        let mailer = FakeMailer::failing();
        let cfg = test_config(true, true);
        let flows = vec![test_flow(&dir)];

        let err = run_all(&driver, &mailer, &cfg, &flows).await.unwrap_err();
        assert!(err.to_string().contains("relay refused"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_screenshot_retry_recovers_from_transient_failures() {
        let dir = temp_dir();
        let path = dir.join("retry.png");
        let driver = FakeDriver::new().failing_n("screenshot", 2);

        screenshot_with_retry(&driver, &path, 3, 0).await.unwrap();

        let attempts = driver.calls().iter().filter(|c| *c == "screenshot").count();
        assert_eq!(attempts, 3);
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_screenshot_retry_exhaustion_propagates_final_error() {
        let dir = temp_dir();
        let path = dir.join("retry.png");
        let driver = FakeDriver::new().failing(&["screenshot"]);

        let err = screenshot_with_retry(&driver, &path, 3, 0).await.unwrap_err();
        assert!(matches!(err, FlowError::Screenshot(_)));

        // The bounded attempts plus the final unconditional one.
        let attempts = driver.calls().iter().filter(|c| *c == "screenshot").count();
        assert_eq!(attempts, 4);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_terms_fallback_routes_directly() {
        let dir = temp_dir();
        let driver = FakeDriver::new()
            .with_error_text("does not match our records")
            .visible_after_retry("input.ui-checkbox__input[name=\"terms\"]");
        let cfg = test_config(false, false);
        let flows = vec![test_flow(&dir)];
        let mailer = FakeMailer::new();

        run_all(&driver, &mailer, &cfg, &flows).await.unwrap();
        assert!(driver.calls().contains(&"navigate_via_js".to_string()));

        std::fs::remove_dir_all(&dir).ok();
    }
}
