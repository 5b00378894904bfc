//! Playwright-backed browser session.
//!
//! One session (browser + context + page) is shared by every flow in a run
//! and torn down once, after the last flow, regardless of intermediate
//! failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::BrowserConfig;
use crate::driver::traits::PageDriver;

/// Launch settings derived from [`BrowserConfig`] plus executable overrides.
#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl From<&BrowserConfig> for BrowserSessionConfig {
    fn from(cfg: &BrowserConfig) -> Self {
        Self {
            headless: cfg.headless,
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
        }
    }
}

/// A live Chromium page driven through Playwright.
pub struct BrowserSession {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
}

impl BrowserSession {
    /// Initialize Playwright, launch Chromium, and open one page.
    pub async fn launch(config: BrowserSessionConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let chromium = playwright.chromium();
        let mut launcher = chromium.launcher().headless(config.headless);

        let env_path = std::env::var("CHROMIUM_EXECUTABLE_PATH")
            .ok()
            .map(std::path::PathBuf::from);
        let system_path = find_system_browser();

        if let Some(ref path) = env_path {
            println!("{} Using browser from env: {}", "🌐".blue(), path.display());
            launcher = launcher.executable(path);
        } else if let Some(ref path) = system_path {
            println!(
                "{} Using discovered browser: {}",
                "🌐".blue(),
                path.display()
            );
            launcher = launcher.executable(path);
        }

        let args: Vec<String> = [
            "--no-sandbox",
            "--disable-setuid-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--ignore-certificate-errors",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        launcher = launcher.args(&args);

        let browser = launcher.launch().await.context("Failed to launch Chromium")?;
        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
        })
    }

    /// Guaranteed teardown; safe to call on every exit path.
    pub async fn close(&self) {
        if let Err(e) = self.context.close().await {
            log::warn!("browser context close failed: {}", e);
        }
        if let Err(e) = self.browser.close().await {
            log::warn!("browser close failed: {}", e);
        }
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn navigate_via_js(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>("url => { location.href = url; }", url)
            .await?;
        Ok(())
    }

    async fn wait_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    async fn wait_attached(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let start = Instant::now();
        loop {
            let attached: bool = {
                let page = self.page.lock().await;
                page.evaluate(
                    "sel => document.querySelector(sel) !== null",
                    selector,
                )
                .await?
            };
            if attached {
                return Ok(true);
            }
            if start.elapsed().as_millis() >= timeout_ms as u128 {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        if let Some(el) = page.query_selector(selector).await? {
            el.scroll_into_view_if_needed(None).await?;
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        if page.click_builder(selector).click().await.is_ok() {
            return Ok(());
        }
        // Native click intercepted; scroll to center and click via JS.
        page.evaluate::<_, ()>(
            r#"sel => {
                const el = document.querySelector(sel);
                if (!el) throw new Error('Element not found for selector: ' + sel);
                el.scrollIntoView({ block: 'center' });
                el.click();
            }"#,
            selector,
        )
        .await
        .with_context(|| format!("Failed to click: {}", selector))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        let el = page
            .query_selector(selector)
            .await?
            .with_context(|| format!("Element not found for selector: {}", selector))?;
        el.fill_builder(value).fill().await?;
        Ok(())
    }

    async fn type_chars(&self, selector: &str, value: &str, delay_ms: u64) -> Result<()> {
        {
            let page = self.page.lock().await;
            page.click_builder(selector).click().await?;
        }
        for ch in value.chars() {
            let page = self.page.lock().await;
            page.keyboard.input_text(&ch.to_string()).await?;
            drop(page);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(())
    }

    async fn commit_field(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            r#"sel => {
                const el = document.querySelector(sel);
                if (!el) throw new Error('Element not found for selector: ' + sel);
                el.dispatchEvent(new Event('input', { bubbles: true }));
                el.dispatchEvent(new Event('change', { bubbles: true }));
                el.dispatchEvent(new Event('blur', { bubbles: true }));
            }"#,
            selector,
        )
        .await?;
        // Workaround for binding issue with press(): use down + up.
        page.keyboard.down("Enter").await?;
        page.keyboard.up("Enter").await?;
        Ok(())
    }

    async fn set_value_js(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            r#"([sel, val]) => {
                const el = document.querySelector(sel);
                if (!el) throw new Error('Element not found for selector: ' + sel);
                try { el.focus(); } catch (e) {}
                const nativeDescriptor = Object.getOwnPropertyDescriptor(
                    window.HTMLInputElement.prototype, 'value');
                if (nativeDescriptor && nativeDescriptor.set) {
                    nativeDescriptor.set.call(el, val);
                } else {
                    el.value = val;
                }
                el.dispatchEvent(new Event('input', { bubbles: true }));
                el.dispatchEvent(new Event('change', { bubbles: true }));
            }"#,
            json!([selector, value]),
        )
        .await?;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            "sel => { const el = document.querySelector(sel); if (el) el.focus(); }",
            selector,
        )
        .await?;
        Ok(())
    }

    async fn dispatch_document_enter(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            r#"() => {
                const opts = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true };
                document.dispatchEvent(new KeyboardEvent('keydown', opts));
                document.dispatchEvent(new KeyboardEvent('keypress', opts));
                document.dispatchEvent(new KeyboardEvent('keyup', opts));
            }"#,
            (),
        )
        .await?;
        Ok(())
    }

    async fn blur_active_element(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            "() => { if (document.activeElement && document.activeElement.blur) document.activeElement.blur(); }",
            (),
        )
        .await?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.keyboard.down("Enter").await?;
        page.keyboard.up("Enter").await?;
        Ok(())
    }

    async fn element_text(&self, selector: &str) -> Result<String> {
        let page = self.page.lock().await;
        let text: String = page
            .evaluate(
                r#"sel => {
                    const el = document.querySelector(sel);
                    if (!el) return '';
                    return el.value || el.innerText || el.textContent || '';
                }"#,
                selector,
            )
            .await?;
        Ok(text)
    }

    async fn is_painted(&self, selector: &str) -> Result<bool> {
        let page = self.page.lock().await;
        let painted: bool = page
            .evaluate(
                r#"sel => {
                    const el = document.querySelector(sel);
                    if (!el || !el.isConnected) return false;
                    const s = getComputedStyle(el);
                    return el.offsetParent !== null
                        && el.offsetHeight > 0 && el.offsetWidth > 0
                        && s.visibility !== 'hidden'
                        && s.display !== 'none'
                        && parseFloat(s.opacity || '1') > 0.01;
                }"#,
                selector,
            )
            .await?;
        Ok(painted)
    }

    async fn flush_frames(&self) -> Result<()> {
        let page = self.page.lock().await;
        page.evaluate::<_, ()>(
            "() => new Promise(r => requestAnimationFrame(() => requestAnimationFrame(r)))",
            (),
        )
        .await?;
        Ok(())
    }

    async fn saw_network_match(&self, tokens: &[String]) -> Result<bool> {
        let page = self.page.lock().await;
        let seen: bool = page
            .evaluate(
                r#"tokens => {
                    const entries = performance.getEntriesByType('resource');
                    return entries.some(e => {
                        const url = (e.name || '').toLowerCase();
                        const fetched = e.initiatorType === 'fetch'
                            || e.initiatorType === 'xmlhttprequest';
                        return fetched && tokens.some(t => url.includes(t));
                    });
                }"#,
                json!(tokens),
            )
            .await?;
        Ok(seen)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let page = self.page.lock().await;
        page.screenshot_builder()
            .path(path.to_path_buf())
            .full_page(true)
            .screenshot()
            .await?;
        Ok(())
    }
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        // macOS - prioritize Google Chrome first
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        // Linux - prioritize Google Chrome first
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        // Fallback to Chromium
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    for path in common_paths {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }
    None
}
