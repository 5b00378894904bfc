use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Page operations the flow runner needs from a browser.
///
/// The production implementation is [`crate::driver::web::BrowserSession`]
/// (Playwright-backed); tests substitute a scripted fake. All selectors are
/// CSS.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate with a full page load.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Navigate by assigning `location.href`. Used as the hash-route
    /// fallback when a SPA swallows the button click.
    async fn navigate_via_js(&self, url: &str) -> Result<()>;

    /// Wait until the selector is visible. `Ok(false)` on timeout.
    async fn wait_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool>;

    /// Wait until the selector exists in the DOM, visible or not. Masked
    /// inputs are sometimes kept hidden behind an overlay.
    async fn wait_attached(&self, selector: &str, timeout_ms: u64) -> Result<bool>;

    async fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Click, with a JS `el.click()` fallback when the native click is
    /// intercepted.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Set a field value through the driver's fill primitive.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Focus the field and type character by character with an inter-key
    /// delay. Input masks often reject values that arrive in one burst.
    async fn type_chars(&self, selector: &str, value: &str, delay_ms: u64) -> Result<()>;

    /// Dispatch `input`/`change`/`blur` on the element so reactive
    /// frameworks commit the value, then press Enter.
    async fn commit_field(&self, selector: &str) -> Result<()>;

    /// Write the value through the native `HTMLInputElement` value setter
    /// and dispatch synthetic `input`/`change` events.
    async fn set_value_js(&self, selector: &str, value: &str) -> Result<()>;

    async fn focus(&self, selector: &str) -> Result<()>;

    /// Dispatch raw keydown/keypress/keyup Enter events at the document
    /// level. Last-resort commit for handlers bound above the field.
    async fn dispatch_document_enter(&self) -> Result<()>;

    async fn blur_active_element(&self) -> Result<()>;

    async fn press_enter(&self) -> Result<()>;

    /// Element text (`value`, `innerText`, or `textContent`), empty string
    /// when the element is missing.
    async fn element_text(&self, selector: &str) -> Result<String>;

    /// Whether the element is connected, has a non-zero box, and is not
    /// hidden or transparent.
    async fn is_painted(&self, selector: &str) -> Result<bool>;

    /// Flush two rendering-frame ticks so the capture does not land
    /// mid-transition.
    async fn flush_frames(&self) -> Result<()>;

    /// Whether a completed network request matches any of the URL tokens.
    async fn saw_network_match(&self, tokens: &[String]) -> Result<bool>;

    /// Full-page screenshot. Parent directories are created as needed.
    async fn screenshot(&self, path: &Path) -> Result<()>;
}
