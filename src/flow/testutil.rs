//! Scripted [`PageDriver`] fake for flow tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::driver::traits::PageDriver;

/// Records every call by method name and fails the methods it is told to
/// fail. `element_text` returns a configurable string so assertion paths can
/// be steered.
pub struct FakeDriver {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    error_text: String,
    invisible_once: Mutex<HashSet<String>>,
    failing_counts: Mutex<HashMap<String, u32>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            error_text: String::new(),
            invisible_once: Mutex::new(HashSet::new()),
            failing_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Make the named methods return errors.
    pub fn failing(mut self, methods: &[&str]) -> Self {
        self.failing = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Make the named method fail its first `n` calls, then succeed.
    pub fn failing_n(self, method: &str, n: u32) -> Self {
        self.failing_counts
            .lock()
            .unwrap()
            .insert(method.to_string(), n);
        self
    }

    /// Make `wait_visible` report the selector missing on its first wait and
    /// present afterwards.
    pub fn visible_after_retry(self, selector: &str) -> Self {
        self.invisible_once
            .lock()
            .unwrap()
            .insert(selector.to_string());
        self
    }

    /// Text returned by `element_text` for any selector.
    pub fn with_error_text(mut self, text: &str) -> Self {
        self.error_text = text.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &str) -> Result<()> {
        self.calls.lock().unwrap().push(method.to_string());
        if self.failing.contains(method) {
            bail!("{} failed (scripted)", method);
        }
        if let Some(left) = self.failing_counts.lock().unwrap().get_mut(method) {
            if *left > 0 {
                *left -= 1;
                bail!("{} failed (scripted, transient)", method);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, _url: &str) -> Result<()> {
        self.record("goto")
    }

    async fn navigate_via_js(&self, _url: &str) -> Result<()> {
        self.record("navigate_via_js")
    }

    async fn wait_visible(&self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        self.record("wait_visible")?;
        Ok(!self.invisible_once.lock().unwrap().remove(selector))
    }

    async fn wait_attached(&self, _selector: &str, _timeout_ms: u64) -> Result<bool> {
        self.record("wait_attached")?;
        Ok(true)
    }

    async fn scroll_into_view(&self, _selector: &str) -> Result<()> {
        self.record("scroll_into_view")
    }

    async fn click(&self, _selector: &str) -> Result<()> {
        self.record("click")
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<()> {
        self.record("fill")
    }

    async fn type_chars(&self, _selector: &str, _value: &str, _delay_ms: u64) -> Result<()> {
        self.record("type_chars")
    }

    async fn commit_field(&self, _selector: &str) -> Result<()> {
        self.record("commit_field")
    }

    async fn set_value_js(&self, _selector: &str, _value: &str) -> Result<()> {
        self.record("set_value_js")
    }

    async fn focus(&self, _selector: &str) -> Result<()> {
        self.record("focus")
    }

    async fn dispatch_document_enter(&self) -> Result<()> {
        self.record("dispatch_document_enter")
    }

    async fn blur_active_element(&self) -> Result<()> {
        self.record("blur_active_element")
    }

    async fn press_enter(&self) -> Result<()> {
        self.record("press_enter")
    }

    async fn element_text(&self, _selector: &str) -> Result<String> {
        self.record("element_text")?;
        Ok(self.error_text.clone())
    }

    async fn is_painted(&self, _selector: &str) -> Result<bool> {
        self.record("is_painted")?;
        Ok(true)
    }

    async fn flush_frames(&self) -> Result<()> {
        self.record("flush_frames")
    }

    async fn saw_network_match(&self, _tokens: &[String]) -> Result<bool> {
        self.record("saw_network_match")?;
        Ok(true)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.record("screenshot")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG\r\n\x1a\n")?;
        Ok(())
    }
}
