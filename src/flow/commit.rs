//! Commit ladder for masked input fields.
//!
//! Date-of-birth fields behind an input mask intercept scripted keystrokes in
//! ways that vary by page build. Three strategies are tried in a fixed order,
//! each masking a distinct failure mode:
//!
//! 1. [`CommitTier::NativeType`] - real typed entry; fails when the mask
//!    swallows script-driven keystrokes.
//! 2. [`CommitTier::JsValueSetter`] - native value-descriptor write plus
//!    synthetic events; fails when the commit handler ignores the field.
//! 3. [`CommitTier::DocumentKeyDispatch`] - document-level Enter dispatch;
//!    reaches handlers bound above the element.
//!
//! The ordering is part of the contract. A later tier runs only when the
//! previous one returned an error; nothing runs after a successful commit.

use anyhow::Result;
use colored::Colorize;

use crate::driver::traits::PageDriver;

/// One strategy in the ladder, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTier {
    NativeType,
    JsValueSetter,
    DocumentKeyDispatch,
}

pub const LADDER: [CommitTier; 3] = [
    CommitTier::NativeType,
    CommitTier::JsValueSetter,
    CommitTier::DocumentKeyDispatch,
];

/// How a masked-field entry eventually succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub tier: CommitTier,
    /// True when at least one earlier tier failed first.
    pub recovered: bool,
}

/// Set and commit `value` on a masked field, walking the ladder until one
/// tier succeeds. If every tier fails, the last tier's error propagates.
pub async fn commit_masked_field(
    driver: &dyn PageDriver,
    selector: &str,
    value: &str,
    keystroke_delay_ms: u64,
) -> Result<CommitOutcome> {
    let mut last_err = None;

    for (index, tier) in LADDER.iter().enumerate() {
        match apply_tier(driver, *tier, selector, value, keystroke_delay_ms).await {
            Ok(()) => {
                let recovered = index > 0;
                if recovered {
                    println!(
                        "  {} Entry recovered via {:?} for {}",
                        "♻️".yellow(),
                        tier,
                        selector
                    );
                }
                return Ok(CommitOutcome {
                    tier: *tier,
                    recovered,
                });
            }
            Err(e) => {
                log::warn!("{:?} entry failed for {}: {}", tier, selector, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("commit ladder is empty")))
}

async fn apply_tier(
    driver: &dyn PageDriver,
    tier: CommitTier,
    selector: &str,
    value: &str,
    keystroke_delay_ms: u64,
) -> Result<()> {
    match tier {
        CommitTier::NativeType => {
            let _ = driver.scroll_into_view(selector).await;
            driver.fill(selector, "").await?;
            driver.type_chars(selector, value, keystroke_delay_ms).await?;
            driver.commit_field(selector).await?;
        }
        CommitTier::JsValueSetter => {
            driver.set_value_js(selector, value).await?;
            let _ = driver.focus(selector).await;
            driver.commit_field(selector).await?;
        }
        CommitTier::DocumentKeyDispatch => {
            driver.set_value_js(selector, value).await?;
            driver.dispatch_document_enter().await?;
        }
    }
    Ok(())
}
