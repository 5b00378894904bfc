//! Built-in flow definitions for the eClaims portal.

use chrono::Local;

use crate::config::default_screenshot_path;

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// CSS selectors shared by every flow. The claim and continue buttons differ
/// per flow and live on [`FlowSpec`].
#[derive(Debug, Clone)]
pub struct Selectors {
    pub terms_checkbox: String,
    pub id_toggle: String,
    pub id_input: String,
    pub dob_input: String,
    pub error_text: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            terms_checkbox: r#"input.ui-checkbox__input[name="terms"]"#.to_string(),
            id_toggle: ".ui-selection__symbol".to_string(),
            // First .qna__input in the flow is the ID field
            id_input: ".qna__input".to_string(),
            dob_input: "input[name='dob']".to_string(),
            error_text: ".error-tip-text".to_string(),
        }
    }
}

/// One claim-entry scenario: where it starts, how it reaches the terms page,
/// and which buttons drive it.
#[derive(Debug, Clone)]
pub struct FlowSpec {
    pub title: String,
    pub start_url: String,
    /// Direct route to the terms page, used when the claim-button click does
    /// not surface the checkbox.
    pub terms_url: String,
    pub claim_button: String,
    pub continue_button: String,
    pub screenshot_path: String,
    /// Raw HTML intro for this flow's email section. May contain escaped
    /// entities from the environment; unescaped at render time.
    pub html_intro: String,
}

/// The three portal flows, in their fixed order, with environment overrides.
pub fn builtin_flows() -> Vec<FlowSpec> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    let intro = |heading: &str| {
        format!(
            "Hi Team,<br/><br/>Good day!<br/><br/><strong>{}:</strong><br/><em>Timestamp: {}</em>",
            heading, now
        )
    };

    vec![
        FlowSpec {
            title: "Outpatients Claims".to_string(),
            start_url: env_string("CS_HK_URL1", "https://www.claimsimple.hk/#/"),
            terms_url: env_string("TNC_EMC_URL1", "https://www.claimsimple.hk/#/tnc"),
            claim_button: ".splash__body_search-doctor".to_string(),
            continue_button: ".button-primary.button-primary--full.button-doctorsearch-continue"
                .to_string(),
            screenshot_path: env_string("SCREENSHOT_PATH1", &default_screenshot_path(0)),
            html_intro: env_string("BODY1", &intro("OUTPATIENTS CLAIMS")),
        },
        FlowSpec {
            title: "My Medical Card".to_string(),
            start_url: env_string("CS_HK_URL2", "https://www.claimsimple.hk/#/"),
            terms_url: env_string("TNC_EMC_URL2", "https://www.claimsimple.hk/eMedicalCard#"),
            claim_button: ".splash__body_get-emedicard".to_string(),
            continue_button: ".button-primary.button-primary--full.button-emedicalcard-continue"
                .to_string(),
            screenshot_path: env_string("SCREENSHOT_PATH2", &default_screenshot_path(1)),
            html_intro: env_string("BODY2", &intro("MY MEDICAL CARD")),
        },
        FlowSpec {
            title: "Find My Doctor".to_string(),
            start_url: env_string("CS_HK_URL3", "https://www.claimsimple.hk/#/"),
            terms_url: env_string("TNC_EMC_URL3", "https://www.claimsimple.hk/DoctorSearch#/"),
            claim_button: ".splash__body_make-claim".to_string(),
            continue_button: ".button-primary.button-primary--full.button-doctorsearch-continue"
                .to_string(),
            screenshot_path: env_string("SCREENSHOT_PATH3", &default_screenshot_path(2)),
            html_intro: env_string("BODY3", &intro("FIND MY DOCTOR")),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_flows_are_ordered() {
        let flows = builtin_flows();
        assert_eq!(flows.len(), 3);
        assert_eq!(flows[0].title, "Outpatients Claims");
        assert_eq!(flows[1].title, "My Medical Card");
        assert_eq!(flows[2].title, "Find My Doctor");
    }

    #[test]
    fn test_flow_buttons_differ_per_flow() {
        let flows = builtin_flows();
        assert_ne!(flows[0].claim_button, flows[1].claim_button);
        assert_ne!(flows[1].continue_button, flows[2].continue_button);
    }
}
