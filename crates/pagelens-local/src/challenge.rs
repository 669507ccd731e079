//! Anti-bot / CDN challenge page detection.
//!
//! Two rules:
//! - a trigger phrase in the page title is always a challenge;
//! - a trigger phrase in the body only counts when the body is tiny. Long legitimate pages
//!   mention "cloudflare" or "captcha" in passing; interstitials are terse.

use pagelens_core::ChallengeVerdict;

/// Bodies at or above this many bytes are never classified by content alone.
pub const SHORT_BODY_BYTES: usize = 1024;

/// Lower-case trigger phrases, checked in order (the first hit becomes the verdict label).
pub const TRIGGER_PHRASES: &[&str] = &[
    "attention required",
    "just a moment",
    "checking your browser",
    "security challenge",
    "security check",
    "human verification",
    "verify you are human",
    "are you a robot",
    "unusual traffic",
    "ddos protection",
    "cloudflare",
    "captcha",
    "проверка безопасности",
    "подтвердите, что вы не робот",
    "один момент",
];

fn first_trigger(haystack_lc: &str) -> Option<&'static str> {
    TRIGGER_PHRASES
        .iter()
        .copied()
        .find(|t| haystack_lc.contains(t))
}

/// Classify one fetched page. Deterministic, no I/O.
pub fn detect_challenge(raw_body: &str, title: &str) -> ChallengeVerdict {
    // `to_lowercase` (not ASCII-only) so the localized phrases fold too.
    let title_lc = title.to_lowercase();
    if let Some(t) = first_trigger(&title_lc) {
        return ChallengeVerdict::matched(t);
    }
    if raw_body.len() < SHORT_BODY_BYTES {
        if let Some(t) = first_trigger(&raw_body.to_lowercase()) {
            return ChallengeVerdict::matched(t);
        }
    }
    ChallengeVerdict::clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn title_trigger_wins_regardless_of_body_length() {
        let body = "x".repeat(50_000);
        let v = detect_challenge(&body, "Just a moment...");
        assert!(v.is_challenge);
        assert_eq!(v.trigger.as_deref(), Some("just a moment"));

        let v = detect_challenge(&body, "Attention Required! | Cloudflare");
        assert_eq!(v.trigger.as_deref(), Some("attention required"));
    }

    #[test]
    fn short_body_with_vendor_name_is_a_challenge() {
        let body = "<html><body>Performance &amp; security by Cloudflare</body></html>";
        let v = detect_challenge(body, "example.com");
        assert!(v.is_challenge);
        assert_eq!(v.trigger.as_deref(), Some("cloudflare"));
    }

    #[test]
    fn long_body_mentioning_vendor_is_not_a_challenge() {
        let mut body = String::from("<html><body><p>We moved our CDN to Cloudflare last year.</p>");
        body.push_str(&"<p>Lots of real article content here.</p>".repeat(100));
        body.push_str("</body></html>");
        assert!(body.len() >= SHORT_BODY_BYTES);
        let v = detect_challenge(&body, "Our infrastructure story");
        assert_eq!(v, ChallengeVerdict::clear());
    }

    #[test]
    fn localized_title_is_detected() {
        let v = detect_challenge("", "Проверка безопасности");
        assert!(v.is_challenge);
        assert_eq!(v.trigger.as_deref(), Some("проверка безопасности"));
    }

    #[test]
    fn ordinary_page_is_clear() {
        let v = detect_challenge("<html><body>Hello</body></html>", "Hello world");
        assert!(!v.is_challenge);
        assert!(v.trigger.is_none());
    }

    proptest! {
        #[test]
        fn verdict_is_deterministic(body in ".{0,2048}", title in ".{0,64}") {
            prop_assert_eq!(detect_challenge(&body, &title), detect_challenge(&body, &title));
        }

        #[test]
        fn positive_verdict_always_names_a_known_trigger(body in ".{0,2048}", title in ".{0,64}") {
            let v = detect_challenge(&body, &title);
            prop_assert_eq!(v.is_challenge, v.trigger.is_some());
            if let Some(t) = v.trigger {
                prop_assert!(TRIGGER_PHRASES.contains(&t.as_str()));
            }
        }
    }
}
