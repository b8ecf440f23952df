//! Deterministic answers for when no live model responds.
//!
//! A keyword → guidance table, scanned in order; the first entry with a
//! keyword in the message wins. Urgent topics come first so "chest pain and
//! a headache" gets the chest-pain guidance.

use crate::cache::normalize;

/// Appended to every fallback answer.
pub const DISCLAIMER: &str = "This general guidance was not generated by a live model because \
our AI service is temporarily unavailable. It is not a diagnosis. Please consult a doctor or \
other qualified healthcare professional about your situation, and contact emergency services \
if your symptoms are severe or worsening.";

/// Used when no table entry matches.
pub const GENERIC_GUIDANCE: &str = "We could not generate a personalised answer right now. \
For any health concern, please seek professional care: contact your doctor, a pharmacist or \
a local clinic for advice, and call emergency services straight away for severe symptoms \
such as difficulty breathing, chest pain, confusion or heavy bleeding.";

/// One row of the guidance table.
#[derive(Debug, Clone, Copy)]
pub struct CannedGuidance {
    pub topic: &'static str,
    /// Lowercase keywords, matched at word starts. A trailing space makes a
    /// keyword whole-word only.
    pub keywords: &'static [&'static str],
    pub guidance: &'static str,
}

pub const GUIDANCE_TABLE: &[CannedGuidance] = &[
    CannedGuidance {
        topic: "chest_pain",
        keywords: &["chest pain", "chest tightness", "heart attack", "angina"],
        guidance: "Chest pain can be a sign of a medical emergency. If the pain is severe, \
spreads to your arm, jaw or back, or comes with shortness of breath, sweating or nausea, \
call emergency services immediately. Do not drive yourself to hospital.",
    },
    CannedGuidance {
        topic: "breathing",
        keywords: &["shortness of breath", "can't breathe", "cannot breathe", "breathless", "wheez"],
        guidance: "Sudden or severe difficulty breathing needs urgent medical attention; call \
emergency services. For milder breathlessness, sit upright, stay calm, use any prescribed \
inhaler as directed and arrange to see a doctor soon.",
    },
    CannedGuidance {
        topic: "headache",
        keywords: &["headache", "migraine", "head ache", "head pain"],
        guidance: "For a common headache, rest in a quiet, dark room, drink water, and \
consider an over-the-counter pain reliever such as paracetamol or ibuprofen as directed on \
the label. Seek urgent care for a sudden severe headache, or one with fever, stiff neck, \
confusion, weakness or vision changes.",
    },
    CannedGuidance {
        topic: "fever",
        keywords: &["fever", "temperature", "feverish", "chills"],
        guidance: "For a fever, rest, drink plenty of fluids and dress in light clothing. \
Paracetamol or ibuprofen can reduce discomfort when taken as directed. See a doctor if the \
fever lasts more than three days, is above 39.4°C (103°F), or comes with a rash, stiff neck, \
breathing difficulty or confusion.",
    },
    CannedGuidance {
        topic: "cough",
        keywords: &["cough", "coughing", "phlegm"],
        guidance: "Most coughs clear up on their own within three weeks. Rest, drink warm \
fluids and try honey in warm water (not for children under one). See a doctor if you cough \
up blood, have chest pain or breathlessness, or the cough lasts more than three weeks.",
    },
    CannedGuidance {
        topic: "sore_throat",
        keywords: &["sore throat", "throat pain", "tonsil"],
        guidance: "Gargle with warm salt water, drink fluids and rest your voice. Lozenges \
and over-the-counter pain relief may help. See a doctor if you have trouble swallowing or \
breathing, a high fever, or symptoms lasting more than a week.",
    },
    CannedGuidance {
        topic: "stomach",
        keywords: &["stomach", "nausea", "vomit", "diarrhea", "diarrhoea", "abdominal"],
        guidance: "Sip water or an oral rehydration solution often and eat bland food once \
you can keep it down. Seek medical care for blood in vomit or stool, severe abdominal pain, \
signs of dehydration, or symptoms lasting more than two days.",
    },
    CannedGuidance {
        topic: "allergy",
        keywords: &["allergy", "allergic", "rash", "hives", "itch"],
        guidance: "Avoid the suspected trigger; an antihistamine may ease mild itching or \
hives. Call emergency services at once for swelling of the face, lips or tongue, or \
difficulty breathing, and use an adrenaline auto-injector if one has been prescribed.",
    },
    CannedGuidance {
        topic: "back_pain",
        keywords: &["back pain", "backache", "lower back"],
        guidance: "Stay gently active, use heat or cold packs and consider over-the-counter \
pain relief as directed. Seek urgent care for back pain with numbness, weakness, loss of \
bladder or bowel control, or after a fall or injury.",
    },
    CannedGuidance {
        topic: "cold_flu",
        keywords: &["cold ", "flu ", "influenza", "runny nose", "congestion", "sneez"],
        guidance: "Rest, keep warm and drink plenty of fluids. Over-the-counter remedies can \
ease symptoms. See a doctor if symptoms last more than ten days, you have a high fever, or \
you are in a higher-risk group.",
    },
];

/// A selected fallback answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAnswer {
    /// Matched topic, or `None` for the generic default.
    pub topic: Option<&'static str>,
    pub content: String,
}

/// Find the first table entry matching `message`.
pub fn match_guidance(message: &str) -> Option<&'static CannedGuidance> {
    let words: String = normalize(message)
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let padded = format!(" {} ", normalize(&words));
    GUIDANCE_TABLE.iter().find(|entry| {
        entry
            .keywords
            .iter()
            .any(|k| padded.contains(&format!(" {k}")))
    })
}

/// Deterministic answer for `message`, disclaimer included.
pub fn fallback_answer(message: &str) -> FallbackAnswer {
    let (topic, guidance) = match match_guidance(message) {
        Some(entry) => (Some(entry.topic), entry.guidance),
        None => (None, GENERIC_GUIDANCE),
    };
    FallbackAnswer {
        topic,
        content: format!("{guidance}\n\n{DISCLAIMER}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fever_matches_fever_guidance() {
        let answer = fallback_answer("I have a FEVER since yesterday");
        assert_eq!(answer.topic, Some("fever"));
        assert!(answer.content.contains("fluids"));
        assert!(answer.content.ends_with(DISCLAIMER));
    }

    #[test]
    fn chest_pain_wins_over_headache() {
        let answer = fallback_answer("chest pain and a headache");
        assert_eq!(answer.topic, Some("chest_pain"));
    }

    #[test]
    fn unmatched_message_gets_generic_default() {
        let answer = fallback_answer("How do I renew my passport?");
        assert_eq!(answer.topic, None);
        assert!(answer.content.starts_with(GENERIC_GUIDANCE));
        assert!(answer.content.contains("consult a doctor"));
    }

    #[test]
    fn keywords_match_at_word_starts() {
        assert_eq!(fallback_answer("I keep vomiting").topic, Some("stomach"));
        assert_eq!(fallback_answer("flu symptoms?").topic, Some("cold_flu"));
        assert_eq!(fallback_answer("how much fluid per day").topic, None);
        assert_eq!(fallback_answer("light switch broke").topic, None);
    }

    #[test]
    fn answer_is_deterministic() {
        assert_eq!(fallback_answer("cough"), fallback_answer("  COUGH "));
    }

    #[test]
    fn table_keywords_are_lowercase() {
        for entry in GUIDANCE_TABLE {
            for k in entry.keywords {
                assert_eq!(*k, k.to_lowercase(), "{}", entry.topic);
            }
        }
    }
}
