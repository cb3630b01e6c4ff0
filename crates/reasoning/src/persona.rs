//! User personas: tone and format instructions for the synthesizer.
//!
//! A persona is derived from the onboarding questionnaire (role, experience,
//! smartphone familiarity, innovation attitude, farming goal) and rendered
//! into an instruction block prepended to the synthesis prompt.

use agrow_core::context::ContextBundle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instructions used when the bundle says nothing about the user.
pub const DEFAULT_INSTRUCTIONS: &str = "Provide clear, helpful farming advice.";

/// How to talk to one kind of user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaDefinition {
    pub key: &'static str,
    pub description: &'static str,
    pub style: &'static str,
    pub format: &'static str,
    pub focus: &'static str,
    pub tone: &'static str,
    pub recommendations: &'static str,
}

pub static PERSONAS: [PersonaDefinition; 7] = [
    PersonaDefinition {
        key: "new_farmer_basic_tech",
        description: "New farmer (0-3 years), limited smartphone familiarity",
        style: "Very simple, step-by-step guidance. NO NUMBERS OR INDICES.",
        format: "Short bullet points, numbered steps. Use terms like 'Low', 'High', 'Good', 'Bad'.",
        focus: "Immediate actions. Explain strictly based on their irrigation method.",
        tone: "Warm, patient, encouraging, supportive",
        recommendations: "Simple low-cost solutions. Tailor to their specific farming technique.",
    },
    PersonaDefinition {
        key: "new_farmer_tech_savvy",
        description: "New farmer (0-3 years), comfortable with technology",
        style: "Clear explanations without complex numbers. NO RAW INDICES.",
        format: "Use 'High'/'Moderate'/'Low' for status. Visual cues.",
        focus: "Learning-oriented. Explain 'why' using their specific crop context.",
        tone: "Friendly, educational, encouraging.",
        recommendations: "Modern approaches. Consider their specific irrigation setup.",
    },
    PersonaDefinition {
        key: "experienced_farmer_traditional",
        description: "Experienced farmer (5+ years), prefers traditional methods",
        style: "Practical. NO RAW DATA/NUMBERS. Use traditional terms.",
        format: "Direct recommendations. Use 'Adequate', 'Stressed', 'Severe'.",
        focus: "Risk assessment. Relate to their traditional techniques.",
        tone: "Respectful of expertise, peer-to-peer.",
        recommendations: "Proven methods first. Match their existing irrigation habits.",
    },
    PersonaDefinition {
        key: "experienced_farmer_innovative",
        description: "Experienced farmer (5+ years), open to modern methods",
        style: "Practical but simplified metrics. NO COMPLEX DECIMALS.",
        format: "Use 'High Efficiency' vs 'Low'.",
        focus: "Efficiency. Optimize their specific machinery/irrigation inputs.",
        tone: "Professional, partner-like.",
        recommendations: "Innovation welcomed. Precision approaches for their equipment.",
    },
    PersonaDefinition {
        key: "commercial_farmer",
        description: "Commercial farming focus, business-oriented",
        style: "Business-focused. Summary stats only (High/Low risks).",
        format: "Clear priorities. Zone breakdowns by 'Severity' (not index).",
        focus: "ROI and scalable solutions for their infrastructure.",
        tone: "Professional, efficient, results-oriented",
        recommendations: "Commercial-grade solutions tailored to their scale/inputs.",
    },
    PersonaDefinition {
        key: "agricultural_officer",
        description: "Extension officer or field advisor",
        style: "Professional summary. Minimal raw numbers, focus on status.",
        format: "Zone-wise 'Affected' vs 'Healthy'. Trend direction.",
        focus: "Regional patterns. Farmer communication tips.",
        tone: "Formal, shareable insights",
        recommendations: "Scalable solutions for the region's common techniques.",
    },
    PersonaDefinition {
        key: "agronomist_researcher",
        description: "Technical researcher or scientist",
        style: "Full technical precision. HEAVY USE OF NUMERICAL DATA & INDICES.",
        format: "Tables with exact NDVI/NDRE values. Statistical confidence intervals.",
        focus: "Causal mechanisms, data quality, methodology.",
        tone: "Scientific, analytical, evidence-driven",
        recommendations: "Experimental approaches. Cite specific spectral bands/thresholds.",
    },
];

pub fn definition(key: &str) -> Option<&'static PersonaDefinition> {
    PERSONAS.iter().find(|p| p.key == key)
}

fn fallback_definition() -> &'static PersonaDefinition {
    &PERSONAS[2]
}

// ── Questionnaire ───────────────────────────────────────────────────────

fn default_role() -> String {
    "Farmer".into()
}
fn default_experience() -> String {
    "2 - 5 years".into()
}
fn default_smartphone() -> String {
    "I can use basic features (calls, WhatsApp, YouTube)".into()
}
fn default_innovation() -> String {
    "I try new methods occasionally".into()
}
fn default_goal() -> String {
    "Earn Income / Livelihood".into()
}
fn default_irrigation() -> String {
    "Tube well / Borewell".into()
}
fn default_mechanization() -> String {
    "with both by hand and machines".into()
}
fn default_cropping() -> String {
    "2 crops per year".into()
}

/// Onboarding answers, verbatim. Unanswered questions take the most
/// common answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_experience")]
    pub farming_experience: String,
    #[serde(default = "default_smartphone")]
    pub smartphone_familiarity: String,
    #[serde(default = "default_innovation")]
    pub innovation_attitude: String,
    #[serde(default = "default_goal")]
    pub farming_goal: String,
    #[serde(default = "default_irrigation")]
    pub irrigation_source: String,
    #[serde(default = "default_mechanization")]
    pub mechanization_level: String,
    #[serde(default = "default_cropping")]
    pub cropping_frequency: String,
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self {
            role: default_role(),
            farming_experience: default_experience(),
            smartphone_familiarity: default_smartphone(),
            innovation_attitude: default_innovation(),
            farming_goal: default_goal(),
            irrigation_source: default_irrigation(),
            mechanization_level: default_mechanization(),
            cropping_frequency: default_cropping(),
        }
    }
}

fn experience_years(answer: &str) -> u32 {
    match answer {
        "Less than 2 years" => 1,
        "2 - 5 years" => 3,
        "5 - 10 years" => 7,
        "More than 10 years" => 15,
        _ => 3,
    }
}

fn tech_level(answer: &str) -> &'static str {
    match answer {
        "I don't know how to use them" | "I need help using them" => "basic",
        "I am very comfortable using apps" => "advanced",
        _ => "moderate",
    }
}

fn innovation_level(answer: &str) -> &'static str {
    match answer {
        "I prefer traditional methods" => "traditional",
        "I regularly adopt modern/innovative methods" => "innovative",
        _ => "moderate",
    }
}

fn goal_type(answer: &str) -> &'static str {
    match answer {
        "Food for family consumption" => "subsistence",
        "Sell Commercially / Business" => "commercial",
        "Other" => "custom",
        _ => "income",
    }
}

/// A derived persona plus the rendered instruction block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
    #[serde(rename = "type")]
    pub kind: String,
    pub experience_years: u32,
    pub tech_level: String,
    pub innovation_level: String,
    pub goal_type: String,
    pub instructions: String,
}

/// Derive a persona from questionnaire answers.
pub fn derive_persona(answers: &Questionnaire) -> Persona {
    let years = experience_years(&answers.farming_experience);
    let tech = tech_level(&answers.smartphone_familiarity);
    let innovation = innovation_level(&answers.innovation_attitude);
    let goal = goal_type(&answers.farming_goal);

    let kind = match answers.role.as_str() {
        "Agro-tech Researcher" => "agronomist_researcher",
        "Extension Officer" | "Agricultural Officer" => "agricultural_officer",
        _ if goal == "commercial" => "commercial_farmer",
        _ if years <= 3 && tech == "advanced" => "new_farmer_tech_savvy",
        _ if years <= 3 => "new_farmer_basic_tech",
        _ if innovation == "innovative" => "experienced_farmer_innovative",
        _ => "experienced_farmer_traditional",
    };

    let def = definition(kind).unwrap_or_else(fallback_definition);
    Persona {
        kind: kind.to_string(),
        experience_years: years,
        tech_level: tech.to_string(),
        innovation_level: innovation.to_string(),
        goal_type: goal.to_string(),
        instructions: render_instructions(def, Some((answers, years))),
    }
}

fn render_instructions(def: &PersonaDefinition, answers: Option<(&Questionnaire, u32)>) -> String {
    let mut out = format!(
        "USER PERSONA: {}\n\n\
         COMMUNICATION STYLE: {}\n\
         RESPONSE FORMAT: {}\n\
         PRIMARY FOCUS: {}\n\
         TONE: {}\n\
         RECOMMENDATION STYLE: {}\n",
        def.description, def.style, def.format, def.focus, def.tone, def.recommendations
    );

    if let Some((q, years)) = answers {
        out.push_str(&format!(
            "\nUSER CONTEXT FOR TAILORING:\n\
             - Farming Experience: {} ({years} years)\n\
             - Technology Comfort: {}\n\
             - Innovation Attitude: {}\n\
             - Farming Goal: {}\n\
             - Irrigation Method: {}\n\
             - Mechanization: {}\n\
             - Cropping Frequency: {}\n\
             \n\
             TAILORING GUIDELINES:\n\
             1. Match recommendations to their IRRIGATION method ({}).\n\
             2. Match recommendations to their MECHANIZATION level ({}).\n\
             3. Align with their FARMING GOAL ({}).\n\
             4. Respect their INNOVATION preference ({}).\n",
            q.farming_experience,
            q.smartphone_familiarity,
            q.innovation_attitude,
            q.farming_goal,
            q.irrigation_source,
            q.mechanization_level,
            q.cropping_frequency,
            q.irrigation_source,
            q.mechanization_level,
            q.farming_goal,
            q.innovation_attitude,
        ));
    }

    out.push_str(
        "\nIMPORTANT: Generate a response that this specific user will find most helpful and actionable.",
    );
    out
}

/// Persona instructions for a bundle.
///
/// Precedence: ready-made `persona.instructions`, then a `persona.type`
/// rendered from the definitions table, then a persona derived from
/// `user_profile.questionnaire_data`, then [`DEFAULT_INSTRUCTIONS`].
pub fn instructions_for(bundle: &ContextBundle) -> String {
    if let Some(text) = bundle.text("persona.instructions")
        && !text.trim().is_empty()
    {
        return text.to_string();
    }

    if let Some(def) = bundle.text("persona.type").and_then(definition) {
        return render_instructions(def, None);
    }

    if let Some(Value::Object(answers)) = bundle.resolve("user_profile.questionnaire_data")
        && let Ok(q) = serde_json::from_value::<Questionnaire>(Value::Object(answers.clone()))
    {
        return derive_persona(&q).instructions;
    }

    DEFAULT_INSTRUCTIONS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers(pairs: &[(&str, &str)]) -> Questionnaire {
        let map: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        serde_json::from_value(Value::Object(map)).unwrap()
    }

    #[test]
    fn defaults_make_a_new_basic_farmer() {
        let persona = derive_persona(&Questionnaire::default());
        assert_eq!(persona.kind, "new_farmer_basic_tech");
        assert_eq!(persona.experience_years, 3);
        assert_eq!(persona.tech_level, "moderate");
        assert!(persona.instructions.contains("NO NUMBERS OR INDICES"));
        assert!(persona.instructions.contains("Irrigation Method: Tube well / Borewell"));
    }

    #[test]
    fn role_outranks_everything() {
        let q = answers(&[
            ("role", "Agro-tech Researcher"),
            ("farming_goal", "Sell Commercially / Business"),
        ]);
        assert_eq!(derive_persona(&q).kind, "agronomist_researcher");
        let q = answers(&[("role", "Extension Officer")]);
        assert_eq!(derive_persona(&q).kind, "agricultural_officer");
    }

    #[test]
    fn commercial_goal_before_experience() {
        let q = answers(&[("farming_goal", "Sell Commercially / Business")]);
        assert_eq!(derive_persona(&q).kind, "commercial_farmer");
    }

    #[test]
    fn experience_and_attitude_split_farmers() {
        let q = answers(&[("smartphone_familiarity", "I am very comfortable using apps")]);
        assert_eq!(derive_persona(&q).kind, "new_farmer_tech_savvy");

        let q = answers(&[
            ("farming_experience", "More than 10 years"),
            ("innovation_attitude", "I regularly adopt modern/innovative methods"),
        ]);
        assert_eq!(derive_persona(&q).kind, "experienced_farmer_innovative");

        let q = answers(&[("farming_experience", "5 - 10 years")]);
        assert_eq!(derive_persona(&q).kind, "experienced_farmer_traditional");
    }

    #[test]
    fn bundle_instructions_take_precedence() {
        let bundle = ContextBundle::from_value(json!({
            "persona": {"instructions": "Talk like a researcher.", "type": "commercial_farmer"}
        }))
        .unwrap();
        assert_eq!(instructions_for(&bundle), "Talk like a researcher.");
    }

    #[test]
    fn persona_type_is_rendered() {
        let bundle = ContextBundle::from_value(json!({"persona": {"type": "commercial_farmer"}}))
            .unwrap();
        let text = instructions_for(&bundle);
        assert!(text.starts_with("USER PERSONA: Commercial farming focus"));
        assert!(!text.contains("USER CONTEXT FOR TAILORING"));
    }

    #[test]
    fn questionnaire_is_derived_when_no_persona() {
        let bundle = ContextBundle::from_value(json!({
            "user_profile": {"questionnaire_data": {"role": "Agricultural Officer"}}
        }))
        .unwrap();
        assert!(instructions_for(&bundle).contains("Extension officer or field advisor"));
    }

    #[test]
    fn empty_bundle_gets_default_instructions() {
        assert_eq!(instructions_for(&ContextBundle::new()), DEFAULT_INSTRUCTIONS);
        let bundle = ContextBundle::from_value(json!({"persona": {"type": "wizard"}})).unwrap();
        assert_eq!(instructions_for(&bundle), DEFAULT_INSTRUCTIONS);
    }
}
