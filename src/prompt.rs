//! Animation prompt construction.
//!
//! Prompts describe a "living portrait": the subject keeps eye contact with
//! the viewer and moves subtly, and the clip loops back to its first frame.

use std::fmt;
use std::str::FromStr;

/// Default clip length in seconds.
pub const DEFAULT_DURATION: u32 = 8;

const BASE_QUALITIES: &[&str] = &[
    "vintage wizarding portrait aesthetic",
    "seamlessly looping animation",
    "maintains original photo composition and colors",
    "cinematic quality with rich detail",
];

const CORE_REQUIREMENTS: &[&str] = &[
    "at least one person looking directly at camera throughout",
    "maintaining steady eye contact with viewer",
];

const SUBTLE_MOVEMENTS: &[&str] = &[
    "gentle breathing",
    "occasional natural blink while maintaining gaze",
    "slight knowing smile forming",
    "eyebrows raising expressively",
    "subtle head tilt or nod of acknowledgment",
];

const MODERATE_MOVEMENTS: &[&str] = &[
    "slow turn to face camera directly",
    "gentle wave or greeting gesture",
    "crossing or uncrossing arms",
    "adjusting glasses or clothing",
    "touching face thoughtfully",
];

const DRAMATIC_MOVEMENTS: &[&str] = &[
    "animated conversation or storytelling gestures",
    "laughing or reacting expressively",
    "dramatic arm movements",
    "pointing at something with enthusiasm",
    "hands gesturing emphatically",
];

const EMOTIONAL_EXPRESSIONS: &[&str] = &[
    "expression shifting from serious to amused",
    "eyebrows raising in surprise or recognition",
    "subtle frown forming then relaxing",
    "corners of mouth twitching with suppressed smile",
    "eyes widening with sudden interest",
    "skeptical look crossing their face",
    "flash of anger or annoyance in eyes",
    "moment of thoughtful contemplation",
];

const VIEWER_INTERACTIONS: &[&str] = &[
    "sly knowing glance directly at camera",
    "coy smile as if sharing a secret",
    "quick furtive look around before making eye contact",
    "conspiratorial lean toward viewer",
    "subtle nod of acknowledgment to viewer",
    "raising eyebrows meaningfully at camera",
    "slight smirk directed at viewer",
    "beckoning gesture inviting viewer closer",
];

const GROUP_INTERACTIONS: &[&str] = &[
    "subjects glancing at each other knowingly",
    "one whispering to another while one maintains camera contact",
    "gentle nudging or touching shoulders",
];

const ENVIRONMENTAL_EFFECTS: &[&str] = &[
    "subtle lighting shifts creating depth",
    "gentle movement in hair or fabric",
];

const LOOP_INSTRUCTIONS: &str = "smooth seamless loop from end back to beginning, \
     keep background static, \
     preserve original photograph character and quality";

/// Errors from prompt validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Empty prompt")]
    EmptyPrompt,
}

/// Kind of photograph being animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoType {
    #[default]
    Portrait,
    Group,
    Landscape,
    Pet,
    Formal,
}

impl PhotoType {
    fn intro(self) -> &'static str {
        match self {
            PhotoType::Portrait => "Animate this as a living wizarding portrait photograph",
            PhotoType::Group => {
                "Animate this as a living wizarding group photograph with subjects interacting"
            }
            PhotoType::Landscape => "Transform this into a living magical scene",
            PhotoType::Pet => "Bring this to life as a magical creature portrait",
            PhotoType::Formal => "Animate as a distinguished wizarding portrait",
        }
    }
}

impl FromStr for PhotoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(PhotoType::Portrait),
            "group" => Ok(PhotoType::Group),
            "landscape" => Ok(PhotoType::Landscape),
            "pet" => Ok(PhotoType::Pet),
            "formal" => Ok(PhotoType::Formal),
            other => Err(format!("Unknown photo type: {}", other)),
        }
    }
}

/// How much the subject moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intensity {
    #[default]
    Subtle,
    Moderate,
    Dramatic,
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intensity::Subtle => "subtle",
            Intensity::Moderate => "moderate",
            Intensity::Dramatic => "dramatic",
        })
    }
}

impl FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subtle" => Ok(Intensity::Subtle),
            "moderate" => Ok(Intensity::Moderate),
            "dramatic" => Ok(Intensity::Dramatic),
            other => Err(format!("Unknown intensity: {}", other)),
        }
    }
}

/// Builds animation prompts for a fixed clip duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    duration: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl PromptBuilder {
    pub fn new(duration: u32) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Build a full prompt.
    ///
    /// Sections are joined with `". "` and the prompt ends with a period.
    pub fn build(
        &self,
        photo_type: PhotoType,
        intensity: Intensity,
        custom_elements: &[String],
    ) -> String {
        let mut parts: Vec<String> = vec![
            photo_type.intro().to_string(),
            BASE_QUALITIES.join(", "),
            CORE_REQUIREMENTS.join(", "),
        ];

        let mut movements: Vec<&str> = movements_for(intensity, photo_type);
        movements.extend(custom_elements.iter().map(String::as_str));
        parts.push(movements.join(", "));

        if intensity != Intensity::Dramatic {
            parts.push(ENVIRONMENTAL_EFFECTS.join(", "));
        }

        parts.push(format!("{} seconds duration", self.duration));
        parts.push(LOOP_INSTRUCTIONS.to_string());

        let prompt = format!("{}.", parts.join(". "));
        log::debug!("Built prompt ({} chars)", prompt.len());
        prompt
    }

    /// Wrap a free-form description in the standard styling.
    pub fn build_simple(&self, description: &str) -> String {
        format!(
            "Animate this photograph as a magical living portrait. {}. \
             Maintain cinematic quality, magical atmosphere, \
             keep background static, preserve original photo details. \
             {} seconds duration.",
            description.trim().trim_end_matches('.'),
            self.duration
        )
    }
}

fn movements_for(intensity: Intensity, photo_type: PhotoType) -> Vec<&'static str> {
    let (base, viewer, emotions) = match intensity {
        Intensity::Subtle => (&SUBTLE_MOVEMENTS[..3], &VIEWER_INTERACTIONS[..2], &EMOTIONAL_EXPRESSIONS[..2]),
        Intensity::Moderate => (
            &MODERATE_MOVEMENTS[..3],
            &VIEWER_INTERACTIONS[2..5],
            &EMOTIONAL_EXPRESSIONS[2..5],
        ),
        Intensity::Dramatic => (
            &DRAMATIC_MOVEMENTS[..4],
            &VIEWER_INTERACTIONS[5..8],
            &EMOTIONAL_EXPRESSIONS[5..8],
        ),
    };

    let mut movements: Vec<&str> = base.iter().chain(viewer).chain(emotions).copied().collect();
    if photo_type == PhotoType::Group {
        movements.extend_from_slice(GROUP_INTERACTIONS);
    }
    movements
}

/// Reject prompts that are empty or whitespace only.
pub fn validate_prompt(prompt: &str) -> Result<(), PromptError> {
    if prompt.trim().is_empty() {
        return Err(PromptError::EmptyPrompt);
    }
    Ok(())
}
