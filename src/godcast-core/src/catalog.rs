//! Character and episode catalogs.
//!
//! Read-only lookup tables consumed by generation (persona context)
//! and synthesis (voice ids). Loadable from a TOML file, with the
//! stock roster embedded as the default.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::CatalogError;

/// A debater persona.
#[derive(Debug, Clone, Deserialize)]
pub struct Character {
    pub id: String,
    /// Display name.
    pub name: String,
    /// When and where they lived (or are set).
    pub era: String,
    /// How they talk; fed verbatim into the generation prompt.
    pub speaking_style: String,
    pub famous_quote: String,
    /// Voice used when synthesizing this character's turns.
    pub voice_id: String,
}

/// A playable episode: a topic plus a fixed roster of participants.
#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub description: String,
    /// The question the roster debates; the sole input to generation
    /// besides the roster itself.
    pub topic: String,
    /// Character ids, in roster order.
    pub participants: Vec<String>,
    /// Display duration, e.g. "12 min".
    pub duration: String,
    #[serde(default)]
    pub is_featured: bool,
}

/// The combined character and episode lookup table.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    /// Fallback voice for characters missing a roster entry.
    pub default_voice_id: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl Catalog {
    /// Load a catalog from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Load a catalog from TOML content.
    pub fn from_str(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn episode(&self, id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id == id)
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn featured_episodes(&self) -> Vec<&Episode> {
        self.episodes.iter().filter(|e| e.is_featured).collect()
    }

    /// Resolve an episode's roster to character records, in roster
    /// order. Ids without a catalog entry are dropped with a warning.
    pub fn characters_for(&self, episode: &Episode) -> Vec<Character> {
        episode
            .participants
            .iter()
            .filter_map(|id| {
                let found = self.character(id);
                if found.is_none() {
                    warn!(character = %id, episode = %episode.id, "unknown participant in roster");
                }
                found.cloned()
            })
            .collect()
    }

    /// Voice id for a character, falling back to the default voice for
    /// unknown ids.
    pub fn voice_for(&self, character_id: &str) -> &str {
        self.character(character_id)
            .map(|c| c.voice_id.as_str())
            .unwrap_or(&self.default_voice_id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        default_catalog()
    }
}

fn character(
    id: &str,
    name: &str,
    era: &str,
    speaking_style: &str,
    famous_quote: &str,
    voice_id: &str,
) -> Character {
    Character {
        id: id.to_string(),
        name: name.to_string(),
        era: era.to_string(),
        speaking_style: speaking_style.to_string(),
        famous_quote: famous_quote.to_string(),
        voice_id: voice_id.to_string(),
    }
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// The stock catalog embedded in the binary.
pub fn default_catalog() -> Catalog {
    Catalog {
        // Rachel, the stock narrator voice.
        default_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
        characters: vec![
            character(
                "plato",
                "Plato",
                "Ancient Greece, 428-348 BC",
                "Builds arguments through dialectic and allegory, always reaching past appearances toward ideal forms",
                "The heaviest penalty for declining to rule is to be ruled by someone inferior.",
                "JBFqnCBsd6RMkjVDRZzb",
            ),
            character(
                "socrates",
                "Socrates",
                "Ancient Greece, 470-399 BC",
                "Relentless questioning and feigned ignorance, leading others to contradict themselves",
                "The unexamined life is not worth living.",
                "onwK4e9ZLuTAKqWW03F9",
            ),
            character(
                "morpheus",
                "Morpheus",
                "The Matrix, late 22nd century",
                "Grave, hypnotic certainty, posing koan-like challenges about perception and choice",
                "There is a difference between knowing the path and walking the path.",
                "pNInz6obpgDQGcFmaJgB",
            ),
            character(
                "alan-watts",
                "Alan Watts",
                "20th century Britain and California",
                "Playful, flowing prose that dissolves hard problems into laughter",
                "Trying to define yourself is like trying to bite your own teeth.",
                "bIHbv24MWmeRgasZH58o",
            ),
            character(
                "buddha",
                "Buddha",
                "Ancient India, 5th century BC",
                "Calm and compassionate, teaching through parable and careful negation",
                "Peace comes from within. Do not seek it without.",
                "nPczCjzI2devNBz1zQrb",
            ),
            character(
                "nietzsche",
                "Friedrich Nietzsche",
                "19th century Germany",
                "Aphoristic thunder and provocation, with contempt for comfortable answers",
                "He who has a why to live can bear almost any how.",
                "N2lVS1w4EtoT3dr4eOWO",
            ),
            character(
                "confucius",
                "Confucius",
                "Ancient China, 551-479 BC",
                "Measured maxims about duty, ritual and the cultivation of character",
                "The man who moves a mountain begins by carrying away small stones.",
                "pqHfZKP75CvOlQylNhV4",
            ),
            character(
                "carl-jung",
                "Carl Jung",
                "19th-20th century Switzerland",
                "Probes symbols, dreams and the shadow beneath every certainty",
                "Who looks outside, dreams; who looks inside, awakes.",
                "iP95p4xoKVk53GoZ742B",
            ),
            character(
                "marcus-aurelius",
                "Marcus Aurelius",
                "Roman Empire, 121-180 AD",
                "Austere self-address, returning everything to what lies within one's control",
                "You have power over your mind, not outside events.",
                "cjVigY5qzO86Huf0OWal",
            ),
            character(
                "einstein",
                "Albert Einstein",
                "19th-20th century Germany and America",
                "Thought experiments delivered with warmth and open wonder",
                "Imagination is more important than knowledge.",
                "IKne3meq5aSn9XLyUdCD",
            ),
            character(
                "lao-tzu",
                "Lao Tzu",
                "Ancient China, 6th century BC",
                "Paradoxical verses about water, emptiness and effortless action",
                "The journey of a thousand miles begins with a single step.",
                "TX3LPaxmHKxFdv7VOQHJ",
            ),
            character(
                "terence-mckenna",
                "Terence McKenna",
                "20th century America",
                "Baroque vocabulary and cosmic speculation, delighting in the edges of the map",
                "The cost of sanity in this society is a certain level of alienation.",
                "TxGEqnHirt8EYl5zF1Yq",
            ),
            character(
                "gandhi",
                "Mahatma Gandhi",
                "19th-20th century India",
                "Gentle moral insistence, grounding every principle in lived practice",
                "Be the change that you wish to see in the world.",
                "yoZ06aMxZJJ28mfd3POQ",
            ),
            character(
                "simone-de-beauvoir",
                "Simone de Beauvoir",
                "20th century France",
                "Rigorous existentialist analysis of freedom, situation and the other",
                "One is not born, but rather becomes, a woman.",
                "XB0fDUnXU5powFXDhCwa",
            ),
            character(
                "rumi",
                "Rumi",
                "13th century Persia",
                "Ecstatic verse that turns every argument toward love",
                "What you seek is seeking you.",
                "ErXwobaYiN019PkySvjV",
            ),
            character(
                "yoda",
                "Yoda",
                "A galaxy far, far away",
                "Brief and inverted syntax, speaking of the Force that binds all things",
                "Do. Or do not. There is no try.",
                "VR6AewLTigWG4xSOukaG",
            ),
        ],
        episodes: vec![
            Episode {
                id: "nature-of-reality".to_string(),
                title: "The Nature of Reality".to_string(),
                description: "What is real? Our guests explore perception, consciousness, and the fabric of existence itself.".to_string(),
                topic: "What is the true nature of reality? Is there an objective reality, or is everything subjective perception?".to_string(),
                participants: ids(&["plato", "morpheus", "alan-watts", "buddha"]),
                duration: "12 min".to_string(),
                is_featured: true,
            },
            Episode {
                id: "meaning-of-life".to_string(),
                title: "The Meaning of Life".to_string(),
                description: "Why are we here? Our philosophers tackle humanity's greatest question.".to_string(),
                topic: "What gives life meaning? Is meaning found, created, or an illusion?".to_string(),
                participants: ids(&["nietzsche", "buddha", "confucius", "carl-jung"]),
                duration: "15 min".to_string(),
                is_featured: true,
            },
            Episode {
                id: "free-will-vs-destiny".to_string(),
                title: "Free Will vs Destiny".to_string(),
                description: "Are we truly free to choose, or is everything predetermined?".to_string(),
                topic: "Do humans have free will, or are our choices determined by prior causes?".to_string(),
                participants: ids(&["marcus-aurelius", "morpheus", "einstein", "lao-tzu"]),
                duration: "14 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "consciousness-explored".to_string(),
                title: "Consciousness Explored".to_string(),
                description: "What is consciousness? Where does it come from? Can it exist beyond the body?".to_string(),
                topic: "What is the nature of consciousness? Is it produced by the brain or something more fundamental?".to_string(),
                participants: ids(&["terence-mckenna", "carl-jung", "alan-watts", "buddha"]),
                duration: "16 min".to_string(),
                is_featured: true,
            },
            Episode {
                id: "morality-modern-world".to_string(),
                title: "Morality in the Modern World".to_string(),
                description: "In an age of relativism, what does it mean to be good?".to_string(),
                topic: "Are there universal moral truths, or is morality relative to culture and time?".to_string(),
                participants: ids(&["confucius", "nietzsche", "gandhi", "simone-de-beauvoir"]),
                duration: "13 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "love-and-connection".to_string(),
                title: "Love and Connection".to_string(),
                description: "The greatest force in the universe, examined from every angle.".to_string(),
                topic: "What is the nature of love? Is it biological, spiritual, or both?".to_string(),
                participants: ids(&["rumi", "plato", "carl-jung", "simone-de-beauvoir"]),
                duration: "14 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "death-and-beyond".to_string(),
                title: "Death and Beyond".to_string(),
                description: "What happens when we die? Our guests share their perspectives on mortality.".to_string(),
                topic: "What is death? Is there anything beyond it, or is it the final end?".to_string(),
                participants: ids(&["socrates", "buddha", "marcus-aurelius", "yoda"]),
                duration: "15 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "power-of-mind".to_string(),
                title: "The Power of the Mind".to_string(),
                description: "Exploring the unlimited potential within human consciousness.".to_string(),
                topic: "What are the limits of the human mind? Can consciousness shape reality?".to_string(),
                participants: ids(&["morpheus", "einstein", "yoda", "terence-mckenna"]),
                duration: "14 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "wisdom-of-ages".to_string(),
                title: "Wisdom of the Ages".to_string(),
                description: "East meets West in this epic dialogue across civilizations.".to_string(),
                topic: "What universal truths have humans discovered across different cultures and eras?".to_string(),
                participants: ids(&["lao-tzu", "socrates", "confucius", "rumi"]),
                duration: "16 min".to_string(),
                is_featured: false,
            },
            Episode {
                id: "future-of-humanity".to_string(),
                title: "The Future of Humanity".to_string(),
                description: "Where is humanity headed? A prophetic discussion about our species' destiny.".to_string(),
                topic: "What does the future hold for humanity? Will we transcend or destroy ourselves?".to_string(),
                participants: ids(&["nietzsche", "gandhi", "einstein", "alan-watts"]),
                duration: "15 min".to_string(),
                is_featured: true,
            },
        ],
    }
}
